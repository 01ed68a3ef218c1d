//! Render-thread camera state
//!
//! The UI thread integrates input into a position/rotation pair and ships
//! it across the event queue as a [`CameraTransformUpdate`]; the render
//! thread rebuilds the view matrix and forward vector from it. View space
//! is left-handed with +Z pointing into the screen.

use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Matrix4, Point3, SquareMatrix, Vector2, Vector3, Vector4};

use crate::constants::{CAMERA_FOV_Y_DEGREES, CAMERA_Z_FAR, CAMERA_Z_NEAR};
use crate::math::perspective_lh;

/// Camera pose delta carried over the cross-thread queue.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraTransformUpdate {
    pub position: [f32; 3],
    /// Pitch and yaw in radians.
    pub rotation: [f32; 2],
}

/// Snapshot of camera state consumed by the culling pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CameraInfo {
    pub position: Point3<f32>,
    pub forward: Vector3<f32>,
    pub rotation: Vector2<f32>,
    pub view: Matrix4<f32>,
}

/// Camera uniform buffer layout for the draw shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub world_position: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
}

pub struct CameraState {
    position: Point3<f32>,
    rotation: Vector2<f32>,
    view: Matrix4<f32>,
    forward: Vector3<f32>,
}

impl CameraState {
    pub fn new() -> Self {
        let mut camera = Self {
            position: Point3::new(0.0, 0.0, 1.0),
            rotation: Vector2::new(0.0, 0.0),
            view: Matrix4::identity(),
            forward: Vector3::unit_z(),
        };
        camera.rebuild_view();
        camera
    }

    pub fn apply_transform_update(&mut self, update: &CameraTransformUpdate) {
        self.position = Point3::new(update.position[0], update.position[1], update.position[2]);
        self.rotation = Vector2::new(update.rotation[0], update.rotation[1]);
        self.rebuild_view();
    }

    fn rebuild_view(&mut self) {
        let (pitch, yaw) = (self.rotation.x, self.rotation.y);
        self.forward = forward_vector(pitch, yaw);

        let right = Vector3::new(yaw.cos(), 0.0, -yaw.sin());
        let up = self.forward.cross(right).normalize();

        self.view = Matrix4::look_at_lh(self.position, self.position + self.forward, up);
    }

    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            position: self.position,
            forward: self.forward,
            rotation: self.rotation,
            view: self.view,
        }
    }

    pub fn uniform(&self, projection: &Matrix4<f32>) -> CameraUniform {
        CameraUniform {
            world_position: [self.position.x, self.position.y, self.position.z, 1.0],
            view: self.view.into(),
            view_projection: (projection * self.view).into(),
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward direction for a pitch/yaw pair, left-handed, yaw 0 = +Z.
pub fn forward_vector(pitch: f32, yaw: f32) -> Vector3<f32> {
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
}

/// Projection matrix for the fixed frame parameters (70 degree FOV-Y,
/// near 0.1, far 1000).
pub fn build_projection(width: u32, height: u32) -> Matrix4<f32> {
    perspective_lh(
        CAMERA_FOV_Y_DEGREES.to_radians(),
        width as f32,
        height as f32,
        CAMERA_Z_NEAR,
        CAMERA_Z_FAR,
    )
}

/// Clip-scale constants consumed by the tile-culling shader:
/// `(p00, -p11, 1/p00, 1/p11)`.
pub fn clip_scale(projection: &Matrix4<f32>) -> Vector4<f32> {
    let p00 = projection.x.x;
    let p11 = projection.y.y;
    Vector4::new(p00, -p11, 1.0 / p00, 1.0 / p11)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_positive_z() {
        let camera = CameraState::new();
        let info = camera.info();
        assert!((info.forward - Vector3::unit_z()).magnitude() < 1e-6);
    }

    #[test]
    fn view_space_depth_increases_along_forward() {
        let mut camera = CameraState::new();
        camera.apply_transform_update(&CameraTransformUpdate {
            position: [0.0, 0.0, -10.0],
            rotation: [0.0, 0.0],
        });
        let info = camera.info();

        let p = info.view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn clip_scale_inverts_projection_diagonal() {
        let projection = build_projection(1024, 768);
        let scale = clip_scale(&projection);
        assert!((scale.x * scale.z - 1.0).abs() < 1e-5);
        assert!((-scale.y * scale.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn yaw_rotates_forward_toward_positive_x() {
        let forward = forward_vector(0.0, std::f32::consts::FRAC_PI_2);
        assert!((forward.x - 1.0).abs() < 1e-6);
        assert!(forward.z.abs() < 1e-6);
    }
}
