//! Shared math utilities for the culling pipeline
//!
//! View space is left-handed (+Z into the screen) with clip z in [0, 1],
//! matching wgpu's clip-space conventions, so view-space depth can be
//! binned directly.

use cgmath::{InnerSpace, Matrix4, Point3, Vector3, Vector4};

use crate::constants::{EMPTY_Z_BIN, Z_BIN_COUNT, Z_BIN_MIN_MASK};

/// Left-handed perspective projection with clip z in [0, 1].
pub fn perspective_lh(fov_y: f32, width: f32, height: f32, z_near: f32, z_far: f32) -> Matrix4<f32> {
    let tan_half = (fov_y * 0.5).tan();
    let p11 = 1.0 / tan_half;
    let p00 = p11 * height / width;
    let z_range = z_far / (z_far - z_near);

    #[rustfmt::skip]
    let matrix = Matrix4::new(
        p00, 0.0, 0.0, 0.0,
        0.0, p11, 0.0, 0.0,
        0.0, 0.0, z_range, 1.0,
        0.0, 0.0, -z_near * z_range, 0.0,
    );
    matrix
}

/// Pack a closed z-bin range into one 32-bit word: min in the low half,
/// max in the high half.
pub fn pack_z_bin_range(min_bin: u32, max_bin: u32) -> u32 {
    (min_bin & Z_BIN_MIN_MASK) | (max_bin << 16)
}

/// Inverse of [`pack_z_bin_range`].
pub fn unpack_z_bin_range(packed: u32) -> (u32, u32) {
    (packed & Z_BIN_MIN_MASK, packed >> 16)
}

/// Sentinel word for a light with no valid depth range.
pub fn empty_z_bin_range() -> u32 {
    pack_z_bin_range(EMPTY_Z_BIN, EMPTY_Z_BIN)
}

/// Map a view-space depth interval to clamped bin indices.
pub fn z_bin_range_for_depths(z_min: f32, z_max: f32, z_step: f32) -> (u32, u32) {
    let clamp_bin = |z: f32| -> u32 {
        let bin = (z / z_step) as i64;
        bin.clamp(0, (Z_BIN_COUNT - 1) as i64) as u32
    };
    (clamp_bin(z_min), clamp_bin(z_max))
}

/// World-space bounding sphere.
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Enclosing sphere of a point set, centered on the AABB midpoint.
    pub fn from_points(points: &[Point3<f32>]) -> Self {
        let mut min = points[0];
        let mut max = points[0];
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        let center = Point3::new(
            (min.x + max.x) * 0.5,
            (min.y + max.y) * 0.5,
            (min.z + max.z) * 0.5,
        );
        let radius_sq = points
            .iter()
            .map(|p| (p - center).magnitude2())
            .fold(0.0f32, f32::max);

        Self {
            center,
            radius: radius_sq.sqrt(),
        }
    }
}

/// Axis-aligned world-space bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(center: Point3<f32>, half_extents: Vector3<f32>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Bounding box of this box transformed by an affine matrix.
    pub fn transformed(&self, transform: &Matrix4<f32>) -> Self {
        let corners = [
            Point3::new(self.min.x, self.min.y, self.min.z),
            Point3::new(self.max.x, self.min.y, self.min.z),
            Point3::new(self.min.x, self.max.y, self.min.z),
            Point3::new(self.max.x, self.max.y, self.min.z),
            Point3::new(self.min.x, self.min.y, self.max.z),
            Point3::new(self.max.x, self.min.y, self.max.z),
            Point3::new(self.min.x, self.max.y, self.max.z),
            Point3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut min = transform_point(transform, corners[0]);
        let mut max = min;
        for corner in &corners[1..] {
            let p = transform_point(transform, *corner);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Self { min, max }
    }
}

fn transform_point(m: &Matrix4<f32>, p: Point3<f32>) -> Point3<f32> {
    let v = m * Vector4::new(p.x, p.y, p.z, 1.0);
    Point3::new(v.x, v.y, v.z)
}

/// One frustum plane: `normal . p + distance >= 0` for points inside.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub distance: f32,
}

impl Plane {
    fn from_row(row: Vector4<f32>) -> Self {
        let normal = Vector3::new(row.x, row.y, row.z);
        let inv_len = 1.0 / normal.magnitude();
        Self {
            normal: normal * inv_len,
            distance: row.w * inv_len,
        }
    }

    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        self.normal.dot(Vector3::new(p.x, p.y, p.z)) + self.distance
    }
}

/// Six-plane camera frustum extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract planes from a column-vector view-projection matrix with
    /// clip z in [0, 1].
    pub fn from_view_projection(vp: &Matrix4<f32>) -> Self {
        let row = |i: usize| Vector4::new(vp.x[i], vp.y[i], vp.z[i], vp.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_row(r3 + r0), // left
                Plane::from_row(r3 - r0), // right
                Plane::from_row(r3 + r1), // bottom
                Plane::from_row(r3 - r1), // top
                Plane::from_row(r2),      // near
                Plane::from_row(r3 - r2), // far
            ],
        }
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(sphere.center) >= -sphere.radius)
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Test the corner furthest along the plane normal.
            let p = Point3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.signed_distance(p) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, Vector3};

    fn test_frustum() -> Frustum {
        let projection = perspective_lh(70f32.to_radians(), 1024.0, 768.0, 0.1, 1000.0);
        let view = Matrix4::look_at_lh(
            Point3::new(0.0, 0.0, -10.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );
        Frustum::from_view_projection(&(projection * view))
    }

    #[test]
    fn z_bin_packing_round_trips() {
        for (a, b) in [(0, 0), (5, 15), (1023, 1023), (0xFFFF, 0xFFFF)] {
            let packed = pack_z_bin_range(a, b);
            assert_eq!(unpack_z_bin_range(packed), (a, b));
        }
    }

    #[test]
    fn z_bin_range_clamps_to_valid_bins() {
        let z_step = (1000.0 - 0.1) / Z_BIN_COUNT as f32;
        let (min_bin, max_bin) = z_bin_range_for_depths(-5.0, 1e6, z_step);
        assert_eq!(min_bin, 0);
        assert_eq!(max_bin, Z_BIN_COUNT - 1);
    }

    #[test]
    fn frustum_accepts_sphere_ahead_of_camera() {
        let frustum = test_frustum();
        let sphere = BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 5.0);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn frustum_rejects_sphere_behind_camera() {
        let frustum = test_frustum();
        let sphere = BoundingSphere::new(Point3::new(0.0, 0.0, -30.0), 5.0);
        assert!(!frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn frustum_aabb_test_matches_visibility() {
        let frustum = test_frustum();
        let visible = Aabb::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(1.0, 1.0, 1.0));
        let behind = Aabb::new(Point3::new(0.0, 0.0, -40.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn enclosing_sphere_contains_all_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, -4.0),
        ];
        let sphere = BoundingSphere::from_points(&points);
        for p in &points {
            assert!((p - sphere.center).magnitude() <= sphere.radius + 1e-5);
        }
    }
}
