//! CPU light registry and per-frame visible-set construction
//!
//! Owns the authoritative light list. Each frame the registry culls lights
//! against the camera frustum, computes view-space depth ranges, and emits
//! the flat sorted arrays the culling compute stages consume. Sorting by
//! depth midpoint is what lets the Z-binning stage encode each depth slice
//! as one contiguous `[min, max]` index range.

use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::CameraInfo;
use crate::constants::Z_BIN_COUNT;
use crate::math::{empty_z_bin_range, pack_z_bin_range, z_bin_range_for_depths, BoundingSphere, Frustum};

/// Light variants culled per tile. Directional is reserved: it occupies a
/// slot in the per-kind counts but never enters the culling buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Spot,
}

/// Number of kinds that produce culled light records.
pub const CULLED_LIGHT_KIND_COUNT: usize = 2;

/// Length of the per-kind count array in the GPU frame parameters
/// (point, spot, directional, padding).
pub const LIGHT_COUNT_SLOTS: usize = 4;

impl LightKind {
    pub fn as_index(self) -> usize {
        match self {
            LightKind::Point => 0,
            LightKind::Spot => 1,
        }
    }
}

/// A single scene light, mutated only by the render thread.
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    /// Affine world transform; column 3 is the position, -column 2 the
    /// spot axis.
    pub transform: Matrix4<f32>,
    pub range: f32,
    pub outer_angle: f32,
    pub inner_angle: f32,
    pub diffuse: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub linear_attenuation: f32,
    bounding_sphere: BoundingSphere,
}

impl Light {
    pub fn point(transform: Matrix4<f32>, range: f32) -> Self {
        let mut light = Self {
            kind: LightKind::Point,
            transform,
            range,
            outer_angle: 0.0,
            inner_angle: 0.0,
            diffuse: Vector3::new(0.0, 0.0, 0.0),
            ambient: Vector3::new(0.0, 0.0, 0.0),
            linear_attenuation: 0.0,
            bounding_sphere: BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.0),
        };
        light.update_bounds();
        light
    }

    pub fn spot(transform: Matrix4<f32>, range: f32, outer_angle: f32, inner_angle: f32) -> Self {
        let mut light = Self {
            kind: LightKind::Spot,
            transform,
            range,
            outer_angle,
            inner_angle,
            diffuse: Vector3::new(0.0, 0.0, 0.0),
            ambient: Vector3::new(0.0, 0.0, 0.0),
            linear_attenuation: 0.0,
            bounding_sphere: BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.0),
        };
        light.update_bounds();
        light
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::new(self.transform.w.x, self.transform.w.y, self.transform.w.z)
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }

    /// Must be called after any change to a geometric attribute.
    pub fn update_bounds(&mut self) {
        self.bounding_sphere = match self.kind {
            LightKind::Point => BoundingSphere::new(self.position(), self.range),
            LightKind::Spot => BoundingSphere::from_points(&self.spot_hull_vertices()),
        };
    }

    /// Cone model matrix: unit cone scaled to (range*tan(outer),
    /// range*tan(outer), range), then placed by the world transform.
    pub fn spot_model_matrix(&self) -> Matrix4<f32> {
        let xy_scale = self.range * self.outer_angle.tan();
        self.transform * Matrix4::from_nonuniform_scale(xy_scale, xy_scale, self.range)
    }

    /// The five vertices of the pyramid hull enclosing the light cone:
    /// apex plus the four base corners.
    pub fn spot_hull_vertices(&self) -> [Point3<f32>; 5] {
        let model = self.spot_model_matrix();

        let apex = Point3::new(model.w.x, model.w.y, model.w.z);
        let x_offset = model.x.truncate();
        let y_offset = model.y.truncate();
        let base_center = apex - model.z.truncate();

        [
            apex,
            base_center + x_offset + y_offset,
            base_center - x_offset + y_offset,
            base_center - x_offset - y_offset,
            base_center + x_offset - y_offset,
        ]
    }

    fn view_z_range(&self, camera: &CameraInfo) -> (f32, f32) {
        let view_depth =
            |p: Point3<f32>| -> f32 { (p - camera.position).dot(camera.forward) };

        match self.kind {
            LightKind::Point => {
                let z = view_depth(self.position());
                (z - self.range, z + self.range)
            }
            LightKind::Spot => {
                let mut lo = f32::INFINITY;
                let mut hi = f32::NEG_INFINITY;
                for vertex in self.spot_hull_vertices() {
                    let z = view_depth(vertex);
                    lo = lo.min(z);
                    hi = hi.max(z);
                }
                (lo, hi)
            }
        }
    }
}

/// Per-light metadata consumed by every culling stage (16-byte aligned).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct LightRecordInfo {
    pub kind: u32,
    /// Stable index within the light's kind, assigned in visibility order.
    pub index: u32,
    /// Packed `[min_bin, max_bin]` depth-slice range.
    pub z_range: u32,
    pub _pad: u32,
}

/// Full shading record uploaded for every visible light (16-byte aligned).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ShaderLightRecord {
    pub position: [f32; 3],
    pub inv_range: f32,
    pub direction: [f32; 3],
    pub cos_outer_angle: f32,
    pub diffuse: [f32; 3],
    pub inv_cos_inner_angle: f32,
    pub ambient: [f32; 3],
    pub linear_attenuation: f32,
    pub info: LightRecordInfo,
}

impl ShaderLightRecord {
    fn from_light(light: &Light, info: LightRecordInfo) -> Self {
        let position = light.position();
        let direction = match light.kind {
            LightKind::Spot => -light.transform.z.truncate(),
            LightKind::Point => Vector3::new(0.0, 0.0, 0.0),
        };

        Self {
            position: [position.x, position.y, position.z],
            inv_range: 1.0 / light.range,
            direction: direction.into(),
            cos_outer_angle: light.outer_angle.cos(),
            diffuse: light.diffuse.into(),
            inv_cos_inner_angle: 1.0 / light.inner_angle.cos(),
            ambient: light.ambient.into(),
            linear_attenuation: light.linear_attenuation,
            info,
        }
    }
}

/// Per-frame output of the CPU cull: flat arrays sorted by view-depth
/// midpoint, ready for upload.
#[derive(Default)]
pub struct VisibleLightSet {
    /// Sorted shading records.
    pub records: Vec<ShaderLightRecord>,
    /// Sorted metadata with packed z-bin ranges.
    pub info: Vec<LightRecordInfo>,
    /// Cone model matrices in visibility order, indexed by per-kind spot index.
    pub spot_models: Vec<[[f32; 4]; 4]>,
    /// Per-kind survivor counts (point, spot, directional, padding).
    pub counts: [u32; LIGHT_COUNT_SLOTS],
    /// Indices into the scene light list, in visibility (pre-sort) order.
    pub visible_indices: Vec<usize>,
    /// View-space depth ranges in visibility order, for tests and overlays.
    pub z_ranges: Vec<(f32, f32)>,
}

impl VisibleLightSet {
    pub fn total_count(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn spot_count(&self) -> u32 {
        self.counts[LightKind::Spot.as_index()]
    }
}

/// Authoritative scene light list.
pub struct SceneLights {
    lights: Vec<Light>,
}

impl SceneLights {
    pub fn new(lights: Vec<Light>) -> Self {
        Self { lights }
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Demo scene: paired point and spot lights strung along the Z axis
    /// with randomized positions and colors. The seed is plumbed in
    /// explicitly so runs are reproducible.
    pub fn generate_demo_lights(seed: u64) -> Self {
        const DEMO_LIGHT_PAIRS: usize = 10;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut lights = Vec::with_capacity(DEMO_LIGHT_PAIRS * 2);

        let random_color = |rng: &mut StdRng| -> Vector3<f32> {
            let red = 1.0 / (1.0 + rng.gen_range(0..10) as f32);
            let green = 1.0 / (1.0 + rng.gen_range(0..10) as f32);
            let blue = 1.0 / (1.0 + rng.gen_range(0..10) as f32);
            Vector3::new(red, green, (1.0 - red).max(blue))
        };

        for pair_index in 0..DEMO_LIGHT_PAIRS {
            let row_z = pair_index as f32 * 10.0 - 50.0;

            {
                let x = rng.gen_range(0..10) as f32 * 10.0 - 50.0;
                let transform = Matrix4::from_translation(Vector3::new(x, 5.0, row_z));

                let mut point = Light::point(transform, 25.0);
                point.diffuse = random_color(&mut rng);
                point.ambient = point.diffuse * 0.3;
                point.update_bounds();
                lights.push(point);
            }

            {
                let x = rng.gen_range(-50.0f32..50.0);
                let pitch = rng.gen_range(-120.0f32.to_radians()..-60.0f32.to_radians());
                let transform = Matrix4::from_translation(Vector3::new(x, 5.0, row_z))
                    * Matrix4::from_angle_x(Rad(pitch));

                let outer_angle = rng.gen_range(10.0f32.to_radians()..45.0f32.to_radians());
                let mut spot = Light::spot(transform, 20.0, outer_angle, outer_angle * 0.25);
                spot.diffuse = random_color(&mut rng);
                spot.ambient = spot.diffuse * 0.3;
                spot.update_bounds();
                lights.push(spot);
            }
        }

        Self { lights }
    }

    /// Cull against the camera frustum, compute depth ranges, and build the
    /// sorted upload arrays.
    pub fn build_visible_set(
        &self,
        camera: &CameraInfo,
        frustum: &Frustum,
        z_near: f32,
        z_far: f32,
    ) -> VisibleLightSet {
        let mut set = VisibleLightSet::default();
        let mut unsorted_info: Vec<LightRecordInfo> = Vec::new();
        let mut per_kind_records: [Vec<ShaderLightRecord>; CULLED_LIGHT_KIND_COUNT] =
            [Vec::new(), Vec::new()];

        // Visibility pass: frustum cull and gather per-kind records.
        for (light_index, light) in self.lights.iter().enumerate() {
            if !frustum.intersects_sphere(&light.bounding_sphere()) {
                continue;
            }

            let kind_index = light.kind.as_index();
            let info = LightRecordInfo {
                kind: kind_index as u32,
                index: per_kind_records[kind_index].len() as u32,
                z_range: empty_z_bin_range(),
                _pad: 0,
            };

            per_kind_records[kind_index].push(ShaderLightRecord::from_light(light, info));
            unsorted_info.push(info);

            if light.kind == LightKind::Spot {
                set.spot_models.push(light.spot_model_matrix().into());
            }

            set.z_ranges.push(light.view_z_range(camera));
            set.visible_indices.push(light_index);
        }

        for kind_index in 0..CULLED_LIGHT_KIND_COUNT {
            set.counts[kind_index] = per_kind_records[kind_index].len() as u32;
        }

        // Depth sort: stable, keyed on the midpoint of each light's
        // view-space depth range.
        let mut sort_order: Vec<usize> = (0..unsorted_info.len()).collect();
        sort_order.sort_by(|&a, &b| {
            let mid_a = (set.z_ranges[a].0 + set.z_ranges[a].1) * 0.5;
            let mid_b = (set.z_ranges[b].0 + set.z_ranges[b].1) * 0.5;
            mid_a.total_cmp(&mid_b)
        });

        // Re-emit the flat arrays in sorted order with packed bin ranges.
        let z_step = (z_far - z_near) / Z_BIN_COUNT as f32;
        set.records.reserve(sort_order.len());
        set.info.reserve(sort_order.len());

        for &visible_index in &sort_order {
            let mut info = unsorted_info[visible_index];
            let (z_min, z_max) = set.z_ranges[visible_index];
            let (min_bin, max_bin) = z_bin_range_for_depths(z_min, z_max, z_step);
            info.z_range = pack_z_bin_range(min_bin, max_bin);

            let mut record = per_kind_records[info.kind as usize][info.index as usize];
            record.info = info;

            set.info.push(info);
            set.records.push(record);
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;
    use crate::camera::CameraTransformUpdate;
    use crate::constants::{CAMERA_Z_FAR, CAMERA_Z_NEAR};
    use crate::math::unpack_z_bin_range;

    fn camera_at_origin_minus_ten() -> (CameraInfo, Frustum) {
        let mut camera = CameraState::new();
        camera.apply_transform_update(&CameraTransformUpdate {
            position: [0.0, 0.0, -10.0],
            rotation: [0.0, 0.0],
        });
        let info = camera.info();
        let projection = crate::camera::build_projection(1024, 768);
        let frustum = Frustum::from_view_projection(&(projection * info.view));
        (info, frustum)
    }

    #[test]
    fn single_point_light_z_range_and_bins() {
        // Camera at (0,0,-10) looking +Z; light at origin with range 5.
        let (camera, frustum) = camera_at_origin_minus_ten();
        let light = Light::point(Matrix4::from_translation(Vector3::new(0.0, 0.0, 0.0)), 5.0);
        let lights = SceneLights::new(vec![light]);

        let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
        assert_eq!(set.total_count(), 1);

        let (z_min, z_max) = set.z_ranges[0];
        assert!((z_min - 5.0).abs() < 1e-3);
        assert!((z_max - 15.0).abs() < 1e-3);

        let (min_bin, max_bin) = unpack_z_bin_range(set.info[0].z_range);
        assert_eq!(min_bin, 5);
        assert_eq!(max_bin, 15);
    }

    #[test]
    fn lights_behind_camera_are_rejected() {
        let (camera, frustum) = camera_at_origin_minus_ten();
        let behind = Light::spot(
            Matrix4::from_translation(Vector3::new(0.0, 0.0, -100.0)),
            20.0,
            30.0f32.to_radians(),
            7.5f32.to_radians(),
        );
        let lights = SceneLights::new(vec![behind]);

        let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
        assert_eq!(set.total_count(), 0);
        assert!(set.records.is_empty());
        assert!(set.spot_models.is_empty());
    }

    #[test]
    fn sorted_indices_follow_spatial_z_order() {
        let (camera, frustum) = camera_at_origin_minus_ten();

        // Ten point lights along +Z, inserted in reverse depth order.
        let lights: Vec<Light> = (0..10)
            .rev()
            .map(|i| {
                Light::point(
                    Matrix4::from_translation(Vector3::new(0.0, 0.0, i as f32 * 20.0)),
                    5.0,
                )
            })
            .collect();
        let lights = SceneLights::new(lights);

        let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
        assert_eq!(set.total_count(), 10);

        // Packed ranges must be ascending after the sort.
        let mut previous_min = 0;
        for info in &set.info {
            let (min_bin, max_bin) = unpack_z_bin_range(info.z_range);
            assert!(min_bin >= previous_min);
            assert!(max_bin >= min_bin);
            previous_min = min_bin;
        }
    }

    #[test]
    fn spot_bounding_sphere_encloses_hull() {
        let light = Light::spot(
            Matrix4::from_translation(Vector3::new(3.0, 5.0, -2.0)),
            20.0,
            40.0f32.to_radians(),
            10.0f32.to_radians(),
        );
        let sphere = light.bounding_sphere();
        for vertex in light.spot_hull_vertices() {
            assert!((vertex - sphere.center).magnitude() <= sphere.radius + 1e-4);
        }
    }

    #[test]
    fn demo_lights_are_reproducible_for_a_seed() {
        let a = SceneLights::generate_demo_lights(7);
        let b = SceneLights::generate_demo_lights(7);
        assert_eq!(a.lights().len(), b.lights().len());
        for (la, lb) in a.lights().iter().zip(b.lights().iter()) {
            assert_eq!(la.kind, lb.kind);
            assert_eq!(la.position(), lb.position());
            assert_eq!(la.diffuse, lb.diffuse);
        }
    }

    #[test]
    fn demo_lights_alternate_point_and_spot() {
        let lights = SceneLights::generate_demo_lights(3);
        assert_eq!(lights.lights().len(), 20);
        let point_count = lights
            .lights()
            .iter()
            .filter(|l| l.kind == LightKind::Point)
            .count();
        assert_eq!(point_count, 10);
    }
}
