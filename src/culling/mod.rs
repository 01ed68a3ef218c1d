//! Four-stage GPU light-culling pipeline
//!
//! Reduces the frame's visible light set to per-tile, per-depth-slice
//! acceptance structures: Z binning, spot-light frustum transform, per-light
//! tile setup, and per-tile bit-mask generation. GPU resources live in two
//! enum-indexed tables (constant buffers and shader resources) sized once at
//! startup from `MAX_LIGHT_COUNT`; per-frame data arrives through
//! `Queue::write_buffer` uploads.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use cgmath::Matrix4;
use wgpu::util::DeviceExt;

use crate::camera::{clip_scale, CameraInfo};
use crate::constants::{
    integer_division_ceil, LIGHT_BATCH_SIZE, MAX_CS_THREAD_COUNT, MAX_LIGHT_BATCH_COUNT,
    MAX_LIGHT_COUNT, SPOT_LIGHT_CULLING_DATA_STRIDE, TILES_PER_GROUP, TILE_COUNT,
    TILE_CULLING_DATA_STRIDE, Z_BINNING_GROUP_SIZE, Z_BIN_COUNT,
};
use crate::error::{EngineError, EngineResult};
use crate::gpu::shader_library::{default_shader_macros, ShaderLibrary, ShaderMacro};
use crate::gpu::GpuContext;
use crate::lights::{LightRecordInfo, ShaderLightRecord, VisibleLightSet};

const COMMON_SHADER: &str = include_str!("shaders/common.wgsl");
const Z_BINNING_SHADER: &str = include_str!("shaders/z_binning.wgsl");
const SPOT_TRANSFORM_SHADER: &str = include_str!("shaders/spot_transform.wgsl");
const TILE_SETUP_SHADER: &str = include_str!("shaders/tile_setup.wgsl");
const TILE_CULLING_SHADER: &str = include_str!("shaders/tile_culling.wgsl");

/// Stride of one invocation-index slice in the Z-binning uniform; dynamic
/// offsets must respect the 256-byte uniform alignment.
const ZBIN_UNIFORM_STRIDE: u32 = 256;

/// Global frame parameters uploaded once per frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameParameters {
    /// Always-on light not subject to tile masking; zero-initialized in
    /// this revision.
    pub global_light: ShaderLightRecord,
    pub light_counts: [u32; 4],
    pub z_near: f32,
    pub z_far: f32,
    pub resolution: [u32; 2],
}

/// Camera constants consumed by the compute stages.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CullingConstants {
    pub camera_pos: [f32; 4],
    pub camera_front: [f32; 4],
    pub clip_scale: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ZBinningInvocation {
    invocation: u32,
    _pad: [u32; 3],
}

/// Constant-buffer table slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstantBufferId {
    Parameters,
    CsConstants,
    ZBinningConstants,
}

const CONSTANT_BUFFER_COUNT: usize = 3;

impl ConstantBufferId {
    fn index(self) -> usize {
        self as usize
    }
}

/// Shader-resource table slots. `ZBins`, `SpotLightCullingData`,
/// `TileCullingData` and `TileBitMasks` are written by compute stages;
/// the rest are CPU uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShaderResourceId {
    LightInfo,
    ZBins,
    SpotLightModels,
    SpotLightCullingData,
    TileCullingData,
    TileBitMasks,
    LightData,
}

const SHADER_RESOURCE_COUNT: usize = 7;

impl ShaderResourceId {
    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            ShaderResourceId::LightInfo => "Light Info",
            ShaderResourceId::ZBins => "Z Bins",
            ShaderResourceId::SpotLightModels => "Spot Light Models",
            ShaderResourceId::SpotLightCullingData => "Spot Light Culling Data",
            ShaderResourceId::TileCullingData => "Tile Culling Data",
            ShaderResourceId::TileBitMasks => "Tile Bit Masks",
            ShaderResourceId::LightData => "Light Data",
        }
    }

    fn byte_size(self) -> u64 {
        let element_size = match self {
            ShaderResourceId::LightInfo => std::mem::size_of::<LightRecordInfo>() as u64,
            ShaderResourceId::ZBins => 4,
            ShaderResourceId::SpotLightModels => 64,
            ShaderResourceId::SpotLightCullingData => 16,
            ShaderResourceId::TileCullingData => 16,
            ShaderResourceId::TileBitMasks => 4,
            ShaderResourceId::LightData => std::mem::size_of::<ShaderLightRecord>() as u64,
        };
        let element_count = match self {
            ShaderResourceId::LightInfo => MAX_LIGHT_COUNT,
            ShaderResourceId::ZBins => Z_BIN_COUNT,
            ShaderResourceId::SpotLightModels => MAX_LIGHT_COUNT,
            ShaderResourceId::SpotLightCullingData => {
                MAX_LIGHT_COUNT * SPOT_LIGHT_CULLING_DATA_STRIDE
            }
            ShaderResourceId::TileCullingData => MAX_LIGHT_COUNT * TILE_CULLING_DATA_STRIDE,
            ShaderResourceId::TileBitMasks => TILE_COUNT * MAX_LIGHT_BATCH_COUNT,
            ShaderResourceId::LightData => MAX_LIGHT_COUNT,
        };
        element_size * element_count as u64
    }
}

/// Per-frame progression of the pipeline. Any failure drops back to `Idle`
/// and the frame is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Uploading,
    DispatchZBin,
    DispatchSpot,
    DispatchTileSetup,
    DispatchTileCull,
    BoundForDraw,
}

pub struct CullingPipeline {
    queue: Arc<wgpu::Queue>,

    constant_buffers: [wgpu::Buffer; CONSTANT_BUFFER_COUNT],
    resource_buffers: [wgpu::Buffer; SHADER_RESOURCE_COUNT],

    z_bin_clear_pipeline: wgpu::ComputePipeline,
    z_binning_pipeline: wgpu::ComputePipeline,
    spot_transform_pipeline: wgpu::ComputePipeline,
    tile_setup_pipeline: wgpu::ComputePipeline,
    tile_culling_pipeline: wgpu::ComputePipeline,

    common_bind_group: wgpu::BindGroup,
    z_binning_bind_group: wgpu::BindGroup,
    spot_transform_bind_group: wgpu::BindGroup,
    tile_setup_bind_group: wgpu::BindGroup,
    tile_culling_bind_group: wgpu::BindGroup,

    draw_bind_group_layout: wgpu::BindGroupLayout,
    draw_bind_group: wgpu::BindGroup,

    state: FrameState,
}

impl CullingPipeline {
    pub fn new(gpu: &GpuContext, shaders: &mut ShaderLibrary) -> EngineResult<Self> {
        let device = Arc::clone(gpu.device());

        // Constant-buffer table.
        let parameters_buffer = gpu.create_uniform_buffer(
            "Forward+ Parameters",
            std::mem::size_of::<FrameParameters>() as u64,
        );
        let cs_constants_buffer = gpu.create_uniform_buffer(
            "Forward+ CS Constants",
            std::mem::size_of::<CullingConstants>() as u64,
        );
        let z_binning_constants_buffer = create_z_binning_constants(&device);
        let constant_buffers = [
            parameters_buffer,
            cs_constants_buffer,
            z_binning_constants_buffer,
        ];

        // Shader-resource table, sized once from MAX_LIGHT_COUNT.
        let resource_buffers = [
            ShaderResourceId::LightInfo,
            ShaderResourceId::ZBins,
            ShaderResourceId::SpotLightModels,
            ShaderResourceId::SpotLightCullingData,
            ShaderResourceId::TileCullingData,
            ShaderResourceId::TileBitMasks,
            ShaderResourceId::LightData,
        ]
        .map(|id| gpu.create_storage_buffer(id.label(), id.byte_size()));

        // Compute shaders, each with its stage-specific macro set.
        let default_macros = default_shader_macros();

        let z_binning_module = {
            let mut macros = default_macros.clone();
            macros.push(ShaderMacro::MaxCsThreadCount);
            macros.push(ShaderMacro::ZBinningGroupSize);
            shaders.compile(
                "z_binning",
                &format!("{}\n{}", COMMON_SHADER, Z_BINNING_SHADER),
                &macros,
            )?
        };

        let spot_transform_module = {
            let mut macros = default_macros.clone();
            macros.push(ShaderMacro::MaxCsThreadCount);
            shaders.compile(
                "spot_transform",
                &format!("{}\n{}", COMMON_SHADER, SPOT_TRANSFORM_SHADER),
                &macros,
            )?
        };

        let tile_setup_module = {
            let mut macros = default_macros.clone();
            macros.push(ShaderMacro::MaxCsThreadCount);
            shaders.compile(
                "tile_setup",
                &format!("{}\n{}", COMMON_SHADER, TILE_SETUP_SHADER),
                &macros,
            )?
        };

        let tile_culling_module = {
            let mut macros = default_macros;
            macros.push(ShaderMacro::MaxCsThreadCount);
            macros.push(ShaderMacro::LightsPerGroup);
            macros.push(ShaderMacro::TilesPerGroup);
            shaders.compile(
                "tile_culling",
                &format!("{}\n{}", COMMON_SHADER, TILE_CULLING_SHADER),
                &macros,
            )?
        };

        // Group 0, shared by every stage: frame parameters, camera
        // constants and the sorted light info.
        let common_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Culling Common Bind Group Layout"),
            entries: &[
                uniform_entry(0, false),
                uniform_entry(1, false),
                storage_entry(2, true),
            ],
        });

        let z_binning_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Z Binning Bind Group Layout"),
            entries: &[uniform_entry(0, true), storage_entry(1, false)],
        });

        let spot_transform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Spot Transform Bind Group Layout"),
                entries: &[storage_entry(0, true), storage_entry(1, false)],
            });

        let tile_setup_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Setup Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        let tile_culling_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Tile Culling Bind Group Layout"),
                entries: &[storage_entry(0, true), storage_entry(1, false)],
            });

        let make_pipeline = |label: &str,
                             stage_layout: &wgpu::BindGroupLayout,
                             module: &wgpu::ShaderModule,
                             entry_point: &str| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&common_layout, stage_layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point,
            })
        };

        let z_bin_clear_pipeline = make_pipeline(
            "Z Bin Clear Pipeline",
            &z_binning_layout,
            &z_binning_module,
            "clear_bins",
        );
        let z_binning_pipeline = make_pipeline(
            "Z Binning Pipeline",
            &z_binning_layout,
            &z_binning_module,
            "main",
        );
        let spot_transform_pipeline = make_pipeline(
            "Spot Transform Pipeline",
            &spot_transform_layout,
            &spot_transform_module,
            "main",
        );
        let tile_setup_pipeline = make_pipeline(
            "Tile Setup Pipeline",
            &tile_setup_layout,
            &tile_setup_module,
            "main",
        );
        let tile_culling_pipeline = make_pipeline(
            "Tile Culling Pipeline",
            &tile_culling_layout,
            &tile_culling_module,
            "main",
        );

        let buffer =
            |id: ShaderResourceId| -> &wgpu::Buffer { &resource_buffers[id.index()] };

        let common_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Culling Common Bind Group"),
            layout: &common_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: constant_buffers[ConstantBufferId::Parameters.index()]
                        .as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: constant_buffers[ConstantBufferId::CsConstants.index()]
                        .as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer(ShaderResourceId::LightInfo).as_entire_binding(),
                },
            ],
        });

        let z_binning_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Z Binning Bind Group"),
            layout: &z_binning_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &constant_buffers[ConstantBufferId::ZBinningConstants.index()],
                        offset: 0,
                        size: wgpu::BufferSize::new(
                            std::mem::size_of::<ZBinningInvocation>() as u64
                        ),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(ShaderResourceId::ZBins).as_entire_binding(),
                },
            ],
        });

        let spot_transform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Spot Transform Bind Group"),
            layout: &spot_transform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer(ShaderResourceId::SpotLightModels).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(ShaderResourceId::SpotLightCullingData).as_entire_binding(),
                },
            ],
        });

        let tile_setup_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Setup Bind Group"),
            layout: &tile_setup_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer(ShaderResourceId::SpotLightCullingData).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(ShaderResourceId::LightData).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer(ShaderResourceId::TileCullingData).as_entire_binding(),
                },
            ],
        });

        let tile_culling_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Culling Bind Group"),
            layout: &tile_culling_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer(ShaderResourceId::TileCullingData).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(ShaderResourceId::TileBitMasks).as_entire_binding(),
                },
            ],
        });

        // Fragment-side acceptance structures for the draw pass.
        let draw_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Forward+ Draw Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    fragment_storage_entry(1),
                    fragment_storage_entry(2),
                    fragment_storage_entry(3),
                ],
            });

        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Forward+ Draw Bind Group"),
            layout: &draw_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: constant_buffers[ConstantBufferId::Parameters.index()]
                        .as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(ShaderResourceId::ZBins).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer(ShaderResourceId::TileBitMasks).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffer(ShaderResourceId::LightData).as_entire_binding(),
                },
            ],
        });

        log::info!("[CullingPipeline::new] Pipeline resources created");

        Ok(Self {
            queue: Arc::clone(gpu.queue()),
            constant_buffers,
            resource_buffers,
            z_bin_clear_pipeline,
            z_binning_pipeline,
            spot_transform_pipeline,
            tile_setup_pipeline,
            tile_culling_pipeline,
            common_bind_group,
            z_binning_bind_group,
            spot_transform_bind_group,
            tile_setup_bind_group,
            tile_culling_bind_group,
            draw_bind_group_layout,
            draw_bind_group,
            state: FrameState::Idle,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn draw_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.draw_bind_group_layout
    }

    pub fn draw_bind_group(&self) -> &wgpu::BindGroup {
        &self.draw_bind_group
    }

    /// Upload the frame's light set and encode the four culling stages.
    /// On success the acceptance structures are ready for the draw pass.
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        visible: &VisibleLightSet,
        camera: &CameraInfo,
        projection: &Matrix4<f32>,
        resolution: (u32, u32),
        z_near: f32,
        z_far: f32,
    ) -> EngineResult<()> {
        let total_count = visible.total_count();
        if total_count > MAX_LIGHT_COUNT {
            self.state = FrameState::Idle;
            return Err(EngineError::FrameSkipped {
                reason: format!(
                    "visible light count {} exceeds capacity {}",
                    total_count, MAX_LIGHT_COUNT
                ),
            });
        }

        self.state = FrameState::Uploading;

        if !visible.info.is_empty() {
            self.write_resource(ShaderResourceId::LightInfo, bytemuck::cast_slice(&visible.info));
            self.write_resource(
                ShaderResourceId::LightData,
                bytemuck::cast_slice(&visible.records),
            );
        }
        if !visible.spot_models.is_empty() {
            self.write_resource(
                ShaderResourceId::SpotLightModels,
                bytemuck::cast_slice(&visible.spot_models),
            );
        }

        let parameters = FrameParameters {
            global_light: ShaderLightRecord::zeroed(),
            light_counts: visible.counts,
            z_near,
            z_far,
            resolution: [resolution.0, resolution.1],
        };
        let cs_constants = CullingConstants {
            camera_pos: [camera.position.x, camera.position.y, camera.position.z, 1.0],
            camera_front: [camera.forward.x, camera.forward.y, camera.forward.z, 0.0],
            clip_scale: clip_scale(projection).into(),
            view: camera.view.into(),
            view_projection: (projection * camera.view).into(),
        };
        self.write_constant(ConstantBufferId::Parameters, bytemuck::bytes_of(&parameters));
        self.write_constant(
            ConstantBufferId::CsConstants,
            bytemuck::bytes_of(&cs_constants),
        );

        // Tile masks are zero-cleared every frame so tiles beyond the
        // dispatched batches never carry stale acceptance bits.
        encoder.clear_buffer(
            &self.resource_buffers[ShaderResourceId::TileBitMasks.index()],
            0,
            None,
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Light Culling Pass"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &self.common_bind_group, &[]);

        // Stage 1: Z binning. Clear all bins to the empty sentinel, then
        // fold the light chunks in, one dispatch per chunk.
        self.state = FrameState::DispatchZBin;
        let bin_groups = Z_BIN_COUNT / Z_BINNING_GROUP_SIZE;

        pass.set_pipeline(&self.z_bin_clear_pipeline);
        pass.set_bind_group(1, &self.z_binning_bind_group, &[0]);
        pass.dispatch_workgroups(bin_groups, 1, 1);

        pass.set_pipeline(&self.z_binning_pipeline);
        let invocation_count = integer_division_ceil(total_count, Z_BINNING_GROUP_SIZE);
        for invocation in 0..invocation_count {
            pass.set_bind_group(
                1,
                &self.z_binning_bind_group,
                &[invocation * ZBIN_UNIFORM_STRIDE],
            );
            pass.dispatch_workgroups(bin_groups, 1, 1);
        }

        // Stage 2: spot-light transform, skipped when no spot lights
        // survived the CPU cull.
        self.state = FrameState::DispatchSpot;
        let spot_groups = integer_division_ceil(visible.spot_count(), MAX_CS_THREAD_COUNT);
        if spot_groups > 0 {
            pass.set_pipeline(&self.spot_transform_pipeline);
            pass.set_bind_group(1, &self.spot_transform_bind_group, &[]);
            pass.dispatch_workgroups(spot_groups, 1, 1);
        }

        // Stage 3: per-light tile setup.
        self.state = FrameState::DispatchTileSetup;
        let setup_groups = integer_division_ceil(total_count, MAX_CS_THREAD_COUNT);
        if setup_groups > 0 {
            pass.set_pipeline(&self.tile_setup_pipeline);
            pass.set_bind_group(1, &self.tile_setup_bind_group, &[]);
            pass.dispatch_workgroups(setup_groups, 1, 1);
        }

        // Stage 4: tile culling across (light batch, tile group).
        self.state = FrameState::DispatchTileCull;
        let batch_groups = integer_division_ceil(total_count, LIGHT_BATCH_SIZE);
        let tile_groups = integer_division_ceil(TILE_COUNT, TILES_PER_GROUP);
        if batch_groups > 0 {
            pass.set_pipeline(&self.tile_culling_pipeline);
            pass.set_bind_group(1, &self.tile_culling_bind_group, &[]);
            pass.dispatch_workgroups(batch_groups, tile_groups, 1);
        }

        drop(pass);

        self.state = FrameState::BoundForDraw;
        Ok(())
    }

    /// Return to `Idle` after the frame's draw pass has consumed the
    /// acceptance structures (or after a failure).
    pub fn finish_frame(&mut self) {
        self.state = FrameState::Idle;
    }

    fn write_resource(&self, id: ShaderResourceId, bytes: &[u8]) {
        self.queue
            .write_buffer(&self.resource_buffers[id.index()], 0, bytes);
    }

    fn write_constant(&self, id: ConstantBufferId, bytes: &[u8]) {
        self.queue
            .write_buffer(&self.constant_buffers[id.index()], 0, bytes);
    }
}

/// Build the pre-filled invocation-index uniform: slice `i` holds `i`,
/// selected at dispatch time through a dynamic offset.
fn create_z_binning_constants(device: &wgpu::Device) -> wgpu::Buffer {
    let max_invocations = integer_division_ceil(MAX_LIGHT_COUNT, Z_BINNING_GROUP_SIZE);
    let mut contents = vec![0u8; (max_invocations * ZBIN_UNIFORM_STRIDE) as usize];

    for invocation in 0..max_invocations {
        let record = ZBinningInvocation {
            invocation,
            _pad: [0; 3],
        };
        let offset = (invocation * ZBIN_UNIFORM_STRIDE) as usize;
        contents[offset..offset + std::mem::size_of::<ZBinningInvocation>()]
            .copy_from_slice(bytemuck::bytes_of(&record));
    }

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Z Binning Constants"),
        contents: &contents,
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

fn uniform_entry(binding: u32, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn fragment_storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_resource_capacities_match_constants() {
        assert_eq!(ShaderResourceId::ZBins.byte_size(), (Z_BIN_COUNT * 4) as u64);
        assert_eq!(
            ShaderResourceId::TileBitMasks.byte_size(),
            (TILE_COUNT * MAX_LIGHT_BATCH_COUNT * 4) as u64
        );
        assert_eq!(
            ShaderResourceId::LightData.byte_size(),
            (MAX_LIGHT_COUNT as u64) * 80
        );
        assert_eq!(
            ShaderResourceId::LightInfo.byte_size(),
            (MAX_LIGHT_COUNT as u64) * 16
        );
    }

    #[test]
    fn gpu_struct_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<ShaderLightRecord>(), 80);
        assert_eq!(std::mem::size_of::<LightRecordInfo>(), 16);
        assert_eq!(std::mem::size_of::<FrameParameters>() % 16, 0);
        assert_eq!(std::mem::size_of::<CullingConstants>(), 176);
        assert_eq!(std::mem::size_of::<ZBinningInvocation>(), 16);
    }

    #[test]
    fn z_binning_dispatch_counts() {
        assert_eq!(Z_BIN_COUNT / Z_BINNING_GROUP_SIZE, 8);
        assert_eq!(integer_division_ceil(0, Z_BINNING_GROUP_SIZE), 0);
        assert_eq!(integer_division_ceil(1, Z_BINNING_GROUP_SIZE), 1);
        assert_eq!(integer_division_ceil(200, Z_BINNING_GROUP_SIZE), 2);
    }
}
