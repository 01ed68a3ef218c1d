//! Light-volume debug overlay
//!
//! When enabled, accumulates line-list vertices for every visible light:
//! two 36-segment great circles for point lights, the eight pyramid edges
//! for spot lights. The vertex buffer grows to the largest frame observed
//! and is rewritten in place otherwise; failure to grow disables the
//! overlay for the frame instead of failing it.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use cgmath::Matrix4;

use crate::error::EngineResult;
use crate::gpu::shader_library::ShaderLibrary;
use crate::gpu::{depth_stencil_state, GpuContext};
use crate::lights::{Light, LightKind};

const DEBUG_LINE_SHADER: &str = include_str!("debug_lines.wgsl");

const CIRCLE_RESOLUTION: usize = 36;

/// Upper bound on overlay vertices per frame; beyond this the overlay is
/// dropped for the frame rather than growing without bound.
const MAX_DEBUG_VERTICES: usize = 1 << 20;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LineVertex {
    position: [f32; 4],
    color: [f32; 4],
}

pub struct DebugLineRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,

    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,

    vertices: Vec<LineVertex>,
    frame_vertex_count: u32,
    enabled: bool,
}

impl DebugLineRenderer {
    pub fn new(
        gpu: &GpuContext,
        shaders: &mut ShaderLibrary,
        enabled: bool,
    ) -> EngineResult<Self> {
        let device = Arc::clone(gpu.device());

        let shader = shaders.compile("debug_lines", DEBUG_LINE_SHADER, &[])?;

        let camera_buffer =
            gpu.create_uniform_buffer("Debug Line Camera", std::mem::size_of::<[[f32; 4]; 4]>() as u64);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Debug Line Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Debug Line Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Debug Line Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Debug Line Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<LineVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.surface_format(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(depth_stencil_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let initial_capacity = 1024;
        let vertex_buffer = create_vertex_buffer(&device, initial_capacity);

        Ok(Self {
            device,
            queue: Arc::clone(gpu.queue()),
            pipeline,
            bind_group,
            camera_buffer,
            vertex_buffer,
            vertex_capacity: initial_capacity,
            vertices: Vec::new(),
            frame_vertex_count: 0,
            enabled,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
        log::info!(
            "[DebugLineRenderer::toggle] Overlay {}",
            if self.enabled { "enabled" } else { "disabled" }
        );
    }

    /// Queue the outline of one visible light.
    pub fn add_visible_light(&mut self, light: &Light) {
        if !self.enabled {
            return;
        }

        let color = [light.diffuse.x, light.diffuse.y, light.diffuse.z, 1.0];

        match light.kind {
            LightKind::Point => {
                let center = light.position();
                let center = [center.x, center.y, center.z];
                // Horizontal (XZ) then vertical (XY) great circle.
                self.add_circle(center, light.range, color, false);
                self.add_circle(center, light.range, color, true);
            }
            LightKind::Spot => {
                let hull = light.spot_hull_vertices();
                let vertex = |i: usize| LineVertex {
                    position: [hull[i].x, hull[i].y, hull[i].z, 1.0],
                    color,
                };

                // Apex to each base corner, then around the base.
                for corner in 1..=4 {
                    self.vertices.push(vertex(0));
                    self.vertices.push(vertex(corner));
                }
                for corner in 1..=4 {
                    self.vertices.push(vertex(corner));
                    self.vertices.push(vertex(corner % 4 + 1));
                }
            }
        }
    }

    fn add_circle(&mut self, center: [f32; 3], radius: f32, color: [f32; 4], vertical: bool) {
        let angle_step = std::f32::consts::TAU / CIRCLE_RESOLUTION as f32;

        let point_at = |angle: f32| -> LineVertex {
            let (sin, cos) = angle.sin_cos();
            let mut position = [center[0] + radius * cos, center[1], center[2], 1.0];
            if vertical {
                position[1] += radius * sin;
            } else {
                position[2] = center[2] + radius * sin;
            }
            LineVertex { position, color }
        };

        for segment in 0..CIRCLE_RESOLUTION {
            self.vertices.push(point_at(segment as f32 * angle_step));
            self.vertices
                .push(point_at((segment + 1) as f32 * angle_step));
        }
    }

    /// Upload the frame's vertices. Returns whether the overlay should be
    /// drawn this frame.
    pub fn prepare(&mut self, view_projection: &Matrix4<f32>) -> bool {
        if !self.enabled || self.vertices.is_empty() {
            self.vertices.clear();
            self.frame_vertex_count = 0;
            return false;
        }

        if self.vertices.len() > MAX_DEBUG_VERTICES {
            log::error!(
                "[DebugLineRenderer::prepare] {} vertices exceed overlay budget, skipping",
                self.vertices.len()
            );
            self.vertices.clear();
            self.frame_vertex_count = 0;
            return false;
        }

        if self.vertices.len() > self.vertex_capacity {
            self.vertex_capacity = self.vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
        }

        let vp: [[f32; 4]; 4] = (*view_projection).into();
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&vp));
        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));

        self.frame_vertex_count = self.vertices.len() as u32;
        self.vertices.clear();
        true
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        if self.frame_vertex_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..self.frame_vertex_count, 0..1);
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Debug Line Vertex Buffer"),
        size: (capacity * std::mem::size_of::<LineVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
