//! Demo scene geometry and the forward draw pass
//!
//! Owns the static vertex buffer (cubes, pyramids, a ground plane), the
//! per-object instance table, and the forward render pipeline that consumes
//! the culling pipeline's acceptance structures. Objects are frustum-culled
//! on the CPU; survivors get their constants written into a dynamic-offset
//! uniform slice and a non-indexed draw at their type's vertex range.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use wgpu::util::DeviceExt;

use crate::camera::CameraUniform;
use crate::error::{EngineError, EngineResult};
use crate::gpu::shader_library::{default_shader_macros, ShaderLibrary};
use crate::gpu::{depth_stencil_state, GpuContext, CLEAR_COLOR, CLEAR_DEPTH};
use crate::math::{Aabb, Frustum};

const FORWARD_SHADER: &str = include_str!("shaders/forward.wgsl");

/// Uniform slice stride for per-draw constants (256-byte dynamic-offset
/// alignment).
const PER_DRAW_STRIDE: u32 = 256;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

impl Vertex {
    fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            normal: [normal.x, normal.y, normal.z, 0.0],
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Material {
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PerDrawData {
    pub model: [[f32; 4]; 4],
    pub inv_model: [[f32; 4]; 4],
    pub material: Material,
}

/// Demo object shapes; each owns a contiguous vertex range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Cube,
    Pyramid,
    Plane,
}

const OBJECT_TYPE_COUNT: usize = 3;

impl ObjectType {
    fn index(self) -> usize {
        self as usize
    }
}

/// Vertex range of one object type in the shared vertex buffer.
#[derive(Debug, Clone, Copy, Default)]
struct ObjectInfo {
    vertex_offset: u32,
    vertex_count: u32,
}

struct ObjectInstance {
    object_type: ObjectType,
    bounding_box: Aabb,
    per_draw: PerDrawData,
}

/// A frame's visible draws: instance index plus its uniform slice offset.
pub struct DrawList {
    items: Vec<(ObjectType, u32)>,
}

pub struct SceneDraw {
    queue: Arc<wgpu::Queue>,

    vertex_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    per_draw_buffer: wgpu::Buffer,

    object_info: [ObjectInfo; OBJECT_TYPE_COUNT],
    instances: Vec<ObjectInstance>,

    pipeline: wgpu::RenderPipeline,
    object_bind_group: wgpu::BindGroup,
}

impl SceneDraw {
    pub fn new(
        gpu: &GpuContext,
        shaders: &mut ShaderLibrary,
        culling_layout: &wgpu::BindGroupLayout,
    ) -> EngineResult<Self> {
        let device = gpu.device();

        let mut object_info = [ObjectInfo::default(); OBJECT_TYPE_COUNT];
        let mut vertices = Vec::new();
        let mut instances = Vec::new();

        generate_cubes(&mut vertices, &mut object_info, &mut instances);
        generate_pyramids(&mut vertices, &mut object_info, &mut instances);
        generate_plane(&mut vertices, &mut object_info, &mut instances);

        if instances.len() as u64 * PER_DRAW_STRIDE as u64 > u32::MAX as u64 {
            return Err(EngineError::SystemError {
                component: "scene".to_string(),
                error: "instance table exceeds uniform offset range".to_string(),
            });
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let camera_buffer =
            gpu.create_uniform_buffer("Scene Camera", std::mem::size_of::<CameraUniform>() as u64);
        let per_draw_buffer = gpu.create_uniform_buffer(
            "Scene Per Draw",
            instances.len() as u64 * PER_DRAW_STRIDE as u64,
        );

        let shader = shaders.compile("forward", FORWARD_SHADER, &default_shader_macros())?;

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Object Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Object Bind Group"),
            layout: &object_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &per_draw_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<PerDrawData>() as u64),
                    }),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Forward Pipeline Layout"),
            bind_group_layouts: &[&object_layout, culling_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Forward Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
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
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(depth_stencil_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        log::info!(
            "[SceneDraw::new] {} vertices, {} instances",
            vertices.len(),
            instances.len()
        );

        Ok(Self {
            queue: Arc::clone(gpu.queue()),
            vertex_buffer,
            camera_buffer,
            per_draw_buffer,
            object_info,
            instances,
            pipeline,
            object_bind_group,
        })
    }

    /// CPU-cull the instance table and upload camera plus per-draw
    /// constants for the survivors.
    pub fn prepare(&self, camera: &CameraUniform, frustum: &Frustum) -> DrawList {
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));

        let mut items = Vec::with_capacity(self.instances.len());
        for (index, instance) in self.instances.iter().enumerate() {
            if !frustum.intersects_aabb(&instance.bounding_box) {
                continue;
            }

            let offset = index as u32 * PER_DRAW_STRIDE;
            self.queue.write_buffer(
                &self.per_draw_buffer,
                offset as u64,
                bytemuck::bytes_of(&instance.per_draw),
            );
            items.push((instance.object_type, offset));
        }

        DrawList { items }
    }

    /// Begin the frame's render pass with the fixed clear values.
    pub fn begin_render_pass<'a>(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        depth_view: &'a wgpu::TextureView,
    ) -> wgpu::RenderPass<'a> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Forward Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_DEPTH),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    pub fn draw<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        draw_list: &DrawList,
        culling_bind_group: &'a wgpu::BindGroup,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, culling_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

        for &(object_type, offset) in &draw_list.items {
            let info = self.object_info[object_type.index()];
            pass.set_bind_group(0, &self.object_bind_group, &[offset]);
            pass.draw(
                info.vertex_offset..info.vertex_offset + info.vertex_count,
                0..1,
            );
        }
    }

}

fn make_instance(object_type: ObjectType, model: Matrix4<f32>, material: Material) -> ObjectInstance {
    let half_extents = match object_type {
        // The plane gets a tiny vertical extent so the intersection tests
        // behave.
        ObjectType::Plane => Vector3::new(0.5, 0.001, 0.5),
        _ => Vector3::new(0.5, 0.5, 0.5),
    };
    let local_box = Aabb::new(Point3::new(0.0, 0.0, 0.0), half_extents);

    let inv_model = model.invert().unwrap_or_else(Matrix4::identity);

    ObjectInstance {
        object_type,
        bounding_box: local_box.transformed(&model),
        per_draw: PerDrawData {
            model: model.into(),
            inv_model: inv_model.into(),
            material,
        },
    }
}

fn generate_cubes(
    vertices: &mut Vec<Vertex>,
    object_info: &mut [ObjectInfo; OBJECT_TYPE_COUNT],
    instances: &mut Vec<ObjectInstance>,
) {
    let corners = [
        Point3::new(0.5, -0.5, 0.5),
        Point3::new(-0.5, -0.5, 0.5),
        Point3::new(-0.5, -0.5, -0.5),
        Point3::new(0.5, -0.5, -0.5),
        Point3::new(0.5, 0.5, 0.5),
        Point3::new(-0.5, 0.5, 0.5),
        Point3::new(-0.5, 0.5, -0.5),
        Point3::new(0.5, 0.5, -0.5),
    ];

    let info = &mut object_info[ObjectType::Cube.index()];
    info.vertex_offset = vertices.len() as u32;

    let mut add_face = |indices: [usize; 4], normal: Vector3<f32>| {
        let quad: Vec<Vertex> = indices
            .iter()
            .map(|&i| Vertex::new(corners[i], normal))
            .collect();
        vertices.extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
    };

    add_face([0, 1, 2, 3], Vector3::new(0.0, -1.0, 0.0)); // bottom
    add_face([7, 4, 0, 3], Vector3::new(1.0, 0.0, 0.0)); // right
    add_face([4, 5, 1, 0], Vector3::new(0.0, 0.0, 1.0)); // back
    add_face([5, 6, 2, 1], Vector3::new(-1.0, 0.0, 0.0)); // left
    add_face([6, 7, 3, 2], Vector3::new(0.0, 0.0, -1.0)); // front
    add_face([5, 4, 7, 6], Vector3::new(0.0, 1.0, 0.0)); // top

    info.vertex_count = vertices.len() as u32 - info.vertex_offset;

    instances.push(make_instance(
        ObjectType::Cube,
        Matrix4::from_translation(Vector3::new(1.0, 0.5, 0.0)),
        Material {
            diffuse: [1.0, 0.0, 1.0, 1.0],
            ambient: [1.0, 1.0, 1.0, 1.0],
        },
    ));
}

fn generate_pyramids(
    vertices: &mut Vec<Vertex>,
    object_info: &mut [ObjectInfo; OBJECT_TYPE_COUNT],
    instances: &mut Vec<ObjectInstance>,
) {
    let corners = [
        Point3::new(0.5, -0.5, 0.5),
        Point3::new(-0.5, -0.5, 0.5),
        Point3::new(-0.5, -0.5, -0.5),
        Point3::new(0.5, -0.5, -0.5),
        Point3::new(0.0, 0.5, 0.0),
    ];

    let info = &mut object_info[ObjectType::Pyramid.index()];
    info.vertex_offset = vertices.len() as u32;

    // Base quad.
    let base_normal = Vector3::new(0.0, -1.0, 0.0);
    let base: Vec<Vertex> = corners[..4]
        .iter()
        .map(|&p| Vertex::new(p, base_normal))
        .collect();
    vertices.extend_from_slice(&[base[0], base[1], base[2], base[0], base[2], base[3]]);

    let mut add_side = |indices: [usize; 3], normal: Vector3<f32>| {
        for &i in &indices {
            vertices.push(Vertex::new(corners[i], normal));
        }
    };

    add_side([0, 3, 4], Vector3::new(0.5, 0.5, 0.0)); // right
    add_side([1, 0, 4], Vector3::new(0.0, 0.5, 0.5)); // back
    add_side([2, 1, 4], Vector3::new(-0.5, 0.5, 0.0)); // left
    add_side([3, 2, 4], Vector3::new(0.0, 0.5, -0.5)); // front

    info.vertex_count = vertices.len() as u32 - info.vertex_offset;

    instances.push(make_instance(
        ObjectType::Pyramid,
        Matrix4::from_translation(Vector3::new(-1.0, 0.5, 0.0)),
        Material {
            diffuse: [0.0, 1.0, 1.0, 1.0],
            ambient: [1.0, 1.0, 1.0, 1.0],
        },
    ));
}

fn generate_plane(
    vertices: &mut Vec<Vertex>,
    object_info: &mut [ObjectInfo; OBJECT_TYPE_COUNT],
    instances: &mut Vec<ObjectInstance>,
) {
    const PLANE_RESOLUTION: usize = 32;
    const PLANE_STEP: f32 = 1.0 / PLANE_RESOLUTION as f32;

    let info = &mut object_info[ObjectType::Plane.index()];
    info.vertex_offset = vertices.len() as u32;

    let normal = Vector3::new(0.0, 1.0, 0.0);
    let mut z_offset = 0.5;
    for _ in 0..PLANE_RESOLUTION {
        let mut x_offset = -0.5;
        for _ in 0..PLANE_RESOLUTION {
            let top_left = Point3::new(x_offset, 0.0, z_offset);
            let top_right = Point3::new(x_offset + PLANE_STEP, 0.0, z_offset);
            let bottom_left = Point3::new(x_offset, 0.0, z_offset - PLANE_STEP);
            let bottom_right = Point3::new(x_offset + PLANE_STEP, 0.0, z_offset - PLANE_STEP);

            vertices.push(Vertex::new(top_left, normal));
            vertices.push(Vertex::new(top_right, normal));
            vertices.push(Vertex::new(bottom_left, normal));

            vertices.push(Vertex::new(top_right, normal));
            vertices.push(Vertex::new(bottom_right, normal));
            vertices.push(Vertex::new(bottom_left, normal));

            x_offset += PLANE_STEP;
        }
        z_offset -= PLANE_STEP;
    }

    info.vertex_count = vertices.len() as u32 - info.vertex_offset;

    instances.push(make_instance(
        ObjectType::Plane,
        Matrix4::from_nonuniform_scale(100.0, 1.0, 100.0),
        Material {
            diffuse: [1.0, 1.0, 0.0, 1.0],
            ambient: [1.0, 1.0, 1.0, 1.0],
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_geometry() -> (
        Vec<Vertex>,
        [ObjectInfo; OBJECT_TYPE_COUNT],
        Vec<ObjectInstance>,
    ) {
        let mut vertices = Vec::new();
        let mut object_info = [ObjectInfo::default(); OBJECT_TYPE_COUNT];
        let mut instances = Vec::new();
        generate_cubes(&mut vertices, &mut object_info, &mut instances);
        generate_pyramids(&mut vertices, &mut object_info, &mut instances);
        generate_plane(&mut vertices, &mut object_info, &mut instances);
        (vertices, object_info, instances)
    }

    #[test]
    fn vertex_ranges_are_contiguous_and_cover_buffer() {
        let (vertices, object_info, _) = build_geometry();

        let cube = object_info[ObjectType::Cube.index()];
        let pyramid = object_info[ObjectType::Pyramid.index()];
        let plane = object_info[ObjectType::Plane.index()];

        assert_eq!(cube.vertex_offset, 0);
        assert_eq!(cube.vertex_count, 36);
        assert_eq!(pyramid.vertex_offset, 36);
        assert_eq!(pyramid.vertex_count, 18);
        assert_eq!(plane.vertex_offset, 54);
        assert_eq!(plane.vertex_count, 32 * 32 * 6);
        assert_eq!(
            vertices.len() as u32,
            plane.vertex_offset + plane.vertex_count
        );
    }

    #[test]
    fn instance_bounds_track_transforms() {
        let (_, _, instances) = build_geometry();
        assert_eq!(instances.len(), 3);

        // Cube sits at (1, 0.5, 0) with unit extents.
        let cube_box = instances[0].bounding_box;
        assert!((cube_box.min.x - 0.5).abs() < 1e-5);
        assert!((cube_box.max.x - 1.5).abs() < 1e-5);
        assert!((cube_box.min.y - 0.0).abs() < 1e-5);

        // Plane spans 100 units around the origin.
        let plane_box = instances[2].bounding_box;
        assert!((plane_box.min.x + 50.0).abs() < 1e-3);
        assert!((plane_box.max.z - 50.0).abs() < 1e-3);
    }
}
