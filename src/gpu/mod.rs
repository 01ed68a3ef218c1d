//! GPU device, surface and frame plumbing
//!
//! The single abstraction over the GPU driver the renderer depends on.
//! Owns the device/queue pair, the surface configuration and the depth
//! buffer; everything here is used exclusively from the render thread.

pub mod shader_library;

pub use shader_library::{ShaderLibrary, ShaderMacro};

use std::sync::Arc;

use winit::window::Window;

use crate::error::{EngineError, EngineResult};

/// Surface format requested for the swap chain.
const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

/// Depth-stencil format for the main pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Back-buffer clear color (RGBA).
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 1.0,
    a: 1.0,
};

/// Depth clear value.
pub const CLEAR_DEPTH: f32 = 1.0;

pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
}

/// One in-flight frame: command encoder plus the views the passes target.
pub struct FrameContext {
    pub encoder: wgpu::CommandEncoder,
    pub color_view: wgpu::TextureView,
    surface_texture: wgpu::SurfaceTexture,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>) -> EngineResult<Self> {
        let size = window.inner_size();
        log::info!(
            "[GpuContext::new] Initializing GPU, surface {}x{}",
            size.width,
            size.height
        );

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::SurfaceCreation {
                message: e.to_string(),
            })?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::DeviceCreation {
                message: "no compatible GPU adapter found".to_string(),
            })?;

        let adapter_info = adapter.get_info();
        log::info!(
            "[GpuContext::new] Using adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Forward+ Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::DeviceCreation {
                message: e.to_string(),
            })?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = if capabilities.formats.contains(&SURFACE_FORMAT) {
            SURFACE_FORMAT
        } else {
            capabilities.formats[0]
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let device = Arc::new(device);
        let depth_view = create_depth_view(&device, &surface_config);

        log::info!("[GpuContext::new] GPU initialization complete");

        Ok(Self {
            device,
            queue: Arc::new(queue),
            surface,
            surface_config,
            depth_view,
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Reconfigure the swap chain, preserving format and usage, and
    /// recreate the depth buffer to match.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        log::info!("[GpuContext::resize] Surface resized to {}x{}", width, height);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Acquire the back buffer and start a new command encoder. Surface
    /// loss is recoverable: the surface is reconfigured and the frame
    /// skipped.
    pub fn begin_frame(&mut self) -> EngineResult<FrameContext> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Err(EngineError::FrameSkipped {
                    reason: "surface lost or outdated, reconfigured".to_string(),
                });
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return Err(EngineError::FrameSkipped {
                    reason: "surface acquire timed out".to_string(),
                });
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(EngineError::OutOfMemory {
                    operation: "surface acquire".to_string(),
                });
            }
        };

        let color_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        Ok(FrameContext {
            encoder,
            color_view,
            surface_texture,
        })
    }

    /// Submit the frame's commands and present.
    pub fn end_frame(&mut self, frame: FrameContext) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn create_uniform_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn create_storage_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Buffer"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Depth-stencil state shared by the draw pipelines: depth test LESS,
/// depth write on, stencil disabled.
pub fn depth_stencil_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}
