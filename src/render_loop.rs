//! Render thread ownership and frame orchestration
//!
//! `RenderSystem` is the UI thread's handle: it appends typed events into
//! the cross-thread queue and owns the render thread's lifetime. The render
//! thread drains the queue, applies events to its local state, and when not
//! paused runs one frame: CPU frustum cull, light staging, the four culling
//! dispatches, the forward draw, the optional debug overlay, present.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cgmath::Matrix4;
use winit::window::Window;

use crate::camera::{build_projection, CameraState, CameraTransformUpdate};
use crate::constants::{CAMERA_Z_FAR, CAMERA_Z_NEAR};
use crate::culling::CullingPipeline;
use crate::debug_lines::DebugLineRenderer;
use crate::error::{EngineError, EngineResult};
use crate::event_queue::{EventDoubleBuffer, Fence, FenceState};
use crate::gpu::{GpuContext, ShaderLibrary};
use crate::lights::SceneLights;
use crate::math::Frustum;
use crate::scene::SceneDraw;
use crate::RendererConfig;

/// Event identifiers carried in the queue headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderEventId {
    UpdateCameraTransform = 0,
    Fence = 1,
    Pause = 2,
    ResizeWindow = 3,
    SetWindowFullscreenState = 4,
    ToggleLightDebugRendering = 5,
}

impl RenderEventId {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::UpdateCameraTransform),
            1 => Some(Self::Fence),
            2 => Some(Self::Pause),
            3 => Some(Self::ResizeWindow),
            4 => Some(Self::SetWindowFullscreenState),
            5 => Some(Self::ToggleLightDebugRendering),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct WindowSizeInfo {
    width: u32,
    height: u32,
}

/// State shared between the UI thread handle and the render thread.
struct RenderShared {
    events: EventDoubleBuffer,
    running: AtomicBool,
}

/// UI-thread handle to the render thread.
pub struct RenderSystem {
    shared: Arc<RenderShared>,
    thread: Option<JoinHandle<()>>,
}

impl RenderSystem {
    /// Initialize the GPU on the calling thread (so failures surface
    /// synchronously) and start the render thread.
    pub fn start(window: Arc<Window>, config: RendererConfig) -> EngineResult<Self> {
        let gpu = pollster::block_on(GpuContext::new(window))?;

        let shared = Arc::new(RenderShared {
            events: EventDoubleBuffer::new(),
            running: AtomicBool::new(true),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("render".to_string())
            .spawn(move || render_thread_main(gpu, thread_shared, config))
            .map_err(|e| EngineError::SystemError {
                component: "render_loop".to_string(),
                error: format!("failed to spawn render thread: {}", e),
            })?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn update_camera_transform(&self, update: &CameraTransformUpdate) {
        self.shared
            .events
            .write_queue()
            .write_event(RenderEventId::UpdateCameraTransform as u32, update);
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared
            .events
            .write_queue()
            .write_event(RenderEventId::Pause as u32, &(paused as u32));
    }

    pub fn resize_window(&self, width: u32, height: u32) {
        self.shared
            .events
            .write_queue()
            .write_event(RenderEventId::ResizeWindow as u32, &WindowSizeInfo { width, height });
    }

    pub fn set_fullscreen_state(&self, fullscreen: bool) {
        self.shared.events.write_queue().write_event(
            RenderEventId::SetWindowFullscreenState as u32,
            &(fullscreen as u32),
        );
    }

    pub fn toggle_light_debug_rendering(&self) {
        self.shared
            .events
            .write_queue()
            .write_event(RenderEventId::ToggleLightDebugRendering as u32, &0u32);
    }

    /// Create a fence and enqueue it. The caller typically dispatches,
    /// waits for `WaitMain`, mutates shared state, then signals `Done`.
    pub fn create_fence(&self) -> Arc<Fence> {
        let fence = Arc::new(Fence::new(FenceState::WaitRenderer));

        // The queue carries the fence as an opaque handle; the render
        // thread reconstructs (and releases) this reference.
        let handle = Arc::into_raw(Arc::clone(&fence)) as usize as u64;
        self.shared
            .events
            .write_queue()
            .write_event(RenderEventId::Fence as u32, &handle);

        fence
    }

    /// Hand the pending event batch to the render thread.
    pub fn dispatch_events(&self) {
        self.shared.events.dispatch_write();
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[RenderSystem::drop] Render thread panicked");
            }
        }
    }
}

/// Everything the render thread owns.
struct RenderThreadState {
    gpu: GpuContext,
    culling: CullingPipeline,
    scene: SceneDraw,
    debug_lines: DebugLineRenderer,
    lights: SceneLights,
    camera: CameraState,
    projection: Matrix4<f32>,
    paused: bool,
}

fn render_thread_main(gpu: GpuContext, shared: Arc<RenderShared>, config: RendererConfig) {
    let mut state = match init_render_state(gpu, &config) {
        Ok(state) => state,
        Err(e) => {
            log::error!("[render_thread] Startup failed: {}", e);
            shared.running.store(false, Ordering::Release);
            release_pending_fences(&shared);
            return;
        }
    };

    log::info!("[render_thread] Entering render loop");

    while shared.running.load(Ordering::Acquire) {
        drain_events(&shared, &mut state);

        if state.paused {
            std::thread::yield_now();
            continue;
        }

        match render_frame(&mut state) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                log::warn!("[render_thread] Frame skipped: {}", e);
                state.culling.finish_frame();
            }
            Err(e) => {
                log::error!("[render_thread] Fatal render error: {}", e);
                shared.running.store(false, Ordering::Release);
                break;
            }
        }
    }

    // Release any fence the UI thread may still be parked on.
    release_pending_fences(&shared);
    log::info!("[render_thread] Render loop exited");
}

fn init_render_state(gpu: GpuContext, config: &RendererConfig) -> EngineResult<RenderThreadState> {
    let mut shaders = ShaderLibrary::new(Arc::clone(gpu.device()));

    let culling = CullingPipeline::new(&gpu, &mut shaders)?;
    let scene = SceneDraw::new(&gpu, &mut shaders, culling.draw_bind_group_layout())?;
    let debug_lines = DebugLineRenderer::new(&gpu, &mut shaders, config.debug_overlay)?;
    let lights = SceneLights::generate_demo_lights(config.light_seed);

    let (width, height) = gpu.surface_size();
    let projection = build_projection(width, height);

    Ok(RenderThreadState {
        gpu,
        culling,
        scene,
        debug_lines,
        lights,
        camera: CameraState::new(),
        projection,
        paused: false,
    })
}

fn drain_events(shared: &Arc<RenderShared>, state: &mut RenderThreadState) {
    let Some(queue) = shared.events.read_queue() else {
        return;
    };

    for (header, payload) in queue.iter() {
        let Some(event_id) = RenderEventId::from_u32(header.event_id) else {
            log::warn!("[render_thread] Unknown event id {}", header.event_id);
            continue;
        };

        match event_id {
            RenderEventId::UpdateCameraTransform => {
                let update: CameraTransformUpdate = bytemuck::pod_read_unaligned(payload);
                state.camera.apply_transform_update(&update);
            }
            RenderEventId::Fence => {
                let handle: u64 = bytemuck::pod_read_unaligned(payload);
                // Safety: the handle was produced by Arc::into_raw on the
                // producer side specifically for this event; taking it back
                // releases that reference.
                let fence = unsafe { Arc::from_raw(handle as usize as *const Fence) };
                fence.signal(FenceState::WaitMain);
                fence.wait_until(FenceState::Done);
            }
            RenderEventId::Pause => {
                let paused: u32 = bytemuck::pod_read_unaligned(payload);
                state.paused = paused != 0;
            }
            RenderEventId::ResizeWindow => {
                let size: WindowSizeInfo = bytemuck::pod_read_unaligned(payload);
                state.gpu.resize(size.width, size.height);
                let (width, height) = state.gpu.surface_size();
                state.projection = build_projection(width, height);
            }
            RenderEventId::SetWindowFullscreenState => {
                // The OS window already switched mode on the UI thread; the
                // surface follows the resize events that arrive with it.
                let fullscreen: u32 = bytemuck::pod_read_unaligned(payload);
                log::info!(
                    "[render_thread] Fullscreen state: {}",
                    fullscreen != 0
                );
            }
            RenderEventId::ToggleLightDebugRendering => {
                state.debug_lines.toggle();
            }
        }
    }

    drop(queue);
    shared.events.finish_read();
}

/// Wake any fence still in flight with a terminal state so the UI thread
/// exits cleanly after a render-thread failure.
fn release_pending_fences(shared: &Arc<RenderShared>) {
    let Some(queue) = shared.events.read_queue() else {
        return;
    };

    for (header, payload) in queue.iter() {
        if RenderEventId::from_u32(header.event_id) == Some(RenderEventId::Fence) {
            let handle: u64 = bytemuck::pod_read_unaligned(payload);
            // Safety: same contract as the regular fence path above.
            let fence = unsafe { Arc::from_raw(handle as usize as *const Fence) };
            fence.signal(FenceState::Done);
        }
    }

    drop(queue);
    shared.events.finish_read();
}

fn render_frame(state: &mut RenderThreadState) -> EngineResult<()> {
    let mut frame = state.gpu.begin_frame()?;

    let camera_info = state.camera.info();
    let frustum = Frustum::from_view_projection(&(state.projection * camera_info.view));

    // CPU cull and depth-sort the lights.
    let visible =
        state
            .lights
            .build_visible_set(&camera_info, &frustum, CAMERA_Z_NEAR, CAMERA_Z_FAR);

    if state.debug_lines.enabled() {
        for &light_index in &visible.visible_indices {
            state
                .debug_lines
                .add_visible_light(&state.lights.lights()[light_index]);
        }
    }

    // Stage buffers and encode the four culling dispatches.
    state.culling.encode(
        &mut frame.encoder,
        &visible,
        &camera_info,
        &state.projection,
        state.gpu.surface_size(),
        CAMERA_Z_NEAR,
        CAMERA_Z_FAR,
    )?;

    // Per-object constants for the survivors of the object-level cull.
    let draw_list = state
        .scene
        .prepare(&state.camera.uniform(&state.projection), &frustum);

    let view_projection = state.projection * camera_info.view;
    let draw_debug = state.debug_lines.prepare(&view_projection);

    {
        let mut pass = SceneDraw::begin_render_pass(
            &mut frame.encoder,
            &frame.color_view,
            state.gpu.depth_view(),
        );
        state
            .scene
            .draw(&mut pass, &draw_list, state.culling.draw_bind_group());
        if draw_debug {
            state.debug_lines.draw(&mut pass);
        }
    }

    state.gpu.end_frame(frame);
    state.culling.finish_frame();
    Ok(())
}
