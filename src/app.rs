//! UI-thread application: window, input, camera integration
//!
//! Owns the OS event loop and the camera input integrator. All scene
//! mutation requests flow to the render thread through the event queue;
//! camera integration and event dispatch run on a 16 ms cadence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, WindowBuilder};

use crate::camera::{forward_vector, CameraTransformUpdate};
use crate::render_loop::RenderSystem;
use crate::RendererConfig;

/// Camera/event dispatch cadence (roughly 60 Hz).
const DISPATCH_INTERVAL: Duration = Duration::from_millis(16);
const FRAME_DELTA_MS: f32 = 16.0;

const MOVE_SPEED: f32 = 0.005;
const TURN_SPEED: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputAction {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    RotatePitchUp,
    RotatePitchDown,
    RotateYawLeft,
    RotateYawRight,
}

const INPUT_ACTION_COUNT: usize = 10;

impl InputAction {
    fn index(self) -> usize {
        self as usize
    }
}

/// UI-side camera integrator; velocities accumulate from held keys and
/// integrate into position/rotation once per dispatch tick.
struct CameraRig {
    position: cgmath::Point3<f32>,
    /// Pitch and yaw in radians.
    rotation: cgmath::Vector2<f32>,
    actions: [bool; INPUT_ACTION_COUNT],
}

impl CameraRig {
    fn new() -> Self {
        Self {
            position: cgmath::Point3::new(0.0, 0.0, 1.0),
            rotation: cgmath::Vector2::new(0.0, 0.0),
            actions: [false; INPUT_ACTION_COUNT],
        }
    }

    fn set_action(&mut self, action: InputAction, active: bool) {
        self.actions[action.index()] = active;
    }

    fn action(&self, action: InputAction) -> bool {
        self.actions[action.index()]
    }

    fn update(&mut self, dt_ms: f32) {
        let mut velocity = cgmath::Vector3::new(0.0f32, 0.0, 0.0);
        let mut angular = cgmath::Vector2::new(0.0f32, 0.0);

        if self.action(InputAction::MoveForward) {
            velocity.z = 1.0;
        } else if self.action(InputAction::MoveBack) {
            velocity.z = -1.0;
        }
        if self.action(InputAction::MoveLeft) {
            velocity.x = -1.0;
        } else if self.action(InputAction::MoveRight) {
            velocity.x = 1.0;
        }
        if self.action(InputAction::MoveUp) {
            velocity.y = 1.0;
        } else if self.action(InputAction::MoveDown) {
            velocity.y = -1.0;
        }

        if self.action(InputAction::RotatePitchUp) {
            angular.x = 1.0;
        } else if self.action(InputAction::RotatePitchDown) {
            angular.x = -1.0;
        }
        if self.action(InputAction::RotateYawLeft) {
            angular.y = -1.0;
        } else if self.action(InputAction::RotateYawRight) {
            angular.y = 1.0;
        }

        let pitch = &mut self.rotation.x;
        *pitch = (*pitch + dt_ms * angular.x * TURN_SPEED)
            .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);

        let yaw = &mut self.rotation.y;
        *yaw = (*yaw + dt_ms * angular.y * TURN_SPEED).rem_euclid(std::f32::consts::TAU);

        let yaw = self.rotation.y;
        let move_forward = forward_vector(0.0, yaw);
        let right = cgmath::Vector3::new(yaw.cos(), 0.0, -yaw.sin());

        self.position += right * (velocity.x * dt_ms * MOVE_SPEED);
        self.position.y += velocity.y * dt_ms * MOVE_SPEED;
        self.position += move_forward * (velocity.z * dt_ms * MOVE_SPEED);
    }

    fn transform_update(&self) -> CameraTransformUpdate {
        CameraTransformUpdate {
            position: [self.position.x, self.position.y, self.position.z],
            rotation: [self.rotation.x, self.rotation.y],
        }
    }
}

pub struct Application {
    config: RendererConfig,
}

impl Application {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;

        let window = Arc::new(
            WindowBuilder::new()
                .with_title(&self.config.window_title)
                .with_inner_size(LogicalSize::new(
                    self.config.window_width,
                    self.config.window_height,
                ))
                .build(&event_loop)?,
        );

        let render_system = RenderSystem::start(Arc::clone(&window), self.config.clone())?;

        let mut rig = CameraRig::new();
        let mut paused = false;
        let mut fullscreen = false;
        let mut last_dispatch = Instant::now();

        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        target.exit();
                    }
                    WindowEvent::Resized(size) => {
                        if size.width == 0 || size.height == 0 {
                            // Minimized: suspend rendering until restored.
                            if !paused {
                                paused = true;
                                render_system.set_paused(true);
                            }
                        } else {
                            if paused {
                                paused = false;
                                render_system.set_paused(false);
                            }
                            render_system.resize_window(size.width, size.height);
                        }
                        render_system.dispatch_events();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state,
                                ..
                            },
                        ..
                    } => {
                        let pressed = state == ElementState::Pressed;
                        match code {
                            KeyCode::KeyW => rig.set_action(InputAction::MoveForward, pressed),
                            KeyCode::KeyA => rig.set_action(InputAction::MoveLeft, pressed),
                            KeyCode::KeyS => rig.set_action(InputAction::MoveBack, pressed),
                            KeyCode::KeyD => rig.set_action(InputAction::MoveRight, pressed),
                            KeyCode::Space => rig.set_action(InputAction::MoveUp, pressed),
                            KeyCode::ControlLeft => {
                                rig.set_action(InputAction::MoveDown, pressed)
                            }
                            KeyCode::ArrowUp => {
                                rig.set_action(InputAction::RotatePitchUp, pressed)
                            }
                            KeyCode::ArrowDown => {
                                rig.set_action(InputAction::RotatePitchDown, pressed)
                            }
                            KeyCode::ArrowLeft => {
                                rig.set_action(InputAction::RotateYawLeft, pressed)
                            }
                            KeyCode::ArrowRight => {
                                rig.set_action(InputAction::RotateYawRight, pressed)
                            }
                            KeyCode::KeyV if !pressed => {
                                render_system.toggle_light_debug_rendering();
                            }
                            KeyCode::Enter if !pressed => {
                                fullscreen = !fullscreen;
                                window.set_fullscreen(if fullscreen {
                                    Some(Fullscreen::Borderless(None))
                                } else {
                                    None
                                });
                                render_system.set_fullscreen_state(fullscreen);
                            }
                            _ => {}
                        }
                    }
                    WindowEvent::CursorMoved { .. } => {
                        // Mouse look is accepted but deliberately not applied.
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    if last_dispatch.elapsed() >= DISPATCH_INTERVAL {
                        if !paused {
                            rig.update(FRAME_DELTA_MS);
                            render_system.update_camera_transform(&rig.transform_update());
                        }
                        render_system.dispatch_events();
                        last_dispatch = Instant::now();
                    }
                }
                _ => {}
            }
        })?;

        // Dropping the RenderSystem (captured by the closure) stops and
        // joins the render thread.
        Ok(())
    }
}
