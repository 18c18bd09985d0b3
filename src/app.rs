//! Application shell
//!
//! [`SceneRuntime`] ties the scene, camera, viewport, scheduler, resource
//! bridge and parameter panel together behind one `frame` call and needs no
//! window. [`SceneApp`] drives a runtime from winit: it owns the window, the
//! wgpu [`SurfaceRenderer`] and the ImGui overlay, and routes input.

use anyhow::{anyhow, Context};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::RuntimeConfig;
use crate::gfx::{
    animation::TweenHook,
    camera::{CameraManager, OrbitControlsHook, PointerButton, PointerEvent, PointerInput},
    rendering::{Renderer, SurfaceRenderer},
    resources::{FileLoader, LoadService, ResourceBridge},
    scene::Scene,
    viewport::ViewportManager,
};
use crate::runtime::{Clock, FrameHook, FrameOutcome, FrameScheduler, HookId, SystemClock};
use crate::ui::{draw_panel, ParameterPanel, UiManager};

/// Two primary presses closer than this count as a double click
const DOUBLE_CLICK: Duration = Duration::from_millis(400);

/// Wheel pixels per line on touchpads reporting pixel deltas
const PIXELS_PER_LINE: f32 = 40.0;

/// Everything a running scene needs, minus the platform
pub struct SceneRuntime {
    pub scene: Scene,
    pub camera: CameraManager,
    pub viewport: ViewportManager,
    pub scheduler: FrameScheduler,
    pub resources: ResourceBridge,
    pub panel: ParameterPanel,
    builtin_hooks: bool,
}

impl SceneRuntime {
    /// Builds a stopped runtime from configuration
    ///
    /// The viewport starts at the configured window size with a pixel ratio
    /// of 1 until the platform reports the real one.
    pub fn new(
        config: &RuntimeConfig,
        clock: impl Clock + 'static,
        loader: impl LoadService + 'static,
    ) -> Self {
        let mut panel = ParameterPanel::new(&config.panel.title).with_width(config.panel.width);
        panel.set_visible(config.panel.visible);

        Self {
            scene: Scene::new(),
            camera: config.build_camera(),
            viewport: ViewportManager::new(
                config.window.width,
                config.window.height,
                1.0,
                config.window.max_pixel_ratio,
            ),
            scheduler: FrameScheduler::new(clock),
            resources: ResourceBridge::new(loader),
            panel,
            builtin_hooks: false,
        }
    }

    /// Syncs the viewport to `renderer` and starts the loop
    ///
    /// The orbit controls and tween hooks are registered ahead of `hooks` on
    /// the first start. Returns the ids of `hooks` only.
    pub fn start(
        &mut self,
        renderer: &mut dyn Renderer,
        hooks: impl IntoIterator<Item = Box<dyn FrameHook>>,
    ) -> Vec<HookId> {
        self.viewport.sync(&mut self.camera.camera, renderer);

        let mut all: Vec<Box<dyn FrameHook>> = Vec::new();
        if !self.builtin_hooks {
            all.push(Box::new(OrbitControlsHook));
            all.push(Box::new(TweenHook));
            self.builtin_hooks = true;
        }
        let builtin = all.len();
        all.extend(hooks);

        let mut ids = self.scheduler.start(all);
        ids.drain(..builtin);
        ids
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Runs one display frame
    ///
    /// Pending resource completions are applied first, even while stopped, so
    /// loads issued before a stop still land. The panel is refreshed after the
    /// tick so its next draw shows this frame's values.
    pub fn frame(&mut self, renderer: &mut dyn Renderer) -> FrameOutcome {
        let report = self.resources.drain(&mut self.scene);
        if report.applied + report.failed > 0 {
            log::debug!(
                "applied {} resources ({} failed) before frame {}",
                report.applied,
                report.failed,
                self.scheduler.frame_count() + 1
            );
        }

        let outcome = self.scheduler.tick(
            self.viewport.viewport(),
            &mut self.scene,
            &mut self.camera,
            renderer,
        );
        self.panel.refresh(&self.scene);
        outcome
    }

    /// Forwards a logical window size to the viewport manager
    pub fn resize(&mut self, width: u32, height: u32, renderer: &mut dyn Renderer) -> bool {
        self.viewport
            .on_resize(width, height, &mut self.camera.camera, renderer)
    }
}

type SceneSetup = Box<dyn FnOnce(&mut SceneRuntime) -> anyhow::Result<Vec<Box<dyn FrameHook>>>>;

/// Windowed application driving a [`SceneRuntime`]
pub struct SceneApp {
    config: RuntimeConfig,
    runtime: SceneRuntime,
    setup: Option<SceneSetup>,
    window: Option<Arc<Window>>,
    renderer: Option<SurfaceRenderer>,
    ui: Option<UiManager>,
    cursor: [f32; 2],
    last_press: Option<Instant>,
    error: Option<anyhow::Error>,
}

impl SceneApp {
    /// Creates the app with a [`FileLoader`] rooted at the configured asset directory
    pub fn new(config: RuntimeConfig) -> anyhow::Result<Self> {
        let loader = match config.assets.loader_threads {
            Some(threads) => FileLoader::with_threads(&config.assets.root, threads)?,
            None => FileLoader::new(&config.assets.root)?,
        };
        let runtime = SceneRuntime::new(&config, SystemClock::new(), loader);

        Ok(Self {
            config,
            runtime,
            setup: None,
            window: None,
            renderer: None,
            ui: None,
            cursor: [0.0; 2],
            last_press: None,
            error: None,
        })
    }

    /// Scene construction, run once the window and GPU are ready
    ///
    /// The returned hooks start with the loop.
    pub fn on_start<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut SceneRuntime) -> anyhow::Result<Vec<Box<dyn FrameHook>>> + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn runtime(&self) -> &SceneRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut SceneRuntime {
        &mut self.runtime
    }

    /// Runs the event loop until the window closes
    pub fn run(mut self) -> anyhow::Result<()> {
        init_logging();

        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self)
            .context("Event loop terminated abnormally")?;

        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn init_graphics(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        let scale_factor = window.scale_factor();
        let size: LogicalSize<u32> = window.inner_size().to_logical(scale_factor);

        self.runtime.viewport = ViewportManager::new(
            size.width,
            size.height,
            scale_factor as f32,
            self.config.window.max_pixel_ratio,
        );
        let pixel_ratio = self.runtime.viewport.viewport().pixel_ratio;

        let mut renderer = pollster::block_on(SurfaceRenderer::new(
            window.clone(),
            size.width,
            size.height,
            pixel_ratio,
        ))?;
        renderer.set_vsync(self.config.window.vsync);

        let mut ui = UiManager::new(
            renderer.device(),
            renderer.queue(),
            renderer.surface_format(),
            &window,
            self.config.panel.font_size,
        );
        let (width, height) = renderer.surface_size();
        ui.update_display_size(width, height);

        let hooks = match self.setup.take() {
            Some(setup) => setup(&mut self.runtime).context("Scene setup failed")?,
            None => Vec::new(),
        };
        self.runtime.start(&mut renderer, hooks);

        self.ui = Some(ui);
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, window: &Window) {
        let (Some(renderer), Some(ui)) = (self.renderer.as_mut(), self.ui.as_mut()) else {
            return;
        };

        let statistics = self.runtime.scene.get_statistics();
        let panel = &self.runtime.panel;
        match ui.frame(window, |frame| draw_panel(frame, panel, Some(&statistics))) {
            Ok(interactions) => {
                self.runtime
                    .panel
                    .apply(&mut self.runtime.scene, interactions);
            }
            Err(error) => log::error!("{error:#}"),
        }

        self.runtime.frame(&mut renderer.with_overlay(ui));
    }

    fn sync_ui_size(&mut self) {
        if let (Some(renderer), Some(ui)) = (self.renderer.as_ref(), self.ui.as_mut()) {
            let (width, height) = renderer.surface_size();
            ui.update_display_size(width, height);
        }
    }

    fn pointer(&mut self, input: PointerInput) {
        self.runtime.camera.process_pointer(input);
    }
}

impl ApplicationHandler for SceneApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                self.fail(event_loop, anyhow!(error).context("Failed to create window"));
                return;
            }
        };

        if let Err(error) = self.init_graphics(window) {
            self.fail(event_loop, error);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else {
            return;
        };

        let captured = self
            .ui
            .as_mut()
            .is_some_and(|ui| ui.handle_window_event(&window, window_id, &event));

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let logical: LogicalSize<u32> = size.to_logical(window.scale_factor());
                if let Some(renderer) = self.renderer.as_mut() {
                    self.runtime.resize(logical.width, logical.height, renderer);
                }
                self.runtime
                    .viewport
                    .on_fullscreen_changed(window.fullscreen().is_some());
                self.sync_ui_size();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(renderer) = self.renderer.as_mut() {
                    self.runtime
                        .viewport
                        .on_scale_factor_changed(scale_factor as f32, renderer);
                }
                self.sync_ui_size();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } if !captured => match key_code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::KeyH => {
                    let visible = self.runtime.panel.toggle_visibility();
                    log::debug!("panel {}", if visible { "shown" } else { "hidden" });
                }
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = [position.x as f32, position.y as f32];
                // A drag that started on the scene keeps going under the panel
                if !captured || self.runtime.camera.controller.is_dragging() {
                    let [x, y] = self.cursor;
                    self.pointer(PointerInput::Move(PointerEvent::new(x, y, PointerButton::Primary)));
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = pointer_button(button) else {
                    return;
                };
                let [x, y] = self.cursor;
                let event = PointerEvent::new(x, y, button);
                match state {
                    ElementState::Pressed if !captured => {
                        if button == PointerButton::Primary {
                            let now = Instant::now();
                            let double = self
                                .last_press
                                .is_some_and(|last| now.duration_since(last) < DOUBLE_CLICK);
                            self.last_press = if double { None } else { Some(now) };
                            if double {
                                self.runtime.viewport.toggle_fullscreen(&*window);
                            }
                        }
                        self.pointer(PointerInput::Down(event));
                    }
                    ElementState::Released => self.pointer(PointerInput::Up(event)),
                    ElementState::Pressed => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } if !captured => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                self.pointer(PointerInput::Wheel(lines));
            }
            WindowEvent::RedrawRequested => self.redraw(&window),
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.runtime.stop();
    }
}

fn pointer_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

/// Initialises `env_logger` with an `info` default; later calls do nothing
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
