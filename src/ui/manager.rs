// src/ui/manager.rs
//! ImGui integration for Vista
//!
//! Owns the ImGui context, the winit platform glue and the wgpu renderer. A
//! frame is built with [`UiManager::frame`] before the scheduler ticks, then
//! drawn over the scene by the [`Overlay`] impl inside the render call.

use anyhow::{anyhow, Context as _};
use imgui::{Context, FontConfig, FontSource, MouseCursor};
use imgui_wgpu::{Renderer, RendererConfig};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::time::Instant;
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::{
    event::{Event, WindowEvent},
    window::{Window, WindowId},
};

use crate::gfx::rendering::Overlay;

/// ImGui UI manager
///
/// Input is forwarded through [`handle_window_event`](Self::handle_window_event),
/// which reports whether ImGui wants it so camera controls can ignore it.
pub struct UiManager {
    pub context: Context,
    platform: WinitPlatform,
    renderer: Renderer,
    last_frame: Instant,
    last_cursor: Option<MouseCursor>,
    frame_built: bool,
}

impl UiManager {
    /// Creates a new UI manager
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating renderer resources
    /// * `queue` - WGPU queue for renderer operations
    /// * `output_color_format` - Target texture format for rendering
    /// * `window` - Window for platform integration
    /// * `font_size` - Font size in pixels
    pub fn new(
        device: &Device,
        queue: &Queue,
        output_color_format: TextureFormat,
        window: &Window,
        font_size: f32,
    ) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);

        // Locked DPI: the surface already renders at the clamped pixel ratio
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Locked(1.0));

        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        let renderer_config = RendererConfig {
            texture_format: output_color_format,
            ..Default::default()
        };
        let renderer = Renderer::new(&mut context, device, queue, renderer_config);

        Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
            last_cursor: None,
            frame_built: false,
        }
    }

    /// Updates ImGui's display size to match the render target
    pub fn update_display_size(&mut self, width: u32, height: u32) {
        self.context.io_mut().display_size = [width as f32, height as f32];
    }

    /// Whether ImGui currently wants pointer or keyboard input for itself
    pub fn wants_input(&self) -> bool {
        let io = self.context.io();
        io.want_capture_mouse || io.want_capture_keyboard
    }

    /// Handles a window event and returns whether the UI captured it
    pub fn handle_window_event(
        &mut self,
        window: &Window,
        window_id: WindowId,
        event: &WindowEvent,
    ) -> bool {
        match event {
            WindowEvent::CursorMoved { .. }
            | WindowEvent::MouseInput { .. }
            | WindowEvent::MouseWheel { .. }
            | WindowEvent::KeyboardInput { .. }
            | WindowEvent::ModifiersChanged(_)
            | WindowEvent::Resized(_)
            | WindowEvent::ScaleFactorChanged { .. }
            | WindowEvent::Focused(_) => {
                let wrapped: Event<()> = Event::WindowEvent {
                    window_id,
                    event: event.clone(),
                };
                self.platform
                    .handle_event(self.context.io_mut(), window, &wrapped);
                self.wants_input()
            }
            _ => false,
        }
    }

    /// Builds this frame's UI
    ///
    /// The returned value is whatever `build` produced, typically the
    /// interactions the panel collected.
    pub fn frame<F, R>(&mut self, window: &Window, build: F) -> anyhow::Result<R>
    where
        F: FnOnce(&imgui::Ui) -> R,
    {
        if std::mem::take(&mut self.frame_built) {
            // The previous frame was never drawn (aborted frame); close it out
            self.context.render();
        }

        let now = Instant::now();
        self.context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        self.platform
            .prepare_frame(self.context.io_mut(), window)
            .context("failed to prepare ImGui frame")?;

        let ui = self.context.frame();
        let result = build(&ui);

        if self.last_cursor != ui.mouse_cursor() {
            self.last_cursor = ui.mouse_cursor();
            self.platform.prepare_render(&ui, window);
        }

        self.frame_built = true;
        Ok(result)
    }
}

impl Overlay for UiManager {
    /// Renders the frame built by [`UiManager::frame`] with `LoadOp::Load`
    ///
    /// Does nothing if no frame was built since the last draw.
    fn draw(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) -> anyhow::Result<()> {
        if !std::mem::take(&mut self.frame_built) {
            return Ok(());
        }

        let draw_data = self.context.render();
        if draw_data.display_size[0] <= 0.0 || draw_data.display_size[1] <= 0.0 {
            return Ok(());
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("imgui_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .map_err(|error| anyhow!("failed to render ImGui: {error:?}"))
    }
}
