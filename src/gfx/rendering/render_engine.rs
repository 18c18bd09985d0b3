//! WGPU-backed implementation of the [`Renderer`] seam
//!
//! Owns the surface, device and queue. A frame runs the [`MeshPass`] (shadow
//! map, then the scene over the background color) and then hands the encoder
//! to an optional [`Overlay`] (the debug panel) that draws on top with
//! `LoadOp::Load`.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};

use crate::gfx::{
    camera::PerspectiveCamera,
    resources::{TextureId, TextureResource},
    scene::{Background, Scene},
};

use super::{mesh_pass::MeshPass, renderer::Renderer};

/// Something drawn over the scene in the same frame
pub trait Overlay {
    fn draw(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) -> anyhow::Result<()>;
}

/// Swap-chain renderer for a window surface
pub struct SurfaceRenderer {
    surface: wgpu::Surface<'static>,
    device: Arc<Device>,
    queue: Arc<Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    logical_size: (u32, u32),
    pixel_ratio: f32,
    frames_presented: u64,
    mesh_pass: MeshPass,
}

impl SurfaceRenderer {
    /// Creates a renderer for the given window surface
    ///
    /// # Arguments
    /// * `window` - Surface target, usually an `Arc<winit::window::Window>`
    /// * `width`, `height` - Initial logical size
    /// * `pixel_ratio` - Initial (already clamped) pixel ratio
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Vista Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to request a device")?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let logical_size = (width.max(1), height.max(1));
        let (physical_width, physical_height) = physical(logical_size, pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical_width,
            height: physical_height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let mesh_pass = MeshPass::new(&device, &queue, format, physical_width, physical_height);

        log::info!(
            "renderer ready: {} ({:?}), {}x{} {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            physical_width,
            physical_height,
            format
        );

        Ok(Self {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            format,
            logical_size,
            pixel_ratio,
            frames_presented: 0,
            mesh_pass,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.format
    }

    /// Current swap-chain size in physical pixels
    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// GPU copy of a scene texture, once it has been uploaded
    pub fn texture(&self, id: TextureId) -> Option<&TextureResource> {
        self.mesh_pass.texture(id)
    }

    /// Enables or disables vertical sync
    pub fn set_vsync(&mut self, enable: bool) {
        self.config.present_mode = if enable {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        };
        self.surface.configure(&self.device, &self.config);
    }

    /// Wraps this renderer so every frame also draws `overlay`
    pub fn with_overlay<'a>(&'a mut self, overlay: &'a mut dyn Overlay) -> WithOverlay<'a> {
        WithOverlay {
            surface: self,
            overlay,
        }
    }

    fn reconfigure(&mut self) {
        let (width, height) = physical(self.logical_size, self.pixel_ratio);
        if (width, height) == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.mesh_pass.resize(&self.device, width, height);
        log::debug!("surface reconfigured to {width}x{height}");
    }

    /// Draws the scene over its background, then runs the overlay if any
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        overlay: Option<&mut dyn Overlay>,
    ) -> anyhow::Result<()> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // Swap chain went stale (e.g. display change); skip this frame
                self.surface.configure(&self.device, &self.config);
                log::debug!("surface lost or outdated, reconfigured");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out acquiring surface texture, frame skipped");
                return Ok(());
            }
            Err(error) => return Err(error).context("failed to acquire surface texture"),
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let frame = self
            .mesh_pass
            .prepare(&self.device, &self.queue, scene, camera);
        let [r, g, b] = clear_color(scene).to_array();
        let clear = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };
        self.mesh_pass.record(&mut encoder, &view, clear, &frame);

        if let Some(overlay) = overlay {
            overlay.draw(&self.device, &self.queue, &mut encoder, &view)?;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        self.frames_presented += 1;

        log::trace!(
            "frame {} presented: {} draws, camera at {:?}",
            self.frames_presented,
            frame.draw_count(),
            camera.eye()
        );
        Ok(())
    }
}

impl Renderer for SurfaceRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width.max(1), height.max(1));
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
        self.reconfigure();
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        self.render_frame(scene, camera, None)
    }
}

/// A [`SurfaceRenderer`] borrowed together with an overlay for one frame
pub struct WithOverlay<'a> {
    surface: &'a mut SurfaceRenderer,
    overlay: &'a mut dyn Overlay,
}

impl Renderer for WithOverlay<'_> {
    fn set_size(&mut self, width: u32, height: u32) {
        self.surface.set_size(width, height);
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.surface.set_pixel_ratio(pixel_ratio);
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        self.surface
            .render_frame(scene, camera, Some(&mut *self.overlay))
    }
}

fn physical((width, height): (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    (
        ((width as f32 * pixel_ratio).round() as u32).max(1),
        ((height as f32 * pixel_ratio).round() as u32).max(1),
    )
}

fn clear_color(scene: &Scene) -> crate::gfx::scene::Color {
    match scene.background() {
        Background::Color(color) => *color,
        Background::Environment(map) => map.average_color(),
    }
}
