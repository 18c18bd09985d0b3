//! Viewport tracking and fullscreen state
//!
//! The [`ViewportManager`] is the only writer of the [`Viewport`]. Every resize
//! flows through [`ViewportManager::on_resize`], which updates, in order, the
//! camera aspect ratio, the camera projection, the renderer target size and the
//! clamped pixel ratio. Nothing else may set the camera aspect, so camera and
//! framebuffer cannot drift apart.

use winit::window::{Fullscreen, Window};

use crate::gfx::{camera::PerspectiveCamera, rendering::Renderer};
use crate::runtime::RuntimeError;

/// Size of the renderable area in logical pixels plus its pixel density
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Backing-store size: logical size scaled by the pixel ratio
    pub fn physical_size(&self) -> (u32, u32) {
        (
            ((self.width as f32 * self.pixel_ratio).round() as u32).max(1),
            ((self.height as f32 * self.pixel_ratio).round() as u32).max(1),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Windowed,
    Fullscreen,
}

/// Platform fullscreen capability
pub trait FullscreenSurface {
    /// Whether fullscreen can be entered at all
    fn supports_fullscreen(&self) -> bool;

    fn set_fullscreen(&self, fullscreen: bool);
}

impl FullscreenSurface for Window {
    fn supports_fullscreen(&self) -> bool {
        // Borderless fullscreen needs a monitor to cover
        self.current_monitor().is_some()
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        Window::set_fullscreen(self, fullscreen.then_some(Fullscreen::Borderless(None)));
    }
}

/// Owner of the viewport and the windowed/fullscreen state machine
#[derive(Debug)]
pub struct ViewportManager {
    viewport: Viewport,
    device_pixel_ratio: f32,
    max_pixel_ratio: f32,
    mode: DisplayMode,
}

impl ViewportManager {
    /// # Arguments
    /// * `width`, `height` - Initial logical size
    /// * `device_pixel_ratio` - Native density of the display
    /// * `max_pixel_ratio` - Upper bound applied to the density to cap fill-rate cost
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32, max_pixel_ratio: f32) -> Self {
        Self {
            viewport: Viewport::new(width, height, device_pixel_ratio.min(max_pixel_ratio)),
            device_pixel_ratio,
            max_pixel_ratio,
            mode: DisplayMode::Windowed,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn max_pixel_ratio(&self) -> f32 {
        self.max_pixel_ratio
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.mode
    }

    /// Pushes the current viewport to the camera and renderer
    ///
    /// Used once at startup, before any resize event has arrived.
    pub fn sync(&mut self, camera: &mut PerspectiveCamera, renderer: &mut dyn Renderer) {
        let Viewport { width, height, .. } = self.viewport;
        self.on_resize(width, height, camera, renderer);
    }

    /// Handles a window or container resize
    ///
    /// Zero-area sizes (a minimised window) are ignored. Repeating the same size
    /// is harmless.
    pub fn on_resize(
        &mut self,
        width: u32,
        height: u32,
        camera: &mut PerspectiveCamera,
        renderer: &mut dyn Renderer,
    ) -> bool {
        if width == 0 || height == 0 {
            log::debug!("ignoring zero-area resize to {width}x{height}");
            return false;
        }

        self.viewport.width = width;
        self.viewport.height = height;

        camera.set_aspect(self.viewport.aspect());
        camera.update_projection_matrix();

        renderer.set_size(width, height);

        self.viewport.pixel_ratio = self.device_pixel_ratio.min(self.max_pixel_ratio);
        renderer.set_pixel_ratio(self.viewport.pixel_ratio);

        log::trace!(
            "viewport resized to {}x{} @{}x",
            width,
            height,
            self.viewport.pixel_ratio
        );
        true
    }

    /// Handles a change of the display's native density
    pub fn on_scale_factor_changed(&mut self, device_pixel_ratio: f32, renderer: &mut dyn Renderer) {
        self.device_pixel_ratio = device_pixel_ratio;
        self.viewport.pixel_ratio = device_pixel_ratio.min(self.max_pixel_ratio);
        renderer.set_pixel_ratio(self.viewport.pixel_ratio);
    }

    /// Flips between windowed and fullscreen in response to a user gesture
    ///
    /// On platforms without fullscreen support this is a silent no-op.
    pub fn toggle_fullscreen(&mut self, surface: &dyn FullscreenSurface) -> DisplayMode {
        if !surface.supports_fullscreen() {
            RuntimeError::UnsupportedPlatformFeature("fullscreen").log();
            return self.mode;
        }

        self.mode = match self.mode {
            DisplayMode::Windowed => {
                surface.set_fullscreen(true);
                DisplayMode::Fullscreen
            }
            DisplayMode::Fullscreen => {
                surface.set_fullscreen(false);
                DisplayMode::Windowed
            }
        };
        self.mode
    }

    /// Records a fullscreen change the platform made on its own (e.g. Esc)
    pub fn on_fullscreen_changed(&mut self, fullscreen: bool) {
        self.mode = if fullscreen {
            DisplayMode::Fullscreen
        } else {
            DisplayMode::Windowed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::RecordingRenderer;
    use std::cell::RefCell;

    struct FakeSurface {
        supported: bool,
        requests: RefCell<Vec<bool>>,
    }

    impl FakeSurface {
        fn new(supported: bool) -> Self {
            Self {
                supported,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl FullscreenSurface for FakeSurface {
        fn supports_fullscreen(&self) -> bool {
            self.supported
        }

        fn set_fullscreen(&self, fullscreen: bool) {
            self.requests.borrow_mut().push(fullscreen);
        }
    }

    #[test]
    fn resize_keeps_camera_aspect_in_sync() {
        let mut manager = ViewportManager::new(1024, 768, 1.0, 2.0);
        let mut camera = PerspectiveCamera::default();
        let mut renderer = RecordingRenderer::default();

        for (width, height) in [(800, 600), (1920, 1080), (333, 777), (0, 500), (1, 1), (640, 480)] {
            manager.on_resize(width, height, &mut camera, &mut renderer);
            let viewport = manager.viewport();
            assert_eq!(camera.aspect(), viewport.width as f32 / viewport.height as f32);
        }
        assert_eq!(renderer.size, Some((640, 480)));
    }

    #[test]
    fn resize_updates_projection_then_renderer() {
        let mut manager = ViewportManager::new(100, 100, 1.0, 2.0);
        let mut camera = PerspectiveCamera::default();
        let mut renderer = RecordingRenderer::default();
        let before = camera.projection_updates();

        assert!(manager.on_resize(800, 600, &mut camera, &mut renderer));

        assert_eq!(camera.projection_updates(), before + 1);
        assert_eq!(renderer.size, Some((800, 600)));
        assert_eq!(renderer.pixel_ratio, Some(1.0));
    }

    #[test]
    fn zero_area_resize_is_ignored() {
        let mut manager = ViewportManager::new(800, 600, 1.0, 2.0);
        let mut camera = PerspectiveCamera::default();
        let mut renderer = RecordingRenderer::default();

        assert!(!manager.on_resize(0, 600, &mut camera, &mut renderer));
        assert_eq!(manager.viewport().width, 800);
        assert_eq!(renderer.size, None);
    }

    #[test]
    fn pixel_ratio_is_clamped() {
        let mut manager = ViewportManager::new(800, 600, 3.0, 2.0);
        let mut camera = PerspectiveCamera::default();
        let mut renderer = RecordingRenderer::default();

        manager.sync(&mut camera, &mut renderer);
        assert_eq!(renderer.pixel_ratio, Some(2.0));
        assert_eq!(manager.viewport().physical_size(), (1600, 1200));

        manager.on_scale_factor_changed(1.5, &mut renderer);
        assert_eq!(manager.viewport().pixel_ratio, 1.5);
    }

    #[test]
    fn fullscreen_toggles_between_two_states() {
        let mut manager = ViewportManager::new(800, 600, 1.0, 2.0);
        let surface = FakeSurface::new(true);

        assert_eq!(manager.toggle_fullscreen(&surface), DisplayMode::Fullscreen);
        assert_eq!(manager.toggle_fullscreen(&surface), DisplayMode::Windowed);
        assert_eq!(*surface.requests.borrow(), vec![true, false]);
    }

    #[test]
    fn unsupported_fullscreen_is_silent_noop() {
        let mut manager = ViewportManager::new(800, 600, 1.0, 2.0);
        let surface = FakeSurface::new(false);

        assert_eq!(manager.toggle_fullscreen(&surface), DisplayMode::Windowed);
        assert!(surface.requests.borrow().is_empty());
    }

    #[test]
    fn platform_exit_syncs_state() {
        let mut manager = ViewportManager::new(800, 600, 1.0, 2.0);
        let surface = FakeSurface::new(true);
        manager.toggle_fullscreen(&surface);
        manager.on_fullscreen_changed(false);
        assert_eq!(manager.display_mode(), DisplayMode::Windowed);
    }
}
