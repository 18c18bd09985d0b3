//! The rendering seam between the runtime and a graphics backend

use crate::gfx::{camera::PerspectiveCamera, scene::Scene};

/// A backend able to draw the scene graph from a camera
///
/// `set_size` takes logical pixels; the backing store is that size times the
/// pixel ratio last given to `set_pixel_ratio`.
pub trait Renderer {
    fn set_size(&mut self, width: u32, height: u32);

    fn set_pixel_ratio(&mut self, pixel_ratio: f32);

    /// Draws one frame. An error is reported for this frame only.
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()>;
}

/// Headless renderer that records what it was asked to do
///
/// Used by tests and by headless runs of [`SceneRuntime`](crate::app::SceneRuntime).
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub size: Option<(u32, u32)>,
    pub pixel_ratio: Option<f32>,
    pub render_calls: u64,
    /// Aspect of the camera seen by the most recent render
    pub last_aspect: Option<f32>,
    /// Number of visible nodes seen by the most recent render
    pub last_visible_nodes: usize,
    /// Makes the next render call fail once
    pub fail_next: bool,
}

impl Renderer for RecordingRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = Some(pixel_ratio);
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        if std::mem::take(&mut self.fail_next) {
            anyhow::bail!("recording renderer asked to fail");
        }
        self.render_calls += 1;
        self.last_aspect = Some(camera.aspect());
        self.last_visible_nodes = scene.visible_nodes().len();
        Ok(())
    }
}
