//! Rendering backends
//!
//! [`Renderer`] is the seam the scheduler renders through. [`SurfaceRenderer`]
//! draws to a window with wgpu through the [`MeshPass`]; [`RecordingRenderer`]
//! runs headless. [`mesh`] turns geometry descriptors into vertex data.

pub mod mesh;
pub mod mesh_pass;
pub mod render_engine;
pub mod renderer;

pub use mesh::{MeshData, Vertex3D};
pub use mesh_pass::{FrameLights, MeshPass};
pub use render_engine::{Overlay, SurfaceRenderer, WithOverlay};
pub use renderer::{RecordingRenderer, Renderer};
