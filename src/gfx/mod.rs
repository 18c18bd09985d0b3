//! # Graphics Module
//!
//! Scene-side state and the platform seams around it.
//!
//! ## Architecture Overview
//!
//! - **Scene Graph** ([`scene`]) - Nodes, materials, tweaks and property keys
//! - **Camera System** ([`camera`]) - Perspective camera with damped orbit controls
//! - **Viewport** ([`viewport`]) - Size, pixel ratio and fullscreen state
//! - **Rendering** ([`rendering`]) - The [`Renderer`] seam and its wgpu implementation
//! - **Resources** ([`resources`]) - Asynchronous texture, font and environment loading
//! - **Animation** ([`animation`]) - Property tweens advanced by the frame clock
//!
//! [`Renderer`]: rendering::Renderer

pub mod animation;
pub mod camera;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod viewport;

// Re-export commonly used types
pub use camera::{CameraManager, PerspectiveCamera};
pub use rendering::{Renderer, SurfaceRenderer};
pub use viewport::{DisplayMode, ViewportManager};
