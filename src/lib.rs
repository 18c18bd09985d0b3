// src/lib.rs
//! Vista Scene Runtime
//!
//! Keeps a live scene graph, a camera, a viewport and asynchronously loaded
//! resources consistent while rendering continuously on wgpu and winit.

pub mod app;
pub mod config;
pub mod gfx;
pub mod prelude;
pub mod runtime;
pub mod ui;

// Re-export main types for convenience
pub use app::{init_logging, SceneApp, SceneRuntime};
pub use config::RuntimeConfig;

/// Creates a windowed app with the default configuration
pub fn default() -> anyhow::Result<SceneApp> {
    SceneApp::new(RuntimeConfig::default())
}
