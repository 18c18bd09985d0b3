//! # User Interface Module
//!
//! The live debug-parameter panel and its Dear ImGui host.
//!
//! ## Key Components
//!
//! - [`ParameterPanel`] - Binding records between controls and scene properties
//! - [`draw_panel`] - Draws a panel with ImGui and reports [`Interaction`]s
//! - [`UiManager`] - ImGui context, winit input and wgpu overlay rendering
//!
//! ## Usage
//!
//! ```no_run
//! use vista::gfx::scene::{Color, Geometry, Material, Scene, SceneNode};
//! use vista::ui::{BindTarget, ParamOptions, ParameterPanel};
//!
//! let mut scene = Scene::new();
//! let red = scene.add_material(Material::basic("red", Color::from_hex(0xff0000)));
//! let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), red));
//!
//! let mut panel = ParameterPanel::new("Debug");
//! panel
//!     .bind(&scene, BindTarget::Node(cube), "position.y",
//!           ParamOptions::new().range(-3.0, 3.0).step(0.01).name("elevation"))
//!     .unwrap();
//! ```
//!
//! ## Input Handling
//!
//! When ImGui wants the pointer or keyboard, camera controls are skipped for
//! that event.

pub mod manager;
pub mod panel;
pub mod params;

// Re-export main types
pub use manager::UiManager;
pub use panel::draw_panel;
pub use params::{
    BindError, BindTarget, Interaction, ParamId, ParamKind, ParamOptions, ParamView,
    ParameterPanel, UpdatePolicy,
};
