//! # Vista Prelude
//!
//! Commonly used types in one import.
//!
//! ```no_run
//! use vista::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     vista::default()?
//!         .on_start(|runtime| {
//!             let red = runtime
//!                 .scene
//!                 .add_material(Material::basic("red", Color::from_hex(0xff0000)));
//!             let cube = runtime.scene.add(SceneNode::mesh("cube", Geometry::cube(1), red));
//!             Ok(vec![hook_fn("spin", move |frame, scene, _camera| {
//!                 if let Some(node) = scene.node_mut(cube) {
//!                     node.transform.rotation.y = frame.elapsed_secs();
//!                 }
//!                 Ok(())
//!             })])
//!         })
//!         .run()
//! }
//! ```

// Application
pub use crate::app::{SceneApp, SceneRuntime};
pub use crate::config::RuntimeConfig;

// Frame loop
pub use crate::runtime::{hook_fn, FrameContext, FrameHook, FrameOutcome, RuntimeError};

// Scene graph
pub use crate::gfx::animation::{Ease, TweenOptions};
pub use crate::gfx::camera::{CameraManager, PerspectiveCamera};
pub use crate::gfx::scene::{
    Axis, Background, Color, Geometry, Light, LightProperty, Material, MaterialKind, NodeId,
    NodeProperty, PropertyRef, Scene, SceneNode, ShadowCamera, ShadowSettings, Value,
};

// Resources
pub use crate::gfx::resources::{LoadError, ResourceSpec, TextureSettings};

// Debug panel
pub use crate::ui::{BindTarget, ParamOptions, ParameterPanel};

// Re-export common external dependencies
pub use cgmath::{Deg, Point3, Rad, Vector3};
