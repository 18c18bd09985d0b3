//! # Scene Graph
//!
//! The shared state every other component reads or mutates: a hierarchy of
//! [`SceneNode`]s addressed by [`NodeId`], plus the materials, textures, fonts,
//! background and debug tweaks they refer to.
//!
//! ## Usage
//!
//! ```no_run
//! use vista::gfx::scene::{Color, Geometry, Material, Scene, SceneNode};
//!
//! let mut scene = Scene::new();
//! let red = scene.add_material(Material::basic("red", Color::from_hex(0xff0000)));
//! let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), red));
//! scene.node_mut(cube).unwrap().transform.position.y = 0.5;
//! ```
//!
//! Controls and tweens address state through [`PropertyRef`] keys, so a
//! binding to a detached node reads as `None` instead of dangling.

pub mod color;
pub mod geometry;
pub mod material;
pub mod node;
pub mod property;
pub mod scene;

// Re-export main types
pub use color::Color;
pub use geometry::Geometry;
pub use material::{Material, MaterialId, MaterialKind};
pub use node::{Light, LightKind, NodeContent, NodeId, SceneNode, ShadowCamera, ShadowSettings, Transform};
pub use property::{Axis, LightProperty, MaterialProperty, NodeProperty, PropertyRef, Value, ValueKind};
pub use scene::{Background, PropertyError, Scene, SceneStatistics};
