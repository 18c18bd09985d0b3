//! Asynchronous resource loading
//!
//! Textures, typeface fonts and environment maps are fetched by a
//! [`LoadService`] (normally the [`FileLoader`]) and handed to the scene by the
//! [`ResourceBridge`] at the next frame boundary.

pub mod bridge;
pub mod file_loader;
pub mod font;
pub mod loader;
pub mod texture_resource;

// Re-export main types
pub use bridge::{DrainReport, LoadEvent, LoadHandle, LoadStatus, ResourceBridge};
pub use file_loader::FileLoader;
pub use font::{FontData, FontId, Glyph, TextOptions};
pub use loader::{
    EnvironmentSource, FetchId, LoadError, LoadService, LoadTicket, Resource, ResourceSpec,
};
pub use texture_resource::{
    ColorSpace, EnvironmentMap, FilterMode, TextureData, TextureId, TextureResource,
    TextureSettings, WrapMode, CUBE_FACES,
};
