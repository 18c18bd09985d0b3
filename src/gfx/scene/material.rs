use std::fmt;

use super::color::Color;
use crate::gfx::resources::TextureId;

/// Handle of a material stored in a [`Scene`](super::Scene)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) u32);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit flat color
    Basic,
    /// Physically based, lit
    Standard,
    /// Lit from a matcap texture
    Matcap,
    /// Debug view of surface normals
    Normal,
}

/// Surface description shared by meshes
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub color: Color,
    pub opacity: f32,
    pub wireframe: bool,
    pub roughness: f32,
    pub metalness: f32,
    pub map: Option<TextureId>,
    pub matcap: Option<TextureId>,
}

impl Material {
    pub fn new(name: &str, kind: MaterialKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            color: Color::WHITE,
            opacity: 1.0,
            wireframe: false,
            roughness: 1.0,
            metalness: 0.0,
            map: None,
            matcap: None,
        }
    }

    pub fn basic(name: &str, color: Color) -> Self {
        Self::new(name, MaterialKind::Basic).with_color(color)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }

    pub fn with_map(mut self, texture: TextureId) -> Self {
        self.map = Some(texture);
        self
    }

    pub fn with_matcap(mut self, texture: TextureId) -> Self {
        self.kind = MaterialKind::Matcap;
        self.matcap = Some(texture);
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default", MaterialKind::Basic)
    }
}
