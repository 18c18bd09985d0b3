//! Addressable scene properties
//!
//! Debug panels and tweens address scene state through these keys rather than
//! through references, so a binding never outlives the node it points at: a
//! stale key simply reads as `None`.

use std::fmt;

use super::{color::Color, material::MaterialId, node::NodeId};

/// A property value as seen by controls and tweens
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Bool(bool),
    Color(Color),
    Text(String),
}

impl Value {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Color(_) => ValueKind::Color,
            Value::Text(_) => ValueKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Bool,
    Color,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Float => "number",
            ValueKind::Bool => "boolean",
            ValueKind::Color => "color",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Node-level properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProperty {
    Position(Axis),
    Rotation(Axis),
    Scale(Axis),
    Visible,
}

impl NodeProperty {
    /// Parses keys like `"position.y"`, `"rotation.x"`, `"visible"`
    pub fn parse(key: &str) -> Option<Self> {
        if key == "visible" {
            return Some(NodeProperty::Visible);
        }
        let (group, axis) = key.split_once('.')?;
        let axis = Axis::parse(axis)?;
        match group {
            "position" => Some(NodeProperty::Position(axis)),
            "rotation" => Some(NodeProperty::Rotation(axis)),
            "scale" => Some(NodeProperty::Scale(axis)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            NodeProperty::Visible => ValueKind::Bool,
            _ => ValueKind::Float,
        }
    }
}

/// Light payload properties, addressed through the light's node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightProperty {
    Intensity,
    Color,
    CastShadow,
    ShadowRadius,
    ShadowBias,
}

impl LightProperty {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "intensity" => Some(LightProperty::Intensity),
            "color" => Some(LightProperty::Color),
            "cast_shadow" | "castShadow" => Some(LightProperty::CastShadow),
            "shadow.radius" => Some(LightProperty::ShadowRadius),
            "shadow.bias" => Some(LightProperty::ShadowBias),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            LightProperty::Intensity => ValueKind::Float,
            LightProperty::Color => ValueKind::Color,
            LightProperty::CastShadow => ValueKind::Bool,
            LightProperty::ShadowRadius | LightProperty::ShadowBias => ValueKind::Float,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialProperty {
    Color,
    Opacity,
    Wireframe,
    Roughness,
    Metalness,
}

impl MaterialProperty {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "color" => Some(MaterialProperty::Color),
            "opacity" => Some(MaterialProperty::Opacity),
            "wireframe" => Some(MaterialProperty::Wireframe),
            "roughness" => Some(MaterialProperty::Roughness),
            "metalness" => Some(MaterialProperty::Metalness),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            MaterialProperty::Color => ValueKind::Color,
            MaterialProperty::Wireframe => ValueKind::Bool,
            _ => ValueKind::Float,
        }
    }
}

/// A fully resolved reference to one mutable scene property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyRef {
    Node(NodeId, NodeProperty),
    Light(NodeId, LightProperty),
    Material(MaterialId, MaterialProperty),
    Tweak(String),
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyRef::Node(id, property) => write!(f, "{id}.{property:?}"),
            PropertyRef::Light(id, property) => write!(f, "{id}.light.{property:?}"),
            PropertyRef::Material(id, property) => write!(f, "{id}.{property:?}"),
            PropertyRef::Tweak(name) => write!(f, "tweak.{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_node_keys() {
        assert_eq!(NodeProperty::parse("position.y"), Some(NodeProperty::Position(Axis::Y)));
        assert_eq!(NodeProperty::parse("rotation.x"), Some(NodeProperty::Rotation(Axis::X)));
        assert_eq!(NodeProperty::parse("visible"), Some(NodeProperty::Visible));
        assert_eq!(NodeProperty::parse("position.w"), None);
        assert_eq!(NodeProperty::parse("color"), None);
    }

    #[test]
    fn property_kinds() {
        assert_eq!(MaterialProperty::parse("wireframe").map(|p| p.kind()), Some(ValueKind::Bool));
        assert_eq!(LightProperty::parse("intensity").map(|p| p.kind()), Some(ValueKind::Float));
    }
}
