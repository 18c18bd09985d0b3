use std::fmt;

use cgmath::{Matrix4, Rad, Vector3};

use super::{color::Color, geometry::Geometry, material::MaterialId};

/// Generational handle of a node in a [`Scene`](super::Scene)
///
/// Once the node is detached the handle stays invalid even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}v{}", self.index, self.generation)
    }
}

/// Local transform: translation, XYZ Euler rotation in radians, scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn matrix(&self) -> Matrix4<f32> {
        let rotation = Matrix4::from_angle_z(Rad(self.rotation.z))
            * Matrix4::from_angle_y(Rad(self.rotation.y))
            * Matrix4::from_angle_x(Rad(self.rotation.x));
        Matrix4::from_translation(self.position)
            * rotation
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Hemisphere { ground: Color },
    Directional,
    Point { distance: f32, decay: f32 },
    Spot { angle: f32, penumbra: f32 },
    /// Emitting rectangle facing the node's local -Z
    RectArea { width: f32, height: f32 },
}

impl LightKind {
    pub fn name(&self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Hemisphere { .. } => "hemisphere",
            LightKind::Directional => "directional",
            LightKind::Point { .. } => "point",
            LightKind::Spot { .. } => "spot",
            LightKind::RectArea { .. } => "rect_area",
        }
    }

    /// Only directional lights render a shadow map
    pub fn supports_shadows(&self) -> bool {
        matches!(self, LightKind::Directional)
    }
}

/// Orthographic frustum the shadow map is rendered from, in light space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl ShadowCamera {
    /// Symmetric frustum reaching `extent` units from the light axis
    pub fn square(extent: f32, near: f32, far: f32) -> Self {
        let extent = extent.abs();
        Self {
            near,
            far,
            left: -extent,
            right: extent,
            top: extent,
            bottom: -extent,
        }
    }

    pub fn projection(&self) -> Matrix4<f32> {
        cgmath::ortho(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self::square(5.0, 0.5, 500.0)
    }
}

/// Shadow map configuration of a light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Edge length of the square depth texture, in texels
    pub map_size: u32,
    pub camera: ShadowCamera,
    /// Filter radius in texels
    pub radius: f32,
    pub bias: f32,
}

impl ShadowSettings {
    pub const MIN_MAP_SIZE: u32 = 64;
    pub const MAX_MAP_SIZE: u32 = 4096;

    /// Map size rounded to a power of two within the supported range
    pub fn effective_map_size(&self) -> u32 {
        self.map_size
            .clamp(Self::MIN_MAP_SIZE, Self::MAX_MAP_SIZE)
            .next_power_of_two()
            .min(Self::MAX_MAP_SIZE)
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 512,
            camera: ShadowCamera::default(),
            radius: 1.0,
            bias: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
    pub shadow: ShadowSettings,
}

impl Light {
    pub fn new(kind: LightKind, color: Color, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            cast_shadow: false,
            shadow: ShadowSettings::default(),
        }
    }

    /// Sky color from above, `ground` from below
    pub fn hemisphere(sky: Color, ground: Color, intensity: f32) -> Self {
        Self::new(LightKind::Hemisphere { ground }, sky, intensity)
    }

    pub fn rect_area(color: Color, intensity: f32, width: f32, height: f32) -> Self {
        Self::new(LightKind::RectArea { width, height }, color, intensity)
    }

    pub fn spot(color: Color, intensity: f32, angle: f32, penumbra: f32) -> Self {
        Self::new(
            LightKind::Spot {
                angle,
                penumbra: penumbra.clamp(0.0, 1.0),
            },
            color,
            intensity,
        )
    }

    /// Outline drawn by a light helper of the given size
    pub fn helper_geometry(&self, size: f32) -> Geometry {
        match self.kind {
            LightKind::RectArea { width, height } => Geometry::plane(width, height),
            LightKind::Directional => Geometry::plane(size, size),
            _ => Geometry::sphere(size, 4, 2),
        }
    }

    pub fn with_shadow(mut self, shadow: ShadowSettings) -> Self {
        self.cast_shadow = true;
        self.shadow = shadow;
        self
    }

    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Ambient, color, intensity)
    }

    pub fn directional(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Directional, color, intensity)
    }

    pub fn point(color: Color, intensity: f32) -> Self {
        Self::new(
            LightKind::Point {
                distance: 0.0,
                decay: 2.0,
            },
            color,
            intensity,
        )
    }
}

/// What a node carries besides its transform
#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Group,
    Mesh {
        geometry: Geometry,
        material: MaterialId,
    },
    Light(Light),
    /// Debug marker drawn in place of a light, see [`Scene::add_light_helper`](super::Scene::add_light_helper)
    LightHelper { light: NodeId, size: f32 },
    /// Colored X/Y/Z axis lines of the given length
    Axes { size: f32 },
}

/// An element of the scene graph
///
/// Hierarchy links are maintained by the scene; build nodes detached and hand
/// them to [`Scene::add`](super::Scene::add).
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub content: NodeContent,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: &str, content: NodeContent) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            visible: true,
            content,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, NodeContent::Group)
    }

    pub fn mesh(name: &str, geometry: Geometry, material: MaterialId) -> Self {
        Self::new(name, NodeContent::Mesh { geometry, material })
    }

    pub fn light(name: &str, light: Light) -> Self {
        Self::new(name, NodeContent::Light(light))
    }

    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.position = Vector3::new(x, y, z);
        self
    }

    pub fn with_rotation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.rotation = Vector3::new(x, y, z);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.transform.scale = Vector3::new(scale, scale, scale);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.content {
            NodeContent::Mesh { geometry, .. } => Some(geometry),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<MaterialId> {
        match &self.content {
            NodeContent::Mesh { material, .. } => Some(*material),
            _ => None,
        }
    }

    pub fn axes(name: &str, size: f32) -> Self {
        Self::new(name, NodeContent::Axes { size })
    }

    pub fn light_ref(&self) -> Option<&Light> {
        match &self.content {
            NodeContent::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.content {
            NodeContent::Light(light) => Some(light),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector4};

    #[test]
    fn default_transform_is_identity() {
        assert_eq!(Transform::default().matrix(), Matrix4::identity());
    }

    #[test]
    fn transform_applies_scale_then_translation() {
        let transform = Transform {
            position: Vector3::new(1.0, 2.0, 3.0),
            scale: Vector3::new(2.0, 2.0, 2.0),
            ..Default::default()
        };
        let moved = transform.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(moved, Vector4::new(3.0, 2.0, 3.0, 1.0));
    }

    #[test]
    fn shadow_map_size_is_a_clamped_power_of_two() {
        let mut shadow = ShadowSettings::default();
        assert_eq!(shadow.effective_map_size(), 512);
        shadow.map_size = 1000;
        assert_eq!(shadow.effective_map_size(), 1024);
        shadow.map_size = 0;
        assert_eq!(shadow.effective_map_size(), ShadowSettings::MIN_MAP_SIZE);
        shadow.map_size = u32::MAX;
        assert_eq!(shadow.effective_map_size(), ShadowSettings::MAX_MAP_SIZE);
    }

    #[test]
    fn shadow_camera_projects_its_corners_to_clip_edges() {
        let camera = ShadowCamera::square(4.0, 1.0, 11.0);
        assert_eq!((camera.left, camera.top), (-4.0, 4.0));
        let corner = camera.projection() * Vector4::new(4.0, -4.0, -1.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn only_directional_lights_render_shadows() {
        let light = Light::rect_area(Color::WHITE, 5.0, 2.0, 1.0).with_shadow(ShadowSettings::default());
        assert!(light.cast_shadow);
        assert_eq!(light.kind.name(), "rect_area");
        assert!(!light.kind.supports_shadows());
        assert!(LightKind::Directional.supports_shadows());
    }
}
