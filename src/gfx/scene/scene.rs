use std::{collections::BTreeMap, sync::Arc, time::Duration};

use cgmath::{Matrix4, SquareMatrix};

use crate::gfx::{
    animation::TweenSet,
    resources::{EnvironmentMap, FontData, FontId, TextureData, TextureId},
};

use super::{
    color::Color,
    geometry::Geometry,
    material::{Material, MaterialId},
    node::{NodeContent, NodeId, SceneNode},
    property::{Axis, LightProperty, MaterialProperty, NodeProperty, PropertyRef, Value, ValueKind},
};

/// What the renderer clears to
#[derive(Debug, Clone)]
pub enum Background {
    Color(Color),
    Environment(Arc<EnvironmentMap>),
}

/// Why a property write was refused
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("{0} no longer exists")]
    Stale(PropertyRef),
    #[error("{property} expects a {expected} value, got {found}")]
    KindMismatch {
        property: PropertyRef,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Counters describing the current graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStatistics {
    pub nodes: usize,
    pub meshes: usize,
    pub lights: usize,
    pub helpers: usize,
    pub visible: usize,
    pub triangles: u64,
    pub materials: usize,
    pub textures: usize,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// The scene graph
///
/// Nodes live in a generational slab; detaching a node drops its whole subtree
/// and invalidates every id into it. Materials, textures and fonts are shared
/// by id and outlive the nodes that use them.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    materials: Vec<Material>,
    textures: Vec<Arc<TextureData>>,
    fonts: Vec<Arc<FontData>>,
    background: Background,
    environment: Option<Arc<EnvironmentMap>>,
    tweaks: BTreeMap<String, Value>,
    pub tweens: TweenSet,
    geometry_rebuilds: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            fonts: Vec::new(),
            background: Background::Color(Color::BLACK),
            environment: None,
            tweaks: BTreeMap::new(),
            tweens: TweenSet::default(),
            geometry_rebuilds: 0,
        }
    }

    // ---- hierarchy ----

    /// Adds a node (and nothing else) at the top level
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = self.insert(node, None);
        self.roots.push(id);
        id
    }

    /// Adds a node under `parent`; `None` if the parent is gone
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.insert(node, Some(parent));
        self.node_mut(parent)?.children.push(id);
        Some(id)
    }

    fn insert(&mut self, mut node: SceneNode, parent: Option<NodeId>) -> NodeId {
        node.parent = parent;
        node.children.clear();

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Moves `child` under `parent` (or to the top level with `None`)
    ///
    /// Refuses moves that would create a cycle.
    pub fn attach(&mut self, child: NodeId, parent: Option<NodeId>) -> bool {
        if !self.contains(child) {
            return false;
        }
        if let Some(parent) = parent {
            if !self.contains(parent) || self.is_ancestor_or_self(child, parent) {
                return false;
            }
        }

        self.unlink(child);
        match parent {
            Some(parent) => {
                if let Some(node) = self.node_mut(parent) {
                    node.children.push(child);
                }
            }
            None => self.roots.push(child),
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = parent;
        }
        true
    }

    /// Removes a node and all of its descendants
    ///
    /// Returns how many nodes were removed; 0 for a stale id.
    pub fn detach(&mut self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        self.unlink(id);

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                removed += 1;
            }
        }
        removed
    }

    fn unlink(&mut self, id: NodeId) {
        match self.node(id).and_then(|node| node.parent) {
            Some(parent) => {
                if let Some(node) = self.node_mut(parent) {
                    node.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// All live nodes in slot order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, node)| node.name == name).map(|(id, _)| id)
    }

    /// Depth-first list of nodes that are visible along with all their ancestors
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let mut visible = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if !node.visible {
                continue;
            }
            visible.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        visible
    }

    /// Local-to-world matrix of a node
    pub fn world_matrix(&self, id: NodeId) -> Option<Matrix4<f32>> {
        let mut matrix = Matrix4::identity();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        Some(matrix)
    }

    /// Replaces a mesh's geometry, which forces a rebuild
    pub fn set_geometry(&mut self, id: NodeId, geometry: Geometry) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        match &mut node.content {
            NodeContent::Mesh { geometry: current, .. } => {
                log::debug!(
                    "rebuilding {} geometry of '{}' ({} triangles)",
                    geometry.kind(),
                    node.name,
                    geometry.triangle_count()
                );
                *current = geometry;
                self.geometry_rebuilds += 1;
                true
            }
            _ => false,
        }
    }

    /// Adds a root-level marker that follows `light` and draws its shape
    ///
    /// Returns `None` when `light` is not a light node.
    pub fn add_light_helper(&mut self, light: NodeId, size: f32) -> Option<NodeId> {
        let node = self.node(light)?;
        node.light_ref()?;
        let name = format!("{}_helper", node.name);
        Some(self.add(SceneNode::new(
            &name,
            NodeContent::LightHelper {
                light,
                size: size.abs().max(f32::EPSILON),
            },
        )))
    }

    /// How many geometry rebuilds have happened
    pub fn geometry_rebuilds(&self) -> u64 {
        self.geometry_rebuilds
    }

    // ---- shared resources ----

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() as u32 - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    pub fn add_texture(&mut self, texture: Arc<TextureData>) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() as u32 - 1)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Arc<TextureData>> {
        self.textures.get(id.0 as usize)
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &Arc<TextureData>)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(index, texture)| (TextureId(index as u32), texture))
    }

    pub fn add_font(&mut self, font: Arc<FontData>) -> FontId {
        self.fonts.push(font);
        FontId(self.fonts.len() as u32 - 1)
    }

    pub fn font(&self, id: FontId) -> Option<&Arc<FontData>> {
        self.fonts.get(id.0 as usize)
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    /// Environment used for image-based lighting, independent of the background
    pub fn environment(&self) -> Option<&Arc<EnvironmentMap>> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, environment: Option<Arc<EnvironmentMap>>) {
        self.environment = environment;
    }

    // ---- debug values ----

    pub fn tweak(&self, name: &str) -> Option<&Value> {
        self.tweaks.get(name)
    }

    pub fn set_tweak(&mut self, name: &str, value: Value) {
        self.tweaks.insert(name.to_string(), value);
    }

    pub fn tweaks(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.tweaks.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ---- property access ----

    /// Reads a property; `None` if its owner is gone
    pub fn get(&self, property: &PropertyRef) -> Option<Value> {
        match property {
            PropertyRef::Node(id, key) => {
                let transform = &self.node(*id)?.transform;
                let value = match key {
                    NodeProperty::Position(axis) => Value::Float(component(&transform.position, *axis)),
                    NodeProperty::Rotation(axis) => Value::Float(component(&transform.rotation, *axis)),
                    NodeProperty::Scale(axis) => Value::Float(component(&transform.scale, *axis)),
                    NodeProperty::Visible => Value::Bool(self.node(*id)?.visible),
                };
                Some(value)
            }
            PropertyRef::Light(id, key) => {
                let light = self.node(*id)?.light_ref()?;
                Some(match key {
                    LightProperty::Intensity => Value::Float(light.intensity),
                    LightProperty::Color => Value::Color(light.color),
                    LightProperty::CastShadow => Value::Bool(light.cast_shadow),
                    LightProperty::ShadowRadius => Value::Float(light.shadow.radius),
                    LightProperty::ShadowBias => Value::Float(light.shadow.bias),
                })
            }
            PropertyRef::Material(id, key) => {
                let material = self.material(*id)?;
                Some(match key {
                    MaterialProperty::Color => Value::Color(material.color),
                    MaterialProperty::Opacity => Value::Float(material.opacity),
                    MaterialProperty::Wireframe => Value::Bool(material.wireframe),
                    MaterialProperty::Roughness => Value::Float(material.roughness),
                    MaterialProperty::Metalness => Value::Float(material.metalness),
                })
            }
            PropertyRef::Tweak(name) => self.tweaks.get(name).cloned(),
        }
    }

    /// Writes a property
    ///
    /// Tweaks are created on first write; every other target must exist and
    /// the value kind must match.
    pub fn set(&mut self, property: &PropertyRef, value: Value) -> Result<(), PropertyError> {
        let stale = || PropertyError::Stale(property.clone());
        let mismatch = |expected: ValueKind, value: &Value| PropertyError::KindMismatch {
            property: property.clone(),
            expected,
            found: value.kind(),
        };

        match property {
            PropertyRef::Node(id, key) => {
                let node = self.node_mut(*id).ok_or_else(stale)?;
                match (key, &value) {
                    (NodeProperty::Position(axis), Value::Float(v)) => {
                        *component_mut(&mut node.transform.position, *axis) = *v
                    }
                    (NodeProperty::Rotation(axis), Value::Float(v)) => {
                        *component_mut(&mut node.transform.rotation, *axis) = *v
                    }
                    (NodeProperty::Scale(axis), Value::Float(v)) => {
                        *component_mut(&mut node.transform.scale, *axis) = *v
                    }
                    (NodeProperty::Visible, Value::Bool(v)) => node.visible = *v,
                    (key, value) => return Err(mismatch(key.kind(), value)),
                }
            }
            PropertyRef::Light(id, key) => {
                let light = self
                    .node_mut(*id)
                    .and_then(|node| node.light_mut())
                    .ok_or_else(stale)?;
                match (key, &value) {
                    (LightProperty::Intensity, Value::Float(v)) => light.intensity = *v,
                    (LightProperty::Color, Value::Color(c)) => light.color = *c,
                    (LightProperty::CastShadow, Value::Bool(b)) => light.cast_shadow = *b,
                    (LightProperty::ShadowRadius, Value::Float(v)) => light.shadow.radius = v.max(0.0),
                    (LightProperty::ShadowBias, Value::Float(v)) => light.shadow.bias = *v,
                    (key, value) => return Err(mismatch(key.kind(), value)),
                }
            }
            PropertyRef::Material(id, key) => {
                let material = self.material_mut(*id).ok_or_else(stale)?;
                match (key, &value) {
                    (MaterialProperty::Color, Value::Color(c)) => material.color = *c,
                    (MaterialProperty::Opacity, Value::Float(v)) => material.opacity = v.clamp(0.0, 1.0),
                    (MaterialProperty::Wireframe, Value::Bool(b)) => material.wireframe = *b,
                    (MaterialProperty::Roughness, Value::Float(v)) => material.roughness = v.clamp(0.0, 1.0),
                    (MaterialProperty::Metalness, Value::Float(v)) => material.metalness = v.clamp(0.0, 1.0),
                    (key, value) => return Err(mismatch(key.kind(), value)),
                }
            }
            PropertyRef::Tweak(name) => {
                if let Some(existing) = self.tweaks.get(name) {
                    if existing.kind() != value.kind() {
                        return Err(mismatch(existing.kind(), &value));
                    }
                }
                self.tweaks.insert(name.clone(), value);
            }
        }
        Ok(())
    }

    /// Advances running tweens to `now`; returns how many are still active
    pub fn advance_tweens(&mut self, now: Duration) -> usize {
        let mut tweens = std::mem::take(&mut self.tweens);
        let active = tweens.advance(now, self);
        self.tweens = tweens;
        active
    }

    pub fn get_statistics(&self) -> SceneStatistics {
        let mut stats = SceneStatistics {
            nodes: self.node_count(),
            materials: self.materials.len(),
            textures: self.textures.len(),
            ..Default::default()
        };
        for (_, node) in self.iter() {
            match &node.content {
                NodeContent::Mesh { .. } => stats.meshes += 1,
                NodeContent::Light(_) => stats.lights += 1,
                NodeContent::LightHelper { .. } | NodeContent::Axes { .. } => stats.helpers += 1,
                NodeContent::Group => {}
            }
        }
        for id in self.visible_nodes() {
            stats.visible += 1;
            if let Some(geometry) = self.node(id).and_then(|n| n.geometry()) {
                stats.triangles += geometry.triangle_count();
            }
        }
        stats
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn component(v: &cgmath::Vector3<f32>, axis: Axis) -> f32 {
    match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
        Axis::Z => v.z,
    }
}

fn component_mut(v: &mut cgmath::Vector3<f32>, axis: Axis) -> &mut f32 {
    match axis {
        Axis::X => &mut v.x,
        Axis::Y => &mut v.y,
        Axis::Z => &mut v.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::node::Light;

    fn mesh_scene() -> (Scene, NodeId, MaterialId) {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::basic("red", Color::from_hex(0xff0000)));
        let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), material));
        (scene, cube, material)
    }

    #[test]
    fn detach_removes_subtree_and_invalidates_ids() {
        let mut scene = Scene::new();
        let group = scene.add(SceneNode::group("group"));
        let child = scene.add_child(group, SceneNode::group("child")).unwrap();
        let grandchild = scene.add_child(child, SceneNode::group("grandchild")).unwrap();

        assert_eq!(scene.detach(group), 3);
        assert!(scene.node(child).is_none());
        assert!(scene.node(grandchild).is_none());
        assert_eq!(scene.node_count(), 0);
        assert!(scene.roots().is_empty());

        // Slot reuse does not revive old ids
        let fresh = scene.add(SceneNode::group("fresh"));
        assert_ne!(fresh, group);
        assert_eq!(scene.detach(group), 0);
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::group("a"));
        let b = scene.add_child(a, SceneNode::group("b")).unwrap();

        assert!(!scene.attach(a, Some(b)));
        assert!(scene.attach(b, None));
        assert_eq!(scene.roots(), &[a, b]);
        assert!(scene.attach(a, Some(b)));
        assert_eq!(scene.node(a).unwrap().parent(), Some(b));
        assert_eq!(scene.roots(), &[b]);
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut scene = Scene::new();
        let group = scene.add(SceneNode::group("group").with_visible(false));
        scene.add_child(group, SceneNode::group("child"));
        let other = scene.add(SceneNode::group("other"));

        assert_eq!(scene.visible_nodes(), vec![other]);
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = scene.add(SceneNode::group("parent").with_position(1.0, 0.0, 0.0));
        let child = scene
            .add_child(parent, SceneNode::group("child").with_position(0.0, 2.0, 0.0))
            .unwrap();
        let world = scene.world_matrix(child).unwrap();
        assert_eq!(world.w.truncate(), cgmath::Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn property_round_trip_through_keys() {
        let (mut scene, cube, material) = mesh_scene();
        let elevation = PropertyRef::Node(cube, NodeProperty::Position(Axis::Y));

        scene.set(&elevation, Value::Float(1.5)).unwrap();
        assert_eq!(scene.get(&elevation), Some(Value::Float(1.5)));

        let wireframe = PropertyRef::Material(material, MaterialProperty::Wireframe);
        scene.set(&wireframe, Value::Bool(true)).unwrap();
        assert!(scene.material(material).unwrap().wireframe);
    }

    #[test]
    fn property_kind_mismatch_is_refused() {
        let (mut scene, cube, _) = mesh_scene();
        let visible = PropertyRef::Node(cube, NodeProperty::Visible);
        let err = scene.set(&visible, Value::Float(1.0)).unwrap_err();
        assert!(matches!(err, PropertyError::KindMismatch { expected: ValueKind::Bool, .. }));
    }

    #[test]
    fn stale_property_reads_none() {
        let (mut scene, cube, _) = mesh_scene();
        let elevation = PropertyRef::Node(cube, NodeProperty::Position(Axis::Y));
        scene.detach(cube);
        assert_eq!(scene.get(&elevation), None);
        assert!(matches!(
            scene.set(&elevation, Value::Float(0.0)),
            Err(PropertyError::Stale(_))
        ));
    }

    #[test]
    fn light_properties_require_a_light() {
        let (mut scene, cube, _) = mesh_scene();
        let light = scene.add(SceneNode::light("sun", Light::directional(Color::WHITE, 1.0)));

        let intensity = PropertyRef::Light(light, LightProperty::Intensity);
        scene.set(&intensity, Value::Float(3.0)).unwrap();
        assert_eq!(scene.get(&intensity), Some(Value::Float(3.0)));
        assert_eq!(scene.get(&PropertyRef::Light(cube, LightProperty::Intensity)), None);
    }

    #[test]
    fn geometry_rebuild_is_counted() {
        let (mut scene, cube, _) = mesh_scene();
        assert!(scene.set_geometry(cube, Geometry::cube(4)));
        assert_eq!(scene.geometry_rebuilds(), 1);
        assert_eq!(scene.get_statistics().triangles, 6 * 16 * 2);
    }

    #[test]
    fn tweaks_keep_their_kind() {
        let mut scene = Scene::new();
        let tweak = PropertyRef::Tweak("subdivision".into());
        scene.set(&tweak, Value::Float(2.0)).unwrap();
        assert!(scene.set(&tweak, Value::Bool(true)).is_err());
        assert_eq!(scene.tweak("subdivision"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn light_helpers_and_axes_count_as_helpers() {
        let (mut scene, cube, _) = mesh_scene();
        let sun = scene.add(SceneNode::light("sun", Light::directional(Color::WHITE, 1.0)));
        scene.add(SceneNode::axes("axes", 2.0));

        assert!(scene.add_light_helper(cube, 1.0).is_none());
        let helper = scene.add_light_helper(sun, 0.5).unwrap();
        assert_eq!(scene.node(helper).unwrap().name, "sun_helper");

        let stats = scene.get_statistics();
        assert_eq!((stats.meshes, stats.lights, stats.helpers), (1, 1, 2));
    }

    #[test]
    fn shadow_properties_round_trip_through_keys() {
        let mut scene = Scene::new();
        let sun = scene.add(SceneNode::light("sun", Light::directional(Color::WHITE, 1.0)));
        let radius = PropertyRef::Light(sun, LightProperty::ShadowRadius);

        scene.set(&radius, Value::Float(-3.0)).unwrap();
        assert_eq!(scene.get(&radius), Some(Value::Float(0.0)));
        scene.set(&radius, Value::Float(4.0)).unwrap();
        assert_eq!(scene.get(&radius), Some(Value::Float(4.0)));
        assert!(scene.set(&radius, Value::Bool(true)).is_err());
    }
}
