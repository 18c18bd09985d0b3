//! Live parameter bindings
//!
//! A [`ParameterPanel`] holds explicit binding records, each pointing at one
//! scene property through a [`PropertyRef`]. The panel never holds references
//! into the scene: [`refresh`](ParameterPanel::refresh) pulls current values
//! for display, and [`input`](ParameterPanel::input) /
//! [`commit`](ParameterPanel::commit) push edits back.
//!
//! Live parameters write on every intermediate value. Commit-only parameters
//! buffer intermediate values and write once, on commit, which is how
//! expensive rebuilds (e.g. re-tessellating geometry) stay off the drag path.

use std::fmt;

use thiserror::Error;

use crate::gfx::scene::{
    LightProperty, MaterialId, MaterialProperty, NodeContent, NodeId, NodeProperty, PropertyError,
    PropertyRef, Scene, Value, ValueKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// The object a key is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget {
    /// Transform, visibility, plus material keys of a mesh and light keys of a light
    Node(NodeId),
    Material(MaterialId),
    /// The scene's named debug values
    Tweaks,
}

impl fmt::Display for BindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindTarget::Node(id) => write!(f, "{id}"),
            BindTarget::Material(id) => write!(f, "{id}"),
            BindTarget::Tweaks => f.write_str("tweaks"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Write on every intermediate value
    #[default]
    Live,
    /// Write only when the interaction ends
    CommitOnly,
}

/// Which control edits the parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Number {
        min: Option<f32>,
        max: Option<f32>,
        step: Option<f32>,
    },
    Toggle,
    Color,
    Choice(Vec<String>),
    Text,
    Action,
}

impl ParamKind {
    fn name(&self) -> &'static str {
        match self {
            ParamKind::Number { .. } => "number",
            ParamKind::Toggle => "toggle",
            ParamKind::Color => "color",
            ParamKind::Choice(_) => "choice",
            ParamKind::Text => "text",
            ParamKind::Action => "action",
        }
    }

    fn accepts(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (ParamKind::Number { .. }, ValueKind::Float)
                | (ParamKind::Toggle, ValueKind::Bool)
                | (ParamKind::Color, ValueKind::Color)
                | (ParamKind::Choice(_), ValueKind::Text)
                | (ParamKind::Text, ValueKind::Text)
        )
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("'{key}' is not a property of {target}")]
    UnknownKey { key: String, target: BindTarget },

    #[error("{0} no longer exists")]
    StaleTarget(BindTarget),

    #[error("'{key}' holds a {value} value and cannot be edited with a {control} control")]
    KindMismatch {
        key: String,
        control: &'static str,
        value: ValueKind,
    },

    #[error("no parameter {0}")]
    UnknownParameter(ParamId),

    #[error("{0} is an action")]
    IsAction(ParamId),

    #[error("{0} is not an action")]
    NotAnAction(ParamId),

    #[error("'{value}' is not one of the choices of {param}")]
    InvalidChoice { param: ParamId, value: String },

    #[error(transparent)]
    Write(#[from] PropertyError),
}

/// A user interaction reported by the widget host
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// An intermediate value while a control is being edited
    Input(ParamId, Value),
    /// The edit ended (e.g. slider released)
    Commit(ParamId),
    /// A button was pressed
    Invoke(ParamId),
}

type Callback = Box<dyn FnMut(&mut Scene, &Value)>;
type Action = Box<dyn FnMut(&mut Scene)>;

/// How a parameter is presented and updated
#[derive(Default)]
pub struct ParamOptions {
    label: Option<String>,
    folder: Option<String>,
    min: Option<f32>,
    max: Option<f32>,
    step: Option<f32>,
    choices: Option<Vec<String>>,
    policy: UpdatePolicy,
    on_change: Option<Callback>,
    on_commit: Option<Callback>,
}

impl ParamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min.min(max));
        self.max = Some(max.max(min));
        self
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = (step > 0.0).then_some(step);
        self
    }

    /// Display label; defaults to the key
    pub fn name(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn folder(mut self, folder: &str) -> Self {
        self.folder = Some(folder.to_string());
        self
    }

    /// Turns a text property into a dropdown
    pub fn choices<S: AsRef<str>>(mut self, choices: &[S]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn commit_only(mut self) -> Self {
        self.policy = UpdatePolicy::CommitOnly;
        self
    }

    /// Runs after every write made through the panel
    pub fn on_change(mut self, callback: impl FnMut(&mut Scene, &Value) + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    /// Runs when an interaction ends
    pub fn on_commit(mut self, callback: impl FnMut(&mut Scene, &Value) + 'static) -> Self {
        self.on_commit = Some(Box::new(callback));
        self
    }
}

struct BoundParameter {
    id: ParamId,
    label: String,
    folder: Option<String>,
    target: Option<PropertyRef>,
    kind: ParamKind,
    policy: UpdatePolicy,
    displayed: Option<Value>,
    pending: Option<Value>,
    on_change: Option<Callback>,
    on_commit: Option<Callback>,
    action: Option<Action>,
}

/// Read-only view of a parameter, for drawing
#[derive(Debug, Clone, Copy)]
pub struct ParamView<'a> {
    pub id: ParamId,
    pub label: &'a str,
    pub folder: Option<&'a str>,
    pub kind: &'a ParamKind,
    pub policy: UpdatePolicy,
    /// `None` once the bound property is gone (and always for actions)
    pub value: Option<&'a Value>,
}

/// The set of bound parameters plus the panel's visibility flag
pub struct ParameterPanel {
    title: String,
    width: f32,
    visible: bool,
    params: Vec<BoundParameter>,
    next_id: u32,
}

impl fmt::Debug for ParameterPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterPanel")
            .field("title", &self.title)
            .field("visible", &self.visible)
            .field("params", &self.params.len())
            .finish()
    }
}

impl ParameterPanel {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            width: 320.0,
            visible: true,
            params: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Shows or hides the panel; bindings are untouched
    pub fn toggle_visibility(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Binds `key` on `target` to a control
    ///
    /// The key is resolved now; the control kind follows the property's value
    /// kind unless `options` asks for a dropdown.
    pub fn bind(
        &mut self,
        scene: &Scene,
        target: BindTarget,
        key: &str,
        options: ParamOptions,
    ) -> Result<ParamId, BindError> {
        let property = resolve(scene, target, key)?;
        let current = scene.get(&property).ok_or(BindError::StaleTarget(target))?;

        let kind = match (&options.choices, current.kind()) {
            (Some(choices), _) => ParamKind::Choice(choices.clone()),
            (None, ValueKind::Float) => ParamKind::Number {
                min: options.min,
                max: options.max,
                step: options.step,
            },
            (None, ValueKind::Bool) => ParamKind::Toggle,
            (None, ValueKind::Color) => ParamKind::Color,
            (None, ValueKind::Text) => ParamKind::Text,
        };
        if !kind.accepts(current.kind()) {
            return Err(BindError::KindMismatch {
                key: key.to_string(),
                control: kind.name(),
                value: current.kind(),
            });
        }

        let id = self.next_param_id();
        log::debug!("bound {id} to {property}");
        self.params.push(BoundParameter {
            id,
            label: options.label.unwrap_or_else(|| key.to_string()),
            folder: options.folder,
            target: Some(property),
            kind,
            policy: options.policy,
            displayed: Some(current),
            pending: None,
            on_change: options.on_change,
            on_commit: options.on_commit,
            action: None,
        });
        Ok(id)
    }

    /// Adds a fire-and-forget button
    pub fn bind_action(
        &mut self,
        label: &str,
        folder: Option<&str>,
        action: impl FnMut(&mut Scene) + 'static,
    ) -> ParamId {
        let id = self.next_param_id();
        self.params.push(BoundParameter {
            id,
            label: label.to_string(),
            folder: folder.map(str::to_string),
            target: None,
            kind: ParamKind::Action,
            policy: UpdatePolicy::Live,
            displayed: None,
            pending: None,
            on_change: None,
            on_commit: None,
            action: Some(Box::new(action)),
        });
        id
    }

    /// Removes a parameter; returns whether it existed
    pub fn unbind(&mut self, id: ParamId) -> bool {
        let before = self.params.len();
        self.params.retain(|p| p.id != id);
        before != self.params.len()
    }

    fn next_param_id(&mut self) -> ParamId {
        let id = ParamId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn find(&self, label: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.label == label).map(|p| p.id)
    }

    /// Parameters in binding order
    pub fn params(&self) -> impl Iterator<Item = ParamView<'_>> {
        self.params.iter().map(|p| ParamView {
            id: p.id,
            label: &p.label,
            folder: p.folder.as_deref(),
            kind: &p.kind,
            policy: p.policy,
            value: p.displayed.as_ref(),
        })
    }

    /// Value currently shown for a parameter
    pub fn value(&self, id: ParamId) -> Option<&Value> {
        self.get(id).ok().and_then(|p| p.displayed.as_ref())
    }

    /// Pulls current property values so external changes show up
    ///
    /// A commit-only parameter mid-interaction keeps showing its pending value.
    pub fn refresh(&mut self, scene: &Scene) {
        for param in &mut self.params {
            let Some(target) = &param.target else { continue };
            if param.pending.is_some() {
                continue;
            }
            param.displayed = scene.get(target);
        }
    }

    /// Feeds one intermediate value from the control
    pub fn input(&mut self, scene: &mut Scene, id: ParamId, value: Value) -> Result<(), BindError> {
        let param = self.get_mut(id)?;
        let Some(target) = param.target.clone() else {
            return Err(BindError::IsAction(id));
        };
        let value = coerce(param, value)?;

        match param.policy {
            UpdatePolicy::Live => {
                scene.set(&target, value.clone())?;
                if let Some(on_change) = param.on_change.as_mut() {
                    on_change(scene, &value);
                }
            }
            UpdatePolicy::CommitOnly => {
                param.pending = Some(value.clone());
            }
        }
        param.displayed = Some(value);
        Ok(())
    }

    /// Ends an interaction
    ///
    /// Commit-only parameters write their pending value now. Either way the
    /// commit callback sees the final value. Committing with nothing pending
    /// on a commit-only parameter does nothing.
    pub fn commit(&mut self, scene: &mut Scene, id: ParamId) -> Result<(), BindError> {
        let param = self.get_mut(id)?;
        let Some(target) = param.target.clone() else {
            return Err(BindError::IsAction(id));
        };

        let value = match param.policy {
            UpdatePolicy::CommitOnly => {
                let Some(value) = param.pending.take() else {
                    return Ok(());
                };
                scene.set(&target, value.clone())?;
                if let Some(on_change) = param.on_change.as_mut() {
                    on_change(scene, &value);
                }
                value
            }
            UpdatePolicy::Live => match scene.get(&target) {
                Some(value) => value,
                None => return Err(PropertyError::Stale(target).into()),
            },
        };

        if let Some(on_commit) = param.on_commit.as_mut() {
            on_commit(scene, &value);
        }
        param.displayed = Some(value);
        Ok(())
    }

    /// Runs an action parameter; may be invoked any number of times
    pub fn invoke(&mut self, scene: &mut Scene, id: ParamId) -> Result<(), BindError> {
        let param = self.get_mut(id)?;
        let action = param.action.as_mut().ok_or(BindError::NotAnAction(id))?;
        log::debug!("invoking action '{}'", param.label);
        action(scene);
        Ok(())
    }

    /// Applies what a widget host reported for one frame
    ///
    /// Failures are logged and skipped; returns how many interactions applied.
    pub fn apply(&mut self, scene: &mut Scene, interactions: Vec<Interaction>) -> usize {
        let mut applied = 0;
        for interaction in interactions {
            let result = match interaction {
                Interaction::Input(id, value) => self.input(scene, id, value),
                Interaction::Commit(id) => self.commit(scene, id),
                Interaction::Invoke(id) => self.invoke(scene, id),
            };
            match result {
                Ok(()) => applied += 1,
                Err(error) => log::warn!("parameter update rejected: {error}"),
            }
        }
        applied
    }

    fn get(&self, id: ParamId) -> Result<&BoundParameter, BindError> {
        self.params
            .iter()
            .find(|p| p.id == id)
            .ok_or(BindError::UnknownParameter(id))
    }

    fn get_mut(&mut self, id: ParamId) -> Result<&mut BoundParameter, BindError> {
        self.params
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BindError::UnknownParameter(id))
    }
}

fn resolve(scene: &Scene, target: BindTarget, key: &str) -> Result<PropertyRef, BindError> {
    let unknown = || BindError::UnknownKey {
        key: key.to_string(),
        target,
    };

    match target {
        BindTarget::Node(id) => {
            let node = scene.node(id).ok_or(BindError::StaleTarget(target))?;
            if let Some(property) = NodeProperty::parse(key) {
                return Ok(PropertyRef::Node(id, property));
            }
            match &node.content {
                NodeContent::Light(_) => LightProperty::parse(key)
                    .map(|p| PropertyRef::Light(id, p))
                    .ok_or_else(unknown),
                NodeContent::Mesh { material, .. } => MaterialProperty::parse(key)
                    .map(|p| PropertyRef::Material(*material, p))
                    .ok_or_else(unknown),
                NodeContent::Group | NodeContent::LightHelper { .. } | NodeContent::Axes { .. } => {
                    Err(unknown())
                }
            }
        }
        BindTarget::Material(id) => {
            scene.material(id).ok_or(BindError::StaleTarget(target))?;
            MaterialProperty::parse(key)
                .map(|p| PropertyRef::Material(id, p))
                .ok_or_else(unknown)
        }
        BindTarget::Tweaks => scene
            .tweak(key)
            .map(|_| PropertyRef::Tweak(key.to_string()))
            .ok_or_else(unknown),
    }
}

/// Clamps and snaps numbers, validates choices
fn coerce(param: &BoundParameter, value: Value) -> Result<Value, BindError> {
    if !param.kind.accepts(value.kind()) {
        return Err(BindError::KindMismatch {
            key: param.label.clone(),
            control: param.kind.name(),
            value: value.kind(),
        });
    }

    match (&param.kind, value) {
        (ParamKind::Number { min, max, step }, Value::Float(mut v)) => {
            if let Some(step) = step {
                let origin = min.unwrap_or(0.0);
                v = origin + ((v - origin) / step).round() * step;
            }
            if let Some(min) = min {
                v = v.max(*min);
            }
            if let Some(max) = max {
                v = v.min(*max);
            }
            Ok(Value::Float(v))
        }
        (ParamKind::Choice(choices), Value::Text(text)) => {
            if choices.contains(&text) {
                Ok(Value::Text(text))
            } else {
                Err(BindError::InvalidChoice {
                    param: param.id,
                    value: text,
                })
            }
        }
        (_, value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::{Color, Geometry, Light, Material, SceneNode};
    use std::{cell::RefCell, rc::Rc};

    struct Fixture {
        scene: Scene,
        cube: NodeId,
        material: MaterialId,
        panel: ParameterPanel,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::basic("m", Color::from_hex(0xff0000)));
        let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), material));
        Fixture {
            scene,
            cube,
            material,
            panel: ParameterPanel::new("Debug"),
        }
    }

    #[test]
    fn live_range_writes_every_value_clamped_and_snapped() {
        let mut f = fixture();
        let elevation = f
            .panel
            .bind(
                &f.scene,
                BindTarget::Node(f.cube),
                "position.y",
                ParamOptions::new().range(-3.0, 3.0).step(0.01).name("Elevation"),
            )
            .unwrap();

        f.panel.input(&mut f.scene, elevation, Value::Float(1.234)).unwrap();
        let y = f.scene.node(f.cube).unwrap().transform.position.y;
        assert!((y - 1.23).abs() < 1e-4);

        f.panel.input(&mut f.scene, elevation, Value::Float(10.0)).unwrap();
        assert_eq!(f.scene.node(f.cube).unwrap().transform.position.y, 3.0);
        assert_eq!(f.panel.find("Elevation"), Some(elevation));
    }

    #[test]
    fn external_mutation_shows_after_refresh() {
        let mut f = fixture();
        let visible = f
            .panel
            .bind(&f.scene, BindTarget::Node(f.cube), "visible", ParamOptions::new())
            .unwrap();

        f.scene.node_mut(f.cube).unwrap().visible = false;
        assert_eq!(f.panel.value(visible), Some(&Value::Bool(true)));
        f.panel.refresh(&f.scene);
        assert_eq!(f.panel.value(visible), Some(&Value::Bool(false)));
    }

    #[test]
    fn commit_only_rebuilds_once() {
        let mut f = fixture();
        f.scene.set_tweak("subdivision", Value::Float(2.0));
        let cube = f.cube;
        let subdivision = f
            .panel
            .bind(
                &f.scene,
                BindTarget::Tweaks,
                "subdivision",
                ParamOptions::new()
                    .range(1.0, 20.0)
                    .step(1.0)
                    .commit_only()
                    .on_commit(move |scene, value| {
                        let segments = value.as_f32().unwrap_or(1.0) as u32;
                        scene.set_geometry(cube, Geometry::cube(segments));
                    }),
            )
            .unwrap();

        for i in 0..50 {
            let value = 1.0 + (i as f32 * 0.37) % 19.0;
            f.panel.input(&mut f.scene, subdivision, Value::Float(value)).unwrap();
        }
        assert_eq!(f.scene.geometry_rebuilds(), 0);
        assert_eq!(f.scene.tweak("subdivision"), Some(&Value::Float(2.0)));

        f.panel.commit(&mut f.scene, subdivision).unwrap();
        assert_eq!(f.scene.geometry_rebuilds(), 1);

        // Nothing pending: a second commit does nothing
        f.panel.commit(&mut f.scene, subdivision).unwrap();
        assert_eq!(f.scene.geometry_rebuilds(), 1);
    }

    #[test]
    fn commit_only_text_rebuilds_the_mesh_once() {
        use crate::gfx::resources::{font::tests::TINY_TYPEFACE, FontData, TextOptions};
        use std::sync::Arc;

        let mut f = fixture();
        let font = Arc::new(FontData::from_typeface_json(TINY_TYPEFACE).unwrap());
        let text = f.scene.add(SceneNode::mesh(
            "text",
            font.text_geometry("Hi", TextOptions::default()),
            f.material,
        ));
        f.scene.set_tweak("message", Value::Text("Hi".into()));

        let message = f
            .panel
            .bind(
                &f.scene,
                BindTarget::Tweaks,
                "message",
                ParamOptions::new().commit_only().on_commit(move |scene, value| {
                    if let Some(message) = value.as_text() {
                        scene.set_geometry(text, font.text_geometry(message, TextOptions::default()));
                    }
                }),
            )
            .unwrap();

        for typed in ["H", "Hi ", "Hi H", "Hi Hi"] {
            f.panel.input(&mut f.scene, message, Value::Text(typed.into())).unwrap();
        }
        assert_eq!(f.scene.geometry_rebuilds(), 0);

        f.panel.commit(&mut f.scene, message).unwrap();
        assert_eq!(f.scene.geometry_rebuilds(), 1);
        assert_eq!(f.scene.tweak("message"), Some(&Value::Text("Hi Hi".into())));
        match f.scene.node(text).and_then(|node| node.geometry()) {
            Some(Geometry::Text { text, outline_segments, .. }) => {
                assert_eq!(text, "Hi Hi");
                assert_eq!(*outline_segments, 2 * (4 + 4));
            }
            other => panic!("expected text geometry, got {other:?}"),
        }
    }

    #[test]
    fn pending_value_survives_refresh() {
        let mut f = fixture();
        f.scene.set_tweak("subdivision", Value::Float(2.0));
        let id = f
            .panel
            .bind(&f.scene, BindTarget::Tweaks, "subdivision", ParamOptions::new().commit_only())
            .unwrap();

        f.panel.input(&mut f.scene, id, Value::Float(7.0)).unwrap();
        f.panel.refresh(&f.scene);
        assert_eq!(f.panel.value(id), Some(&Value::Float(7.0)));
    }

    #[test]
    fn mesh_keys_reach_the_material() {
        let mut f = fixture();
        let wireframe = f
            .panel
            .bind(&f.scene, BindTarget::Node(f.cube), "wireframe", ParamOptions::new())
            .unwrap();
        f.panel.input(&mut f.scene, wireframe, Value::Bool(true)).unwrap();
        assert!(f.scene.material(f.material).unwrap().wireframe);
    }

    #[test]
    fn color_tweak_forwards_through_on_change() {
        let mut f = fixture();
        f.scene.set_tweak("color", Value::Color(Color::from_hex(0xa778d8)));
        let material = f.material;
        let color = f
            .panel
            .bind(
                &f.scene,
                BindTarget::Tweaks,
                "color",
                ParamOptions::new().on_change(move |scene, value| {
                    if let (Some(material), Some(color)) = (scene.material_mut(material), value.as_color()) {
                        material.color = color;
                    }
                }),
            )
            .unwrap();

        let green = Color::from_hex(0x00ff00);
        f.panel.input(&mut f.scene, color, Value::Color(green)).unwrap();
        assert_eq!(f.scene.material(f.material).unwrap().color, green);
    }

    #[test]
    fn actions_are_reinvocable() {
        let mut f = fixture();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        let spin = f.panel.bind_action("spin", None, move |_| *counter.borrow_mut() += 1);

        f.panel.invoke(&mut f.scene, spin).unwrap();
        f.panel.invoke(&mut f.scene, spin).unwrap();
        assert_eq!(*count.borrow(), 2);
        assert!(matches!(
            f.panel.input(&mut f.scene, spin, Value::Bool(true)),
            Err(BindError::IsAction(_))
        ));
    }

    #[test]
    fn bind_rejects_unknown_keys_and_mismatched_controls() {
        let mut f = fixture();
        assert!(matches!(
            f.panel.bind(&f.scene, BindTarget::Node(f.cube), "intensity", ParamOptions::new()),
            Err(BindError::UnknownKey { .. })
        ));
        assert!(matches!(
            f.panel.bind(&f.scene, BindTarget::Tweaks, "missing", ParamOptions::new()),
            Err(BindError::UnknownKey { .. })
        ));
        assert!(matches!(
            f.panel.bind(
                &f.scene,
                BindTarget::Node(f.cube),
                "visible",
                ParamOptions::new().choices(&["a", "b"])
            ),
            Err(BindError::KindMismatch { .. })
        ));
    }

    #[test]
    fn light_keys_resolve_on_light_nodes() {
        let mut f = fixture();
        let light = f.scene.add(SceneNode::light("ambient", Light::ambient(Color::WHITE, 0.5)));
        let intensity = f
            .panel
            .bind(&f.scene, BindTarget::Node(light), "intensity", ParamOptions::new().range(0.0, 3.0))
            .unwrap();
        f.panel.input(&mut f.scene, intensity, Value::Float(2.0)).unwrap();
        assert_eq!(f.scene.node(light).unwrap().light_ref().unwrap().intensity, 2.0);
    }

    #[test]
    fn choices_are_validated() {
        let mut f = fixture();
        f.scene.set_tweak("mode", Value::Text("basic".into()));
        let mode = f
            .panel
            .bind(&f.scene, BindTarget::Tweaks, "mode", ParamOptions::new().choices(&["basic", "matcap"]))
            .unwrap();
        assert!(f.panel.input(&mut f.scene, mode, Value::Text("matcap".into())).is_ok());
        assert!(matches!(
            f.panel.input(&mut f.scene, mode, Value::Text("toon".into())),
            Err(BindError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn detached_target_reads_as_gone() {
        let mut f = fixture();
        let y = f
            .panel
            .bind(&f.scene, BindTarget::Node(f.cube), "position.y", ParamOptions::new())
            .unwrap();
        f.scene.detach(f.cube);
        f.panel.refresh(&f.scene);
        assert_eq!(f.panel.value(y), None);
        assert!(matches!(
            f.panel.input(&mut f.scene, y, Value::Float(1.0)),
            Err(BindError::Write(PropertyError::Stale(_)))
        ));
    }

    #[test]
    fn apply_skips_rejected_interactions() {
        let mut f = fixture();
        let y = f
            .panel
            .bind(&f.scene, BindTarget::Node(f.cube), "position.y", ParamOptions::new())
            .unwrap();
        let applied = f.panel.apply(
            &mut f.scene,
            vec![
                Interaction::Input(y, Value::Float(2.0)),
                Interaction::Invoke(y),
                Interaction::Commit(y),
            ],
        );
        assert_eq!(applied, 2);
        assert_eq!(f.scene.node(f.cube).unwrap().transform.position.y, 2.0);
    }

    #[test]
    fn visibility_is_only_a_flag() {
        let mut f = fixture();
        f.panel
            .bind(&f.scene, BindTarget::Node(f.cube), "visible", ParamOptions::new())
            .unwrap();
        assert!(!f.panel.toggle_visibility());
        assert_eq!(f.panel.len(), 1);
        assert!(f.panel.toggle_visibility());
    }
}
