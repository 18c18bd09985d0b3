//! Fire-and-forget property tweens
//!
//! A tween interpolates one scene property toward a value over a duration,
//! optionally after a delay. Tweens are stored on the [`Scene`] so that panel
//! actions, which only see the scene, can start them. [`TweenHook`] advances
//! them once per frame from the frame clock.

use std::time::Duration;

use crate::gfx::{camera::CameraManager, scene::{PropertyRef, Scene, Value}};
use crate::runtime::{FrameContext, FrameHook};

/// Easing curve applied to normalised time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ease {
    Linear,
    /// Quadratic ease-out
    #[default]
    Power1Out,
    /// Cubic ease-in-out
    Power2InOut,
}

impl Ease {
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
            Ease::Power2InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenOptions {
    pub duration: Duration,
    pub delay: Duration,
    pub ease: Ease,
}

/// Seconds as a duration; NaN, infinite and negative inputs count as zero,
/// values beyond `Duration::MAX` saturate
fn seconds(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

impl TweenOptions {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration: seconds(duration_secs),
            delay: Duration::ZERO,
            ease: Ease::default(),
        }
    }

    pub fn with_delay(mut self, delay_secs: f32) -> Self {
        self.delay = seconds(delay_secs);
        self
    }

    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }
}

impl Default for TweenOptions {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Goal {
    To(Value),
    By(f32),
}

#[derive(Debug, Clone)]
struct Tween {
    target: PropertyRef,
    goal: Goal,
    options: TweenOptions,
    created: Option<Duration>,
    from: Option<Value>,
    to: Option<Value>,
}

/// The set of running tweens
#[derive(Debug, Default)]
pub struct TweenSet {
    tweens: Vec<Tween>,
}

impl TweenSet {
    /// Tweens `target` to an absolute value
    ///
    /// Only number and color values can be interpolated; anything else is
    /// refused. A new tween on a property replaces the one already running.
    pub fn to(&mut self, target: PropertyRef, value: Value, options: TweenOptions) -> bool {
        if !matches!(value, Value::Float(_) | Value::Color(_)) {
            log::warn!("cannot tween {target} to a {} value", value.kind());
            return false;
        }
        self.push(target, Goal::To(value), options);
        true
    }

    /// Tweens a numeric `target` by `delta`, relative to its value when the tween starts
    pub fn by(&mut self, target: PropertyRef, delta: f32, options: TweenOptions) {
        self.push(target, Goal::By(delta), options);
    }

    fn push(&mut self, target: PropertyRef, goal: Goal, options: TweenOptions) {
        self.tweens.retain(|t| t.target != target);
        self.tweens.push(Tween {
            target,
            goal,
            options,
            created: None,
            from: None,
            to: None,
        });
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// Whether a tween on `target` is pending or running
    pub fn is_animating(&self, target: &PropertyRef) -> bool {
        self.tweens.iter().any(|t| &t.target == target)
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    /// Writes every tween's value at time `now`; returns how many remain
    ///
    /// Time starts counting at the first advance after a tween was created.
    /// Tweens whose property disappeared are dropped.
    pub fn advance(&mut self, now: Duration, scene: &mut Scene) -> usize {
        self.tweens.retain_mut(|tween| {
            let created = *tween.created.get_or_insert(now);
            let begin = created.saturating_add(tween.options.delay);
            if now < begin {
                return true;
            }

            if tween.from.is_none() {
                let Some(current) = scene.get(&tween.target) else {
                    log::debug!("dropping tween on vanished {}", tween.target);
                    return false;
                };
                let to = match (&tween.goal, &current) {
                    (Goal::To(value), _) => value.clone(),
                    (Goal::By(delta), Value::Float(v)) => Value::Float(v + delta),
                    (Goal::By(_), other) => {
                        log::warn!("cannot tween {} by a number, it holds a {}", tween.target, other.kind());
                        return false;
                    }
                };
                tween.from = Some(current);
                tween.to = Some(to);
            }

            let progress = if tween.options.duration.is_zero() {
                1.0
            } else {
                (now - begin).as_secs_f32() / tween.options.duration.as_secs_f32()
            };
            let eased = tween.options.ease.apply(progress);

            let (Some(from), Some(to)) = (&tween.from, &tween.to) else {
                return false;
            };
            let value = match (from, to) {
                (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * eased),
                (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(*b, eased)),
                _ => to.clone(),
            };
            if let Err(error) = scene.set(&tween.target, value) {
                log::warn!("tween stopped: {error}");
                return false;
            }
            progress < 1.0
        });
        self.tweens.len()
    }
}

/// Frame hook that advances the scene's tweens
pub struct TweenHook;

impl FrameHook for TweenHook {
    fn name(&self) -> &str {
        "tweens"
    }

    fn run(
        &mut self,
        frame: &FrameContext,
        scene: &mut Scene,
        _camera: &mut CameraManager,
    ) -> anyhow::Result<()> {
        scene.advance_tweens(frame.elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::{Axis, Color, Geometry, Material, NodeProperty, SceneNode};
    use std::f32::consts::TAU;

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    fn cube_scene() -> (Scene, PropertyRef) {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::basic("m", Color::WHITE));
        let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), material));
        (scene, PropertyRef::Node(cube, NodeProperty::Position(Axis::X)))
    }

    #[test]
    fn delayed_slide_waits_then_arrives() {
        let (mut scene, x) = cube_scene();
        scene
            .tweens
            .to(x.clone(), Value::Float(2.0), TweenOptions::new(1.0).with_delay(1.0));

        scene.advance_tweens(secs(10.0));
        scene.advance_tweens(secs(10.5));
        assert_eq!(scene.get(&x), Some(Value::Float(0.0)));

        scene.advance_tweens(secs(11.5));
        let mid = scene.get(&x).and_then(|v| v.as_f32()).unwrap();
        assert!(mid > 0.0 && mid < 2.0);

        assert_eq!(scene.advance_tweens(secs(12.0)), 0);
        assert_eq!(scene.get(&x), Some(Value::Float(2.0)));
    }

    #[test]
    fn spin_is_relative_to_start_value() {
        let (mut scene, _) = cube_scene();
        let cube = scene.roots()[0];
        let rotation = PropertyRef::Node(cube, NodeProperty::Rotation(Axis::Y));
        scene.set(&rotation, Value::Float(1.0)).unwrap();

        scene.tweens.by(rotation.clone(), TAU, TweenOptions::new(1.0));
        scene.advance_tweens(secs(0.0));
        scene.advance_tweens(secs(1.0));

        let end = scene.get(&rotation).and_then(|v| v.as_f32()).unwrap();
        assert!((end - (1.0 + TAU)).abs() < 1e-5);
    }

    #[test]
    fn new_tween_supersedes_old_one() {
        let (mut scene, x) = cube_scene();
        scene.tweens.to(x.clone(), Value::Float(5.0), TweenOptions::new(1.0));
        scene.tweens.to(x.clone(), Value::Float(-5.0), TweenOptions::new(0.0));
        assert_eq!(scene.tweens.len(), 1);

        scene.advance_tweens(secs(0.0));
        assert_eq!(scene.get(&x), Some(Value::Float(-5.0)));
    }

    #[test]
    fn tween_on_detached_node_is_dropped() {
        let (mut scene, x) = cube_scene();
        scene.tweens.to(x, Value::Float(1.0), TweenOptions::new(1.0));
        let cube = scene.roots()[0];
        scene.detach(cube);
        assert_eq!(scene.advance_tweens(secs(0.0)), 0);
    }

    #[test]
    fn booleans_are_not_tweenable() {
        let (mut scene, _) = cube_scene();
        let cube = scene.roots()[0];
        let visible = PropertyRef::Node(cube, NodeProperty::Visible);
        assert!(!scene.tweens.to(visible, Value::Bool(false), TweenOptions::default()));
    }

    #[test]
    fn unusable_durations_finish_immediately() {
        for secs in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -1.0] {
            let options = TweenOptions::new(secs).with_delay(secs);
            assert_eq!(options.duration, Duration::ZERO);
            assert_eq!(options.delay, Duration::ZERO);
        }

        let (mut scene, x) = cube_scene();
        scene.tweens.to(x.clone(), Value::Float(3.0), TweenOptions::new(f32::INFINITY));
        assert_eq!(scene.advance_tweens(secs(0.0)), 0);
        assert_eq!(scene.get(&x), Some(Value::Float(3.0)));
    }

    #[test]
    fn huge_delay_saturates() {
        let (mut scene, x) = cube_scene();
        scene
            .tweens
            .to(x.clone(), Value::Float(3.0), TweenOptions::new(1.0).with_delay(f32::MAX));
        assert_eq!(scene.advance_tweens(secs(1.0)), 1);
        assert_eq!(scene.get(&x), Some(Value::Float(0.0)));
    }

    #[test]
    fn easing_endpoints() {
        for ease in [Ease::Linear, Ease::Power1Out, Ease::Power2InOut] {
            assert_eq!(ease.apply(0.0), 0.0);
            assert_eq!(ease.apply(1.0), 1.0);
        }
    }
}
