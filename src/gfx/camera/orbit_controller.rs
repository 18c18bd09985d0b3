use std::f32::consts::PI;

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use super::perspective::PerspectiveCamera;

/// Below this distance the committed state snaps onto the goal and comes to rest.
const REST_EPSILON: f32 = 1e-5;

/// Spherical camera placement around a target point
///
/// `polar` is measured from the +Y axis, `azimuth` around it starting at +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    pub azimuth: f32,
    pub polar: f32,
    pub radius: f32,
    pub target: Vector3<f32>,
}

impl OrbitState {
    pub fn new(azimuth: f32, polar: f32, radius: f32, target: Vector3<f32>) -> Self {
        Self {
            azimuth,
            polar,
            radius,
            target,
        }
    }

    /// Recovers the spherical placement of `eye` around `target`
    pub fn from_eye(eye: Point3<f32>, target: Point3<f32>) -> Self {
        let offset = eye - target;
        let radius = offset.magnitude();
        let (azimuth, polar) = if radius > f32::EPSILON {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };
        Self::new(azimuth, polar, radius, target.to_vec())
    }

    /// Cartesian eye position for this placement
    pub fn eye(&self) -> Point3<f32> {
        let sin_polar = self.polar.sin();
        Point3::from_vec(
            Vector3::new(
                self.radius * sin_polar * self.azimuth.sin(),
                self.radius * self.polar.cos(),
                self.radius * sin_polar * self.azimuth.cos(),
            ) + self.target,
        )
    }

    /// Combined remaining distance between two placements
    pub fn distance_to(&self, other: &OrbitState) -> f32 {
        let da = other.azimuth - self.azimuth;
        let dp = other.polar - self.polar;
        let dr = other.radius - self.radius;
        (da * da + dp * dp + dr * dr + (other.target - self.target).magnitude2()).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrbitBounds {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Keeps the polar angle inside `[polar_epsilon, PI - polar_epsilon]`
    pub polar_epsilon: f32,
}

impl OrbitBounds {
    /// Ordered, finite-safe copy of these bounds
    ///
    /// Swapped radii are put back in order, a NaN falls back to the default and
    /// `polar_epsilon` is kept within `[0, PI / 2]` so the polar range never inverts.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let or_default = |value: f32, fallback: f32| if value.is_nan() { fallback } else { value };

        let a = or_default(self.min_radius, defaults.min_radius).max(0.0);
        let b = or_default(self.max_radius, defaults.max_radius).max(0.0);
        let (min_radius, max_radius) = if a <= b { (a, b) } else { (b, a) };

        Self {
            min_radius,
            max_radius,
            polar_epsilon: or_default(self.polar_epsilon, defaults.polar_epsilon).clamp(0.0, PI / 2.0),
        }
    }

    fn clamp_polar(&self, polar: f32) -> f32 {
        let bounds = self.normalized();
        polar.clamp(bounds.polar_epsilon, PI - bounds.polar_epsilon)
    }

    fn clamp_radius(&self, radius: f32) -> f32 {
        let bounds = self.normalized();
        radius.clamp(bounds.min_radius, bounds.max_radius)
    }

    fn clamp(&self, state: &mut OrbitState) {
        state.polar = self.clamp_polar(state.polar);
        state.radius = self.clamp_radius(state.radius);
    }
}

impl Default for OrbitBounds {
    fn default() -> Self {
        Self {
            min_radius: 0.5,
            max_radius: 100.0,
            polar_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Pointer position in physical pixels plus the button involved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    pub button: PointerButton,
}

impl PointerEvent {
    pub fn new(x: f32, y: f32, button: PointerButton) -> Self {
        Self { x, y, button }
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    button: PointerButton,
    last: [f32; 2],
}

/// Damped orbit controls
///
/// Input accumulates into a goal state; every [`update`](Self::update) moves the
/// committed state a fraction `damping` of the remaining way toward the goal,
/// so motion eases out after the pointer is released.
///
/// - `damping == 0.0` freezes the camera
/// - `damping == 1.0` follows input instantly
pub struct OrbitController {
    committed: OrbitState,
    goal: OrbitState,
    initial: OrbitState,
    pub damping: f32,
    /// Radians per pixel of drag
    pub rotate_speed: f32,
    /// Radius scale per wheel line, as `1 + zoom_speed`
    pub zoom_speed: f32,
    /// Target travel per pixel of drag, relative to the radius
    pub pan_speed: f32,
    /// Radians per second added to the azimuth while idle
    pub auto_rotate: Option<f32>,
    pub enabled: bool,
    pub bounds: OrbitBounds,
    drag: Option<Drag>,
}

impl OrbitController {
    pub fn new(initial: OrbitState, damping: f32) -> Self {
        let bounds = OrbitBounds::default();
        let mut state = initial;
        bounds.clamp(&mut state);

        Self {
            committed: state,
            goal: state,
            initial: state,
            damping: damping.clamp(0.0, 1.0),
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            pan_speed: 0.002,
            auto_rotate: None,
            enabled: true,
            bounds,
            drag: None,
        }
    }

    /// Builds a controller that starts where `camera` currently is
    pub fn from_camera(camera: &PerspectiveCamera, damping: f32) -> Self {
        Self::new(OrbitState::from_eye(camera.eye(), camera.target()), damping)
    }

    /// Replaces the bounds and re-clamps every state
    ///
    /// Inverted or out-of-range bounds are stored in their [`normalized`](OrbitBounds::normalized) form.
    pub fn set_bounds(&mut self, bounds: OrbitBounds) {
        self.bounds = bounds.normalized();
        self.bounds.clamp(&mut self.committed);
        self.bounds.clamp(&mut self.goal);
        self.bounds.clamp(&mut self.initial);
    }

    /// Placement the camera currently shows
    pub fn state(&self) -> &OrbitState {
        &self.committed
    }

    /// Placement the damped motion is heading toward
    pub fn goal(&self) -> &OrbitState {
        &self.goal
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn on_pointer_down(&mut self, event: PointerEvent) {
        if !self.enabled {
            return;
        }
        self.drag = Some(Drag {
            button: event.button,
            last: [event.x, event.y],
        });
    }

    pub fn on_pointer_move(&mut self, event: PointerEvent) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };

        let dx = event.x - drag.last[0];
        let dy = event.y - drag.last[1];
        drag.last = [event.x, event.y];
        let button = drag.button;

        match button {
            // Dragging right swings the camera left around the target
            PointerButton::Primary => {
                self.rotate(-dx * self.rotate_speed, -dy * self.rotate_speed)
            }
            PointerButton::Secondary | PointerButton::Middle => self.pan(dx, dy),
        }
    }

    pub fn on_pointer_up(&mut self, _event: PointerEvent) {
        self.drag = None;
    }

    /// Wheel or pinch input; positive `lines` zooms in
    pub fn on_wheel(&mut self, lines: f32) {
        if !self.enabled {
            return;
        }
        let scale = (1.0 + self.zoom_speed).powf(-lines);
        self.goal.radius = self.bounds.clamp_radius(self.goal.radius * scale);
    }

    /// Adds an angular change to the goal
    pub fn rotate(&mut self, delta_azimuth: f32, delta_polar: f32) {
        if !self.enabled {
            return;
        }
        self.goal.azimuth += delta_azimuth;
        self.goal.polar = self.bounds.clamp_polar(self.goal.polar + delta_polar);
    }

    /// Moves the goal target in the view plane by a pixel delta
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }

        // Camera-local basis from the committed placement
        let forward = (self.committed.target - self.committed.eye().to_vec()).normalize();
        let right = forward.cross(Vector3::unit_y());
        let right = if right.magnitude2() > f32::EPSILON {
            right.normalize()
        } else {
            Vector3::unit_x()
        };
        let up = right.cross(forward).normalize();

        let scale = self.committed.radius * self.pan_speed;
        self.goal.target += (-right * dx + up * dy) * scale;
    }

    /// Sets the goal directly; the committed state eases toward it
    pub fn set_goal(&mut self, goal: OrbitState) {
        self.goal = goal;
        self.bounds.clamp(&mut self.goal);
    }

    /// Jumps back to the initial placement without easing
    pub fn reset(&mut self) {
        self.committed = self.initial;
        self.goal = self.initial;
        self.drag = None;
    }

    /// Advances the damped motion by one step
    ///
    /// Returns true if the committed placement changed.
    pub fn update(&mut self, dt: f32) -> bool {
        if let (Some(speed), true, None) = (self.auto_rotate, self.enabled, self.drag) {
            self.goal.azimuth += speed * dt;
        }

        if self.damping <= 0.0 {
            return false;
        }

        let before = self.committed;
        let fraction = self.damping.min(1.0);
        let committed = &mut self.committed;
        committed.azimuth += (self.goal.azimuth - committed.azimuth) * fraction;
        committed.polar += (self.goal.polar - committed.polar) * fraction;
        committed.radius += (self.goal.radius - committed.radius) * fraction;
        committed.target += (self.goal.target - committed.target) * fraction;

        if committed.distance_to(&self.goal) < REST_EPSILON {
            *committed = self.goal;
        }

        // Clamp the committed value itself so easing can never enter the pole region
        self.bounds.clamp(committed);

        *committed != before
    }

    /// Places `camera` according to the committed state
    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.look_at(self.committed.eye(), Point3::from_vec(self.committed.target));
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(
            OrbitState::from_eye(Point3::new(1.0, 1.0, 2.0), Point3::origin()),
            0.05,
        )
    }
}

impl std::fmt::Debug for OrbitController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrbitController")
            .field("committed", &self.committed)
            .field("goal", &self.goal)
            .field("damping", &self.damping)
            .field("enabled", &self.enabled)
            .finish()
    }
}
