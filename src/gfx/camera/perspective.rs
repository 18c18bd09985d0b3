use cgmath::*;

use crate::gfx::viewport::Viewport;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Perspective camera with a cached projection matrix
///
/// The aspect ratio has no public setter: it is derived from the viewport by
/// [`ViewportManager`](crate::gfx::viewport::ViewportManager), which keeps the
/// projection and the framebuffer in sync.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub up: Vector3<f32>,
    aspect: f32,
    eye: Point3<f32>,
    target: Point3<f32>,
    projection: Matrix4<f32>,
    projection_updates: u64,
}

impl PerspectiveCamera {
    /// Camera whose aspect ratio matches `viewport`
    ///
    /// A zero-area viewport yields a square aspect until the first resize.
    pub fn for_viewport(fovy_degrees: f32, viewport: &Viewport, znear: f32, zfar: f32) -> Self {
        let aspect = if viewport.width == 0 || viewport.height == 0 {
            1.0
        } else {
            viewport.aspect()
        };
        Self::new(fovy_degrees, aspect, znear, zfar)
    }

    pub(crate) fn new(fovy_degrees: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        let mut camera = Self {
            fovy: Deg(fovy_degrees),
            znear,
            zfar,
            up: Vector3::unit_y(),
            aspect,
            eye: Point3::new(0.0, 0.0, 3.0),
            target: Point3::origin(),
            projection: Matrix4::identity(),
            projection_updates: 0,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Only the viewport manager calls this, always followed by a projection update.
    pub(crate) fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Recomputes the projection matrix from fov, aspect and clip planes
    ///
    /// Call after changing `fovy`, `znear` or `zfar`.
    pub fn update_projection_matrix(&mut self) {
        self.projection = perspective(self.fovy, self.aspect, self.znear, self.zfar);
        self.projection_updates += 1;
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    /// How many times the projection has been recomputed
    pub fn projection_updates(&self) -> u64 {
        self.projection_updates
    }

    pub fn eye(&self) -> Point3<f32> {
        self.eye
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    /// Places the camera at `eye` and points it at `target`
    pub fn look_at(&mut self, eye: Point3<f32>, target: Point3<f32>) {
        self.eye = eye;
        self.target = target;
    }

    /// Unit vector from the eye toward the target
    pub fn forward(&self) -> Vector3<f32> {
        let direction = self.target - self.eye;
        if direction.magnitude2() > f32::EPSILON {
            direction.normalize()
        } else {
            -Vector3::unit_z()
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection * view, corrected for wgpu's 0..1 depth range
    pub fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection * self.view_matrix()
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(75.0, 1.0, 0.1, 100.0)
    }
}
