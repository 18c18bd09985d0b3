use crate::runtime::{FrameContext, FrameHook};
use crate::gfx::scene::Scene;

use super::{
    orbit_controller::{OrbitController, PointerEvent},
    perspective::PerspectiveCamera,
};

/// Pointer input routed to the camera controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down(PointerEvent),
    Move(PointerEvent),
    Up(PointerEvent),
    /// Wheel lines, positive away from the user
    Wheel(f32),
}

/// Camera plus the controls that drive it
pub struct CameraManager {
    pub camera: PerspectiveCamera,
    pub controller: OrbitController,
}

impl CameraManager {
    /// Pairs a camera with its controller and places the camera once
    pub fn new(camera: PerspectiveCamera, controller: OrbitController) -> Self {
        let mut manager = Self { camera, controller };
        manager.controller.apply(&mut manager.camera);
        manager
    }

    pub fn process_pointer(&mut self, input: PointerInput) {
        match input {
            PointerInput::Down(event) => self.controller.on_pointer_down(event),
            PointerInput::Move(event) => self.controller.on_pointer_move(event),
            PointerInput::Up(event) => self.controller.on_pointer_up(event),
            PointerInput::Wheel(lines) => self.controller.on_wheel(lines),
        }
    }

    /// Steps the damped controls and re-places the camera if they moved
    pub fn update(&mut self, dt: f32) -> bool {
        let moved = self.controller.update(dt);
        if moved {
            self.controller.apply(&mut self.camera);
        }
        moved
    }

    /// Get the view projection matrix from the camera
    pub fn get_view_proj_matrix(&self) -> cgmath::Matrix4<f32> {
        self.camera.build_view_projection_matrix()
    }
}

impl Default for CameraManager {
    fn default() -> Self {
        let controller = OrbitController::default();
        Self::new(PerspectiveCamera::default(), controller)
    }
}

/// Frame hook that advances the orbit controls once per frame
pub struct OrbitControlsHook;

impl FrameHook for OrbitControlsHook {
    fn name(&self) -> &str {
        "orbit-controls"
    }

    fn run(
        &mut self,
        frame: &FrameContext,
        _scene: &mut Scene,
        camera: &mut CameraManager,
    ) -> anyhow::Result<()> {
        camera.update(frame.delta_secs());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::orbit_controller::PointerButton;

    #[test]
    fn new_places_camera_from_controller() {
        let manager = CameraManager::default();
        let expected = manager.controller.state().eye();
        assert_eq!(manager.camera.eye(), expected);
    }

    #[test]
    fn pointer_drag_moves_camera_on_update() {
        let mut manager = CameraManager::default();
        manager.controller.damping = 1.0;
        let before = manager.camera.eye();

        manager.process_pointer(PointerInput::Down(PointerEvent::new(10.0, 10.0, PointerButton::Primary)));
        manager.process_pointer(PointerInput::Move(PointerEvent::new(60.0, 10.0, PointerButton::Primary)));
        manager.process_pointer(PointerInput::Up(PointerEvent::new(60.0, 10.0, PointerButton::Primary)));

        assert!(manager.update(1.0 / 60.0));
        assert_ne!(manager.camera.eye(), before);
    }
}
