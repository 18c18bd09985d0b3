pub mod camera_utils;
pub mod orbit_controller;
pub mod perspective;

// Re-export main types
pub use camera_utils::{CameraManager, OrbitControlsHook, PointerInput};
pub use orbit_controller::{OrbitBounds, OrbitController, OrbitState, PointerButton, PointerEvent};
pub use perspective::PerspectiveCamera;
