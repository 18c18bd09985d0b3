use std::time::Duration;

use crate::gfx::viewport::Viewport;

/// Per-frame snapshot handed to every frame hook
///
/// Built once at the start of a frame from a clock sample and the current
/// viewport; hooks only ever see it by shared reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Time since the scheduler's clock started
    pub elapsed: Duration,
    /// Time since the previous frame (zero on the first frame)
    pub delta: Duration,
    pub viewport: Viewport,
    /// Frame counter, starting at 1
    pub frame: u64,
}

impl FrameContext {
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}
