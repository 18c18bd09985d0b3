//! Monotonic time sources for the frame scheduler
//!
//! The scheduler samples its clock exactly once per frame. Production code uses
//! [`SystemClock`]; tests drive frames deterministically with [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of elapsed time since the clock was created
pub trait Clock {
    /// Time elapsed since the clock started. Must never go backwards.
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time backed by [`Instant`]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Hand-advanced clock for deterministic frame stepping
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the scheduler.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `step`
    pub fn advance(&self, step: Duration) {
        self.now.set(self.now.get() + step);
    }

    /// Moves time forward by `seconds`
    pub fn advance_secs(&self, seconds: f32) {
        self.advance(Duration::from_secs_f32(seconds));
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }
}
