//! # Runtime Module
//!
//! The frame-driving core of Vista: a clock, the per-frame context, the
//! scheduler that runs hooks and issues render calls, and the error taxonomy
//! shared by every component.
//!
//! ## Frame anatomy
//!
//! 1. The clock is sampled once, producing a [`FrameContext`]
//! 2. Each [`FrameHook`] runs in registration order
//! 3. Exactly one render call is issued
//!
//! A failing hook aborts steps 2 and 3 for that frame only.
//!
//! ```no_run
//! use vista::runtime::{hook_fn, FrameScheduler, SystemClock};
//!
//! let mut scheduler = FrameScheduler::new(SystemClock::new());
//! scheduler.start([hook_fn("spin", |frame, scene, _camera| {
//!     let _ = (frame.elapsed_secs(), scene);
//!     Ok(())
//! })]);
//! ```

pub mod clock;
pub mod error;
pub mod frame;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{log_sink, ErrorSink, RuntimeError};
pub use frame::FrameContext;
pub use scheduler::{hook_fn, FnHook, FrameHook, FrameOutcome, FrameScheduler, HookId, HookQueue};
