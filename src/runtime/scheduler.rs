//! The render loop scheduler
//!
//! [`FrameScheduler`] replaces a self-rescheduling `tick` closure with an object
//! that has an explicit lifecycle. The platform (or a test) calls
//! [`FrameScheduler::tick`] once per display refresh; each tick samples the
//! clock, runs the registered [`FrameHook`]s in registration order and issues
//! exactly one render call.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use anyhow::anyhow;

use crate::gfx::{
    camera::CameraManager, rendering::Renderer, scene::Scene, viewport::Viewport,
};

use super::{
    clock::Clock,
    error::{log_sink, panic_message, ErrorSink, RuntimeError},
    frame::FrameContext,
};

/// Work performed once per frame before the render call
///
/// Controller updates, tweens and demo animations are all hooks. Returning an
/// error aborts the current frame only.
pub trait FrameHook {
    /// Name used in error reports
    fn name(&self) -> &str;

    fn run(
        &mut self,
        frame: &FrameContext,
        scene: &mut Scene,
        camera: &mut CameraManager,
    ) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`FrameHook`]
pub struct FnHook<F> {
    name: String,
    run: F,
}

impl<F> FrameHook for FnHook<F>
where
    F: FnMut(&FrameContext, &mut Scene, &mut CameraManager) -> anyhow::Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &mut self,
        frame: &FrameContext,
        scene: &mut Scene,
        camera: &mut CameraManager,
    ) -> anyhow::Result<()> {
        (self.run)(frame, scene, camera)
    }
}

/// Boxes a closure as a named frame hook
pub fn hook_fn<F>(name: impl Into<String>, run: F) -> Box<dyn FrameHook>
where
    F: FnMut(&FrameContext, &mut Scene, &mut CameraManager) -> anyhow::Result<()> + 'static,
{
    Box::new(FnHook {
        name: name.into(),
        run,
    })
}

/// Identifies a registered hook for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

enum HookChange {
    Add(HookId, Box<dyn FrameHook>),
    Remove(HookId),
}

/// Cloneable handle for scheduling hook additions and removals
///
/// Changes are queued and applied at the start of the next frame, so the hook
/// list is never mutated while it is being iterated.
#[derive(Clone, Default)]
pub struct HookQueue {
    changes: Rc<RefCell<VecDeque<HookChange>>>,
    next_id: Rc<Cell<u64>>,
}

impl HookQueue {
    pub fn add(&self, hook: Box<dyn FrameHook>) -> HookId {
        let id = HookId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.changes.borrow_mut().push_back(HookChange::Add(id, hook));
        id
    }

    pub fn remove(&self, id: HookId) {
        self.changes.borrow_mut().push_back(HookChange::Remove(id));
    }

    fn take(&self) -> VecDeque<HookChange> {
        std::mem::take(&mut *self.changes.borrow_mut())
    }
}

/// What happened during a call to [`FrameScheduler::tick`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// All hooks ran and the render call succeeded
    Rendered { frame: u64 },
    /// A hook failed (`hook` is its name) or the render call failed (`hook` is `None`)
    Aborted { frame: u64, hook: Option<String> },
    /// The scheduler is stopped; nothing ran
    Stopped,
}

/// Continuous frame driver with explicit `start`/`stop`
pub struct FrameScheduler {
    clock: Box<dyn Clock>,
    hooks: Vec<(HookId, Box<dyn FrameHook>)>,
    queue: HookQueue,
    running: bool,
    last_elapsed: Option<Duration>,
    frame: u64,
    error_sink: ErrorSink,
}

impl FrameScheduler {
    /// Creates a stopped scheduler sampling `clock`
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            hooks: Vec::new(),
            queue: HookQueue::default(),
            running: false,
            last_elapsed: None,
            frame: 0,
            error_sink: log_sink(),
        }
    }

    /// Replaces the default logging sink
    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.error_sink = sink;
    }

    /// Handle for scheduling hook changes from anywhere, including other hooks
    pub fn queue(&self) -> HookQueue {
        self.queue.clone()
    }

    /// Queues a hook; it first runs in the next frame
    pub fn add_hook(&mut self, hook: Box<dyn FrameHook>) -> HookId {
        self.queue.add(hook)
    }

    /// Queues a removal; the hook last runs in the current frame
    pub fn remove_hook(&mut self, id: HookId) {
        self.queue.remove(id);
    }

    /// Begins the loop with an initial set of hooks
    ///
    /// Starting an already running scheduler only queues the extra hooks.
    pub fn start(&mut self, hooks: impl IntoIterator<Item = Box<dyn FrameHook>>) -> Vec<HookId> {
        let ids = hooks.into_iter().map(|hook| self.queue.add(hook)).collect();
        if !self.running {
            log::debug!("frame scheduler started");
            self.running = true;
            // Restart delta measurement so a pause does not show up as one huge frame
            self.last_elapsed = None;
        }
        ids
    }

    /// Cancels future frames. Calling it again has no effect.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("frame scheduler stopped after {} frames", self.frame);
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of frames started so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Names of the active hooks, in execution order
    pub fn hook_names(&self) -> Vec<String> {
        self.hooks
            .iter()
            .map(|(_, hook)| hook.name().to_string())
            .collect()
    }

    /// Runs one frame: clock sample, hooks, render
    ///
    /// # Arguments
    /// * `viewport` - Current viewport, copied into the frame context
    /// * `scene` - Scene graph mutated by hooks and then rendered
    /// * `camera` - Camera rig updated by hooks and used for the render
    /// * `renderer` - Receives exactly one render call if every hook succeeds
    pub fn tick(
        &mut self,
        viewport: Viewport,
        scene: &mut Scene,
        camera: &mut CameraManager,
        renderer: &mut dyn Renderer,
    ) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Stopped;
        }

        self.apply_hook_changes();

        let elapsed = self.clock.elapsed();
        let delta = self
            .last_elapsed
            .map(|last| elapsed.saturating_sub(last))
            .unwrap_or_default();
        self.last_elapsed = Some(elapsed);
        self.frame += 1;

        let context = FrameContext {
            elapsed,
            delta,
            viewport,
            frame: self.frame,
        };

        for (_, hook) in self.hooks.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                hook.run(&context, scene, camera)
            }));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error),
                Err(payload) => Some(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
            };

            if let Some(source) = failure {
                let hook = hook.name().to_string();
                (self.error_sink)(RuntimeError::FrameHook {
                    hook: hook.clone(),
                    frame: self.frame,
                    source,
                });
                return FrameOutcome::Aborted {
                    frame: self.frame,
                    hook: Some(hook),
                };
            }
        }

        if let Err(source) = renderer.render(scene, &camera.camera) {
            (self.error_sink)(RuntimeError::RenderFailure {
                frame: self.frame,
                source,
            });
            return FrameOutcome::Aborted {
                frame: self.frame,
                hook: None,
            };
        }

        FrameOutcome::Rendered { frame: self.frame }
    }

    fn apply_hook_changes(&mut self) {
        for change in self.queue.take() {
            match change {
                HookChange::Add(id, hook) => {
                    log::trace!("registering frame hook '{}'", hook.name());
                    self.hooks.push((id, hook));
                }
                HookChange::Remove(id) => self.hooks.retain(|(hook_id, _)| *hook_id != id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::RecordingRenderer;
    use crate::runtime::clock::ManualClock;

    fn fixture() -> (FrameScheduler, ManualClock, Scene, CameraManager, RecordingRenderer) {
        let clock = ManualClock::new();
        let scheduler = FrameScheduler::new(clock.clone());
        (
            scheduler,
            clock,
            Scene::new(),
            CameraManager::default(),
            RecordingRenderer::default(),
        )
    }

    fn viewport() -> Viewport {
        Viewport::new(800, 600, 1.0)
    }

    fn recording_hook(name: &'static str, log: Rc<RefCell<Vec<String>>>) -> Box<dyn FrameHook> {
        hook_fn(name, move |_, _, _| {
            log.borrow_mut().push(name.to_string());
            Ok(())
        })
    }

    #[test]
    fn hooks_run_in_registration_order_then_render_once() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.start([
            recording_hook("first", log.clone()),
            recording_hook("second", log.clone()),
            recording_hook("third", log.clone()),
        ]);

        let outcome = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);

        assert_eq!(outcome, FrameOutcome::Rendered { frame: 1 });
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        assert_eq!(renderer.render_calls, 1);
    }

    #[test]
    fn stopped_scheduler_does_not_render_and_stop_is_idempotent() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        scheduler.start(Vec::new());
        scheduler.stop();
        scheduler.stop();

        let outcome = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        assert_eq!(outcome, FrameOutcome::Stopped);
        assert_eq!(renderer.render_calls, 0);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn frame_context_carries_elapsed_and_delta() {
        let (mut scheduler, clock, mut scene, mut camera, mut renderer) = fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scheduler.start([hook_fn("record frames", move |frame, _, _| {
            sink.borrow_mut().push(*frame);
            Ok(())
        })]);

        clock.advance_secs(1.0);
        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        clock.advance_secs(0.25);
        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);

        let seen = seen.borrow();
        assert_eq!(seen[0].delta, Duration::ZERO);
        assert_eq!(seen[1].delta, Duration::from_secs_f32(0.25));
        assert_eq!(seen[1].elapsed, Duration::from_secs_f32(1.25));
        assert_eq!(seen[1].frame, 2);
        assert_eq!(seen[1].viewport, viewport());
    }

    #[test]
    fn failing_hook_aborts_frame_and_recovers_next_frame() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        scheduler.set_error_sink(Box::new(move |error| sink.borrow_mut().push(error.to_string())));

        let log = Rc::new(RefCell::new(Vec::new()));
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let flaky_log = log.clone();
        scheduler.start([
            recording_hook("before", log.clone()),
            hook_fn("flaky", move |_, _, _| {
                counter.set(counter.get() + 1);
                flaky_log.borrow_mut().push("flaky".to_string());
                if counter.get() == 1 {
                    anyhow::bail!("first frame fails");
                }
                Ok(())
            }),
            recording_hook("after", log.clone()),
        ]);

        let first = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        assert_eq!(
            first,
            FrameOutcome::Aborted {
                frame: 1,
                hook: Some("flaky".into())
            }
        );
        assert_eq!(renderer.render_calls, 0);
        assert_eq!(*log.borrow(), vec!["before", "flaky"]);
        assert_eq!(errors.borrow().len(), 1);

        let second = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        assert_eq!(second, FrameOutcome::Rendered { frame: 2 });
        assert_eq!(
            *log.borrow(),
            vec!["before", "flaky", "before", "flaky", "after"]
        );
        assert_eq!(renderer.render_calls, 1);
    }

    #[test]
    fn panicking_hook_is_reported_like_an_error() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        scheduler.set_error_sink(Box::new(move |error| sink.borrow_mut().push(error.to_string())));
        scheduler.start([hook_fn("explodes", |_, _, _| panic!("kaboom"))]);

        let outcome = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);

        assert!(matches!(outcome, FrameOutcome::Aborted { hook: Some(_), .. }));
        assert!(errors.borrow()[0].contains("kaboom"));
        assert!(scheduler.is_running());
    }

    #[test]
    fn hooks_added_mid_frame_run_from_next_frame() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let queue = scheduler.queue();
        let late_log = log.clone();
        let mut added = false;
        scheduler.start([hook_fn("spawner", move |_, _, _| {
            if !added {
                queue.add(recording_hook("late", late_log.clone()));
                added = true;
            }
            Ok(())
        })]);

        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.hook_names(), vec!["spawner"]);

        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        assert_eq!(*log.borrow(), vec!["late"]);
    }

    #[test]
    fn removed_hook_stops_running() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ids = scheduler.start([recording_hook("once", log.clone())]);

        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        scheduler.remove_hook(ids[0]);
        scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);

        assert_eq!(*log.borrow(), vec!["once"]);
        assert_eq!(renderer.render_calls, 2);
    }

    #[test]
    fn render_failure_is_reported_and_loop_continues() {
        let (mut scheduler, _clock, mut scene, mut camera, mut renderer) = fixture();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        scheduler.set_error_sink(Box::new(move |error| sink.borrow_mut().push(error.to_string())));
        scheduler.start(Vec::new());

        renderer.fail_next = true;
        let failed = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);
        let recovered = scheduler.tick(viewport(), &mut scene, &mut camera, &mut renderer);

        assert_eq!(failed, FrameOutcome::Aborted { frame: 1, hook: None });
        assert_eq!(recovered, FrameOutcome::Rendered { frame: 2 });
        assert_eq!(errors.borrow().len(), 1);
    }
}
