//! Resource-to-scene bridge
//!
//! Loads complete on whatever thread the [`LoadService`] uses, but the scene
//! only ever changes inside [`ResourceBridge::drain`], which the runtime calls
//! at the frame boundary. Completions travel through a single channel whose
//! only reader is the bridge, so the scene graph has exactly one writer and a
//! render never sees a half-applied resource.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::gfx::scene::Scene;
use crate::runtime::{error::panic_message, ErrorSink, RuntimeError};

use super::{
    font::FontData,
    loader::{FetchId, FetchMessage, LoadError, LoadService, LoadTicket, Resource, ResourceSpec},
    texture_resource::{EnvironmentMap, TextureData, TextureSettings},
};

/// How many settled requests keep a queryable status
const SETTLED_HISTORY: usize = 256;

/// Identifies one `load` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed,
}

/// Loading-manager style notifications
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// The first fetch of a batch was issued
    Started { resource: String },
    /// A service reported partial progress
    Progress {
        resource: String,
        loaded: u64,
        total: u64,
    },
    /// A fetch finished; `completed` of `total` fetches in this batch are done
    Loaded {
        resource: String,
        completed: usize,
        total: usize,
    },
    Failed { resource: String, error: String },
    /// Every fetch of the batch has settled
    AllLoaded { loaded: usize, failed: usize },
}

/// Outcome of one [`ResourceBridge::drain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub applied: usize,
    pub failed: usize,
}

type ApplyFn = Box<dyn FnOnce(&mut Scene, Resource)>;
type ErrorFn = Box<dyn FnOnce(&LoadError)>;

struct Request {
    handle: LoadHandle,
    spec: ResourceSpec,
    apply: ApplyFn,
    on_error: ErrorFn,
}

struct InFlight {
    spec: ResourceSpec,
    waiters: Vec<Request>,
}

#[derive(Debug, Default)]
struct Batch {
    total: usize,
    loaded: usize,
    failed: usize,
}

pub struct ResourceBridge {
    service: Box<dyn LoadService>,
    sender: UnboundedSender<(FetchId, FetchMessage)>,
    receiver: UnboundedReceiver<(FetchId, FetchMessage)>,
    cache: HashMap<ResourceSpec, Resource>,
    in_flight: HashMap<FetchId, InFlight>,
    by_spec: HashMap<ResourceSpec, FetchId>,
    ready: VecDeque<(Request, Result<Resource, LoadError>)>,
    statuses: HashMap<LoadHandle, LoadStatus>,
    settled: VecDeque<LoadHandle>,
    batch: Batch,
    next_fetch: u64,
    next_handle: u64,
    listener: Option<Box<dyn FnMut(&LoadEvent)>>,
    error_sink: Option<ErrorSink>,
}

impl fmt::Debug for ResourceBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBridge")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl ResourceBridge {
    pub fn new(service: impl LoadService + 'static) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            service: Box::new(service),
            sender,
            receiver,
            cache: HashMap::new(),
            in_flight: HashMap::new(),
            by_spec: HashMap::new(),
            ready: VecDeque::new(),
            statuses: HashMap::new(),
            settled: VecDeque::new(),
            batch: Batch::default(),
            next_fetch: 0,
            next_handle: 0,
            listener: None,
            error_sink: None,
        }
    }

    /// Receives loading-manager events
    pub fn set_listener(&mut self, listener: impl FnMut(&LoadEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Receives a [`RuntimeError::ResourceLoad`] per failed request; logs when unset
    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.error_sink = Some(sink);
    }

    /// Requests a resource
    ///
    /// Exactly one of `apply` or `on_error` runs, once, inside a later
    /// [`drain`](Self::drain). Cached resources are not fetched again; a request
    /// for something already being fetched shares that fetch.
    pub fn load<A, E>(&mut self, spec: ResourceSpec, apply: A, on_error: E) -> LoadHandle
    where
        A: FnOnce(&mut Scene, Resource) + 'static,
        E: FnOnce(&LoadError) + 'static,
    {
        let handle = LoadHandle(self.next_handle);
        self.next_handle += 1;
        self.statuses.insert(handle, LoadStatus::Pending);

        let request = Request {
            handle,
            spec: spec.clone(),
            apply: Box::new(apply),
            on_error: Box::new(on_error),
        };

        if let Some(resource) = self.cache.get(&spec) {
            log::debug!("{spec} served from cache");
            self.ready.push_back((request, Ok(resource.clone())));
            return handle;
        }

        if let Some(fetch) = self.by_spec.get(&spec) {
            if let Some(in_flight) = self.in_flight.get_mut(fetch) {
                log::debug!("{spec} already loading, sharing fetch {fetch:?}");
                in_flight.waiters.push(request);
                return handle;
            }
        }

        if self.in_flight.is_empty() {
            self.batch = Batch::default();
            self.emit(LoadEvent::Started {
                resource: spec.to_string(),
            });
        }
        self.batch.total += 1;

        let fetch = FetchId(self.next_fetch);
        self.next_fetch += 1;
        self.by_spec.insert(spec.clone(), fetch);
        self.in_flight.insert(
            fetch,
            InFlight {
                spec: spec.clone(),
                waiters: vec![request],
            },
        );

        log::debug!("loading {spec}");
        self.service
            .fetch(spec, LoadTicket::new(fetch, self.sender.clone()));
        handle
    }

    pub fn load_texture<A, E>(
        &mut self,
        path: &str,
        settings: TextureSettings,
        apply: A,
        on_error: E,
    ) -> LoadHandle
    where
        A: FnOnce(&mut Scene, Arc<TextureData>) + 'static,
        E: FnOnce(&LoadError) + 'static,
    {
        self.load(
            ResourceSpec::texture(path, settings),
            move |scene, resource| match resource.into_texture() {
                Some(texture) => apply(scene, texture),
                None => log::error!("texture request resolved to another resource kind"),
            },
            on_error,
        )
    }

    pub fn load_font<A, E>(&mut self, path: &str, apply: A, on_error: E) -> LoadHandle
    where
        A: FnOnce(&mut Scene, Arc<FontData>) + 'static,
        E: FnOnce(&LoadError) + 'static,
    {
        self.load(
            ResourceSpec::font(path),
            move |scene, resource| match resource.into_font() {
                Some(font) => apply(scene, font),
                None => log::error!("font request resolved to another resource kind"),
            },
            on_error,
        )
    }

    pub fn load_environment<A, E>(&mut self, spec: ResourceSpec, apply: A, on_error: E) -> LoadHandle
    where
        A: FnOnce(&mut Scene, Arc<EnvironmentMap>) + 'static,
        E: FnOnce(&LoadError) + 'static,
    {
        self.load(
            spec,
            move |scene, resource| match resource.into_environment() {
                Some(map) => apply(scene, map),
                None => log::error!("environment request resolved to another resource kind"),
            },
            on_error,
        )
    }

    /// Status of a request
    ///
    /// Pending requests are always known. Only the most recent settled requests
    /// are remembered; older ones report `None`.
    pub fn status(&self, handle: LoadHandle) -> Option<LoadStatus> {
        self.statuses.get(&handle).copied()
    }

    /// Requests whose callback has not run yet
    pub fn pending(&self) -> usize {
        self.in_flight.values().map(|f| f.waiters.len()).sum::<usize>() + self.ready.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    pub fn cached(&self, spec: &ResourceSpec) -> Option<&Resource> {
        self.cache.get(spec)
    }

    /// Applies every completion that arrived since the last drain
    pub fn drain(&mut self, scene: &mut Scene) -> DrainReport {
        while let Ok(Some((fetch, message))) = self.receiver.try_next() {
            self.on_message(fetch, message);
        }

        let mut report = DrainReport::default();
        while let Some((request, result)) = self.ready.pop_front() {
            let Request {
                handle,
                spec,
                apply,
                on_error,
            } = request;

            // A panicking callback fails its own request and nothing else
            let outcome = match result {
                Ok(resource) => panic::catch_unwind(AssertUnwindSafe(|| apply(scene, resource)))
                    .map_err(|payload| LoadError::ApplyPanicked(panic_message(payload.as_ref()))),
                Err(error) => {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_error(&error))) {
                        log::error!(
                            "error handler for {spec} panicked: {}",
                            panic_message(payload.as_ref())
                        );
                    }
                    Err(error)
                }
            };

            match outcome {
                Ok(()) => {
                    self.settle(handle, LoadStatus::Loaded);
                    report.applied += 1;
                }
                Err(error) => {
                    self.settle(handle, LoadStatus::Failed);
                    report.failed += 1;
                    self.report(RuntimeError::ResourceLoad {
                        resource: spec.to_string(),
                        source: error,
                    });
                }
            }
        }
        report
    }

    fn settle(&mut self, handle: LoadHandle, status: LoadStatus) {
        self.statuses.insert(handle, status);
        self.settled.push_back(handle);
        while self.settled.len() > SETTLED_HISTORY {
            if let Some(oldest) = self.settled.pop_front() {
                self.statuses.remove(&oldest);
            }
        }
    }

    fn on_message(&mut self, fetch: FetchId, message: FetchMessage) {
        match message {
            FetchMessage::Progress { loaded, total } => {
                if let Some(in_flight) = self.in_flight.get(&fetch) {
                    let resource = in_flight.spec.to_string();
                    log::trace!("{resource}: {loaded}/{total}");
                    self.emit(LoadEvent::Progress {
                        resource,
                        loaded,
                        total,
                    });
                }
            }
            FetchMessage::Done(result) => {
                let Some(in_flight) = self.in_flight.remove(&fetch) else {
                    log::warn!("completion for unknown fetch {fetch:?} ignored");
                    return;
                };
                self.by_spec.remove(&in_flight.spec);
                let resource = in_flight.spec.to_string();
                let result = result.and_then(|loaded| {
                    if in_flight.spec.accepts(&loaded) {
                        Ok(loaded)
                    } else {
                        Err(LoadError::WrongKind {
                            expected: in_flight.spec.kind(),
                            found: loaded.kind(),
                        })
                    }
                });

                match &result {
                    Ok(loaded) => {
                        self.cache.insert(in_flight.spec.clone(), loaded.clone());
                        self.batch.loaded += 1;
                        log::info!("loaded {resource}");
                        self.emit(LoadEvent::Loaded {
                            resource,
                            completed: self.batch.loaded + self.batch.failed,
                            total: self.batch.total,
                        });
                    }
                    Err(error) => {
                        self.batch.failed += 1;
                        self.emit(LoadEvent::Failed {
                            resource,
                            error: error.to_string(),
                        });
                    }
                }

                for request in in_flight.waiters {
                    self.ready.push_back((request, result.clone()));
                }

                if self.in_flight.is_empty() {
                    log::debug!(
                        "all loads settled: {} loaded, {} failed",
                        self.batch.loaded,
                        self.batch.failed
                    );
                    self.emit(LoadEvent::AllLoaded {
                        loaded: self.batch.loaded,
                        failed: self.batch.failed,
                    });
                }
            }
        }
    }

    fn emit(&mut self, event: LoadEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    fn report(&mut self, error: RuntimeError) {
        match self.error_sink.as_mut() {
            Some(sink) => sink(error),
            None => error.log(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gfx::scene::Color;
    use std::{cell::RefCell, rc::Rc};

    /// Service that parks tickets until the test completes them
    #[derive(Clone, Default)]
    pub(crate) struct ManualService {
        pub(crate) requests: Rc<RefCell<Vec<(ResourceSpec, LoadTicket)>>>,
    }

    impl ManualService {
        pub(crate) fn complete(&self, index: usize, result: Result<Resource, LoadError>) {
            let (_, ticket) = self.requests.borrow_mut().remove(index);
            ticket.complete(result);
        }

        pub(crate) fn issued(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl LoadService for ManualService {
        fn fetch(&self, spec: ResourceSpec, ticket: LoadTicket) {
            self.requests.borrow_mut().push((spec, ticket));
        }
    }

    pub(crate) fn red_texture() -> Resource {
        Resource::Texture(Arc::new(TextureData::solid("red", Color::new(1.0, 0.0, 0.0))))
    }

    fn counting_bridge() -> (ResourceBridge, ManualService, Rc<RefCell<Vec<String>>>) {
        let service = ManualService::default();
        let bridge = ResourceBridge::new(service.clone());
        (bridge, service, Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn completion_applies_only_at_drain() {
        let (mut bridge, service, _) = counting_bridge();
        let mut scene = Scene::new();

        let handle = bridge.load_texture(
            "door.jpg",
            TextureSettings::color(),
            |scene, texture| {
                scene.add_texture(texture);
            },
            |_| panic!("unexpected failure"),
        );
        service.complete(0, Ok(red_texture()));

        assert!(scene.texture(crate::gfx::resources::TextureId(0)).is_none());
        assert_eq!(bridge.status(handle), Some(LoadStatus::Pending));

        let report = bridge.drain(&mut scene);
        assert_eq!(report.applied, 1);
        assert!(scene.texture(crate::gfx::resources::TextureId(0)).is_some());
        assert_eq!(bridge.status(handle), Some(LoadStatus::Loaded));
    }

    #[test]
    fn duplicate_concurrent_requests_share_one_fetch() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();

        for name in ["first", "second"] {
            let log = log.clone();
            bridge.load(
                ResourceSpec::texture("same.png", TextureSettings::default()),
                move |_, _| log.borrow_mut().push(name.to_string()),
                |_| panic!("unexpected failure"),
            );
        }
        assert_eq!(service.issued(), 1);

        service.complete(0, Ok(red_texture()));
        bridge.drain(&mut scene);
        bridge.drain(&mut scene);

        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn cached_resource_is_not_fetched_again() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        let spec = ResourceSpec::texture("matcap.png", TextureSettings::color());

        bridge.load(spec.clone(), |_, _| {}, |_| {});
        service.complete(0, Ok(red_texture()));
        bridge.drain(&mut scene);

        let hits = log.clone();
        bridge.load(spec.clone(), move |_, _| hits.borrow_mut().push("hit".into()), |_| {});
        assert_eq!(service.issued(), 0);
        assert!(bridge.cached(&spec).is_some());

        bridge.drain(&mut scene);
        assert_eq!(*log.borrow(), vec!["hit"]);
    }

    #[test]
    fn failure_runs_only_the_error_handler() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        let errors = log.clone();
        let reported = Rc::new(RefCell::new(0));
        let sink_count = reported.clone();
        bridge.set_error_sink(Box::new(move |error| {
            assert!(matches!(error, RuntimeError::ResourceLoad { .. }));
            *sink_count.borrow_mut() += 1;
        }));

        let handle = bridge.load(
            ResourceSpec::texture("missing.png", TextureSettings::default()),
            |_, _| panic!("must not apply"),
            move |error| errors.borrow_mut().push(error.to_string()),
        );
        service.complete(
            0,
            Err(LoadError::io(
                "missing.png",
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            )),
        );

        let report = bridge.drain(&mut scene);
        assert_eq!(report.failed, 1);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(*reported.borrow(), 1);
        assert_eq!(bridge.status(handle), Some(LoadStatus::Failed));
        assert_eq!(scene.get_statistics().textures, 0);
    }

    #[test]
    fn one_failure_cancels_nothing_else() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        bridge.set_error_sink(Box::new(|_| {}));

        let ok = log.clone();
        bridge.load(ResourceSpec::font("a.json"), |_, _| {}, |_| {});
        bridge.load(
            ResourceSpec::texture("b.png", TextureSettings::default()),
            move |_, _| ok.borrow_mut().push("b".into()),
            |_| {},
        );

        service.complete(0, Err(LoadError::Abandoned));
        service.complete(0, Ok(red_texture()));
        let report = bridge.drain(&mut scene);

        assert_eq!(report, DrainReport { applied: 1, failed: 1 });
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn dropped_ticket_reports_failure() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        bridge.set_error_sink(Box::new(|_| {}));

        let errors = log.clone();
        bridge.load(
            ResourceSpec::font("lost.json"),
            |_, _| {},
            move |error| errors.borrow_mut().push(error.to_string()),
        );
        service.requests.borrow_mut().clear();

        bridge.drain(&mut scene);
        assert_eq!(*log.borrow(), vec![LoadError::Abandoned.to_string()]);
    }

    #[test]
    fn loading_manager_events() {
        let (mut bridge, service, _) = counting_bridge();
        let mut scene = Scene::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        bridge.set_listener(move |event| sink.borrow_mut().push(event.clone()));

        bridge.load(ResourceSpec::texture("a.png", TextureSettings::default()), |_, _| {}, |_| {});
        bridge.load(ResourceSpec::texture("b.png", TextureSettings::default()), |_, _| {}, |_| {});
        service.requests.borrow()[0].1.progress(5, 10);
        service.complete(0, Ok(red_texture()));
        service.complete(0, Ok(red_texture()));
        bridge.drain(&mut scene);

        let events = events.borrow();
        assert!(matches!(events[0], LoadEvent::Started { .. }));
        assert!(matches!(events[1], LoadEvent::Progress { loaded: 5, total: 10, .. }));
        assert!(matches!(events[2], LoadEvent::Loaded { completed: 1, total: 2, .. }));
        assert!(matches!(events[3], LoadEvent::Loaded { completed: 2, total: 2, .. }));
        assert_eq!(events[4], LoadEvent::AllLoaded { loaded: 2, failed: 0 });
    }

    #[test]
    fn wrong_payload_kind_fails_the_request() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let sink = reported.clone();
        bridge.set_error_sink(Box::new(move |error| sink.borrow_mut().push(error.to_string())));

        let spec = ResourceSpec::font("helvetiker.json");
        let errors = log.clone();
        let handle = bridge.load(
            spec.clone(),
            |_, _| panic!("must not apply"),
            move |error| errors.borrow_mut().push(error.to_string()),
        );
        service.complete(0, Ok(red_texture()));
        bridge.drain(&mut scene);

        assert_eq!(bridge.status(handle), Some(LoadStatus::Failed));
        assert_eq!(
            *log.borrow(),
            vec!["expected a font but the loader produced a texture".to_string()]
        );
        assert_eq!(reported.borrow().len(), 1);
        assert!(bridge.cached(&spec).is_none());
    }

    #[test]
    fn panicking_apply_fails_only_its_request() {
        let (mut bridge, service, log) = counting_bridge();
        let mut scene = Scene::new();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let sink = reported.clone();
        bridge.set_error_sink(Box::new(move |error| {
            if let RuntimeError::ResourceLoad { source, .. } = error {
                sink.borrow_mut().push(source);
            }
        }));

        let spec = ResourceSpec::texture("door.jpg", TextureSettings::default());
        let faulty = bridge.load(spec.clone(), |_, _| panic!("bad apply"), |_| {});
        let applied = log.clone();
        let healthy = bridge.load(
            spec,
            move |_, _| applied.borrow_mut().push("healthy".into()),
            |_| panic!("must not fail"),
        );
        service.complete(0, Ok(red_texture()));

        let report = bridge.drain(&mut scene);
        assert_eq!(report, DrainReport { applied: 1, failed: 1 });
        assert_eq!(bridge.status(faulty), Some(LoadStatus::Failed));
        assert_eq!(bridge.status(healthy), Some(LoadStatus::Loaded));
        assert_eq!(*log.borrow(), vec!["healthy"]);
        assert!(matches!(
            reported.borrow().as_slice(),
            [LoadError::ApplyPanicked(message)] if message == "bad apply"
        ));
    }

    #[test]
    fn settled_statuses_are_bounded() {
        let (mut bridge, service, _) = counting_bridge();
        let mut scene = Scene::new();

        let handles: Vec<_> = (0..SETTLED_HISTORY + 10)
            .map(|i| {
                let spec = ResourceSpec::texture(&format!("tile-{i}.png"), TextureSettings::default());
                bridge.load(spec, |_, _| {}, |_| {})
            })
            .collect();
        let pending = bridge.load(ResourceSpec::font("late.json"), |_, _| {}, |_| {});
        for _ in 0..handles.len() {
            service.complete(0, Ok(red_texture()));
        }
        bridge.drain(&mut scene);

        assert_eq!(bridge.statuses.len(), SETTLED_HISTORY + 1);
        assert_eq!(bridge.status(handles[0]), None);
        assert_eq!(bridge.status(handles[handles.len() - 1]), Some(LoadStatus::Loaded));
        assert_eq!(bridge.status(pending), Some(LoadStatus::Pending));
    }
}
