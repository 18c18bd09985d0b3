//! End-to-end scenarios driving a headless `SceneRuntime` frame by frame

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use vista::gfx::animation::TweenOptions;
use vista::gfx::rendering::RecordingRenderer;
use vista::gfx::resources::{
    LoadError, LoadService, LoadStatus, LoadTicket, Resource, ResourceSpec, TextureData,
};
use vista::prelude::*;
use vista::runtime::ManualClock;

/// Holds tickets until the test completes them
#[derive(Clone, Default)]
struct HeldLoads {
    tickets: Rc<RefCell<Vec<LoadTicket>>>,
}

impl HeldLoads {
    fn issued(&self) -> usize {
        self.tickets.borrow().len()
    }

    fn complete_next(&self, result: Result<Resource, LoadError>) {
        let ticket = self.tickets.borrow_mut().remove(0);
        ticket.complete(result);
    }
}

impl LoadService for HeldLoads {
    fn fetch(&self, _spec: ResourceSpec, ticket: LoadTicket) {
        self.tickets.borrow_mut().push(ticket);
    }
}

struct Harness {
    runtime: SceneRuntime,
    clock: ManualClock,
    loads: HeldLoads,
    renderer: RecordingRenderer,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new();
        let loads = HeldLoads::default();
        let runtime = SceneRuntime::new(&RuntimeConfig::default(), clock.clone(), loads.clone());
        Self {
            runtime,
            clock,
            loads,
            renderer: RecordingRenderer::default(),
        }
    }

    fn start(&mut self, hooks: Vec<Box<dyn FrameHook>>) {
        self.runtime.start(&mut self.renderer, hooks);
    }

    fn frame(&mut self) -> FrameOutcome {
        self.clock.advance_secs(1.0 / 60.0);
        self.runtime.frame(&mut self.renderer)
    }
}

fn red_texture() -> Resource {
    Resource::Texture(Arc::new(TextureData::solid("red", Color::new(1.0, 0.0, 0.0))))
}

#[test]
fn resize_is_visible_to_the_next_frame() {
    let mut h = Harness::new();
    h.start(Vec::new());

    assert!(h.runtime.resize(800, 600, &mut h.renderer));
    assert_eq!(h.frame(), FrameOutcome::Rendered { frame: 1 });

    let aspect = h.renderer.last_aspect.unwrap();
    assert!((aspect - 800.0 / 600.0).abs() < 1e-6);
    assert_eq!(h.renderer.size, Some((800, 600)));
    assert_eq!(h.renderer.pixel_ratio, Some(1.0));
}

#[test]
fn aspect_tracks_any_resize_sequence() {
    let mut h = Harness::new();
    h.start(Vec::new());

    for (w, hgt) in [(1920, 1080), (0, 500), (333, 777), (333, 777), (50, 2000)] {
        h.runtime.resize(w, hgt, &mut h.renderer);
        h.frame();
    }
    let aspect = h.runtime.camera.camera.aspect();
    assert!((aspect - 50.0 / 2000.0).abs() < 1e-6);
    assert_eq!(h.renderer.last_aspect, Some(aspect));
}

#[test]
fn duplicate_concurrent_loads_apply_once_each() {
    let mut h = Harness::new();
    h.start(Vec::new());

    let applied = Rc::new(RefCell::new(Vec::new()));
    let spec = ResourceSpec::texture("/textures/door/color.jpg", TextureSettings::color());
    for name in ["first", "second"] {
        let applied = applied.clone();
        h.runtime.resources.load(
            spec.clone(),
            move |scene, resource| {
                if let Some(texture) = resource.into_texture() {
                    scene.add_texture(texture);
                }
                applied.borrow_mut().push(name);
            },
            |error| panic!("unexpected failure: {error}"),
        );
    }
    assert_eq!(h.loads.issued(), 1);

    // Nothing lands until the completion is drained at a frame boundary
    h.loads.complete_next(Ok(red_texture()));
    assert!(applied.borrow().is_empty());

    h.frame();
    h.frame();
    assert_eq!(*applied.borrow(), vec!["first", "second"]);
    assert_eq!(h.runtime.scene.textures().count(), 2);

    // Resolved resources are served from the session cache
    let third = h.runtime.resources.load(spec, |_, _| {}, |_| {});
    assert_eq!(h.loads.issued(), 0);
    h.frame();
    assert_eq!(h.runtime.resources.status(third), Some(LoadStatus::Loaded));
}

#[test]
fn failed_load_leaves_scene_untouched() {
    let mut h = Harness::new();
    h.start(Vec::new());

    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    h.runtime
        .resources
        .set_error_sink(Box::new(move |error: RuntimeError| sink.borrow_mut().push(error.to_string())));

    let good = h.runtime.resources.load(
        ResourceSpec::font("/fonts/good.typeface.json"),
        |_, _| {},
        |_| {},
    );
    let bad = h.runtime.resources.load(
        ResourceSpec::texture("/textures/missing.png", TextureSettings::default()),
        |scene, _| scene.set_tweak("touched", Value::Bool(true)),
        |_| {},
    );
    assert_eq!(h.loads.issued(), 2);

    h.loads.complete_next(Err(LoadError::Abandoned));
    h.frame();

    assert_eq!(h.runtime.resources.status(good), Some(LoadStatus::Failed));
    assert_eq!(h.runtime.resources.status(bad), Some(LoadStatus::Pending));
    assert!(h.runtime.scene.tweak("touched").is_none());
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(h.renderer.render_calls, 1);
}

#[test]
fn failing_hook_aborts_only_its_frame() {
    let mut h = Harness::new();
    let runs = Rc::new(RefCell::new(Vec::new()));

    let flaky_runs = runs.clone();
    let later_runs = runs.clone();
    h.start(vec![
        hook_fn("flaky", move |frame, _, _| {
            flaky_runs.borrow_mut().push(("flaky", frame.frame));
            if frame.frame == 2 {
                anyhow::bail!("transient failure");
            }
            Ok(())
        }),
        hook_fn("later", move |frame, _, _| {
            later_runs.borrow_mut().push(("later", frame.frame));
            Ok(())
        }),
    ]);

    assert_eq!(h.frame(), FrameOutcome::Rendered { frame: 1 });
    assert_eq!(
        h.frame(),
        FrameOutcome::Aborted {
            frame: 2,
            hook: Some("flaky".to_string())
        }
    );
    assert_eq!(h.frame(), FrameOutcome::Rendered { frame: 3 });

    assert_eq!(
        *runs.borrow(),
        vec![("flaky", 1), ("later", 1), ("flaky", 2), ("flaky", 3), ("later", 3)]
    );
    assert_eq!(h.renderer.render_calls, 2);
}

#[test]
fn stopped_runtime_renders_nothing() {
    let mut h = Harness::new();
    h.start(Vec::new());
    h.frame();
    h.runtime.stop();
    h.runtime.stop();

    assert_eq!(h.frame(), FrameOutcome::Stopped);
    assert_eq!(h.renderer.render_calls, 1);
}

#[test]
fn drag_converges_through_frames() {
    let mut h = Harness::new();
    h.runtime.camera.controller.damping = 0.1;
    h.start(Vec::new());

    let start = *h.runtime.camera.controller.state();
    h.runtime.camera.controller.rotate(0.5, 0.1);
    let goal = *h.runtime.camera.controller.goal();
    let initial = start.distance_to(&goal);

    let mut previous = initial;
    for _ in 0..50 {
        h.frame();
        let remaining = h.runtime.camera.controller.state().distance_to(&goal);
        assert!(remaining < previous || remaining == 0.0);
        previous = remaining;
    }
    assert!(previous <= initial * 0.01);
    assert_eq!(h.runtime.camera.camera.eye(), h.runtime.camera.controller.state().eye());
}

#[test]
fn spin_action_tweens_over_frames() {
    let mut h = Harness::new();
    let material = h
        .runtime
        .scene
        .add_material(Material::basic("cube", Color::WHITE));
    let cube = h
        .runtime
        .scene
        .add(SceneNode::mesh("cube", Geometry::cube(1), material));

    let spin = h.runtime.panel.bind_action("spin", None, move |scene| {
        scene.tweens.by(
            PropertyRef::Node(cube, NodeProperty::Rotation(Axis::Y)),
            std::f32::consts::TAU,
            TweenOptions::new(1.0),
        );
    });
    h.start(Vec::new());
    h.runtime.panel.invoke(&mut h.runtime.scene, spin).unwrap();

    for _ in 0..90 {
        h.frame();
    }
    let rotation = h.runtime.scene.node(cube).unwrap().transform.rotation.y;
    assert!((rotation - std::f32::consts::TAU).abs() < 1e-4);
    assert!(h.runtime.scene.tweens.is_empty());
}
