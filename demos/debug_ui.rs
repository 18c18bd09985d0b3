//! Debug UI demo: a wireframe cube driven from the parameter panel
//!
//! Press `h` to hide the panel, double click to toggle fullscreen.

use std::f32::consts::PI;

use vista::gfx::animation::TweenOptions;
use vista::prelude::*;

fn main() -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.window.title = "Debug UI".to_string();
    config.panel.title = "Nice debug UI".to_string();
    config.panel.width = 300.0;

    SceneApp::new(config)?
        .on_start(|runtime| {
            let scene = &mut runtime.scene;
            scene.set_tweak("color", Value::Color(Color::from_hex(0xa778d8)));
            scene.set_tweak("subdivision", Value::Float(2.0));

            let material = scene.add_material(
                Material::basic("cube", Color::from_hex(0xa778d8)).with_wireframe(true),
            );
            let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(2), material));

            let folder = |options: ParamOptions| options.folder("Awesome cube");
            let panel = &mut runtime.panel;
            let scene = &runtime.scene;

            panel.bind(
                scene,
                BindTarget::Node(cube),
                "position.y",
                folder(ParamOptions::new().range(-3.0, 3.0).step(0.01).name("Elevation")),
            )?;
            panel.bind(scene, BindTarget::Node(cube), "visible", folder(ParamOptions::new()))?;
            panel.bind(scene, BindTarget::Node(cube), "wireframe", folder(ParamOptions::new()))?;
            panel.bind(
                scene,
                BindTarget::Tweaks,
                "color",
                folder(ParamOptions::new().on_change(move |scene, value| {
                    if let (Some(material), Some(color)) = (scene.material_mut(material), value.as_color()) {
                        material.color = color;
                    }
                })),
            )?;
            panel.bind_action("spin", Some("Awesome cube"), move |scene| {
                scene.tweens.by(
                    PropertyRef::Node(cube, NodeProperty::Rotation(Axis::Y)),
                    PI * 2.0,
                    TweenOptions::new(1.0),
                );
            });
            panel.bind(
                scene,
                BindTarget::Tweaks,
                "subdivision",
                folder(
                    ParamOptions::new()
                        .range(1.0, 20.0)
                        .step(1.0)
                        .commit_only()
                        .on_commit(move |scene, value| {
                            let segments = value.as_f32().unwrap_or(1.0) as u32;
                            scene.set_geometry(cube, Geometry::cube(segments));
                        }),
                ),
            )?;

            Ok(Vec::new())
        })
        .run()
}
