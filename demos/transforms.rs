//! Transforms demo: a group of cubes moved as one, an axes helper and a
//! random triangle soup built from a custom position buffer

use rand::Rng;
use vista::prelude::*;

const TRIANGLES: usize = 50;

fn main() -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.window.title = "Transforms".to_string();
    config.camera.position = [1.0, 1.0, 3.0];
    config.panel.title = "Transforms".to_string();

    SceneApp::new(config)?
        .on_start(|runtime| {
            let scene = &mut runtime.scene;
            scene.add(SceneNode::axes("axes", 2.0));

            let group = scene.add(
                SceneNode::group("cubes")
                    .with_position(0.0, 1.0, 0.0)
                    .with_rotation(0.0, 0.2, 0.0),
            );
            for (name, x, hex) in [("red", -2.0, 0xff0000), ("green", 0.0, 0x00ff00), ("blue", 2.0, 0x0000ff)] {
                let material = scene.add_material(Material::basic(name, Color::from_hex(hex)));
                scene.add_child(
                    group,
                    SceneNode::mesh(name, Geometry::cube(1), material).with_position(x, 0.0, 0.0),
                );
            }

            let mut rng = rand::rng();
            let positions = (0..TRIANGLES * 3)
                .map(|_| {
                    [
                        rng.random::<f32>() - 0.5,
                        rng.random::<f32>() - 0.5,
                        rng.random::<f32>() - 0.5,
                    ]
                })
                .collect();
            let soup_material = scene.add_material(
                Material::basic("soup", Color::from_hex(0xff8800)).with_wireframe(true),
            );
            let soup = scene.add(
                SceneNode::mesh("soup", Geometry::buffer(positions), soup_material)
                    .with_position(0.0, -1.0, 0.0),
            );

            let panel = &mut runtime.panel;
            let scene = &runtime.scene;
            for key in ["position.x", "position.y", "rotation.y", "scale.x"] {
                panel.bind(
                    scene,
                    BindTarget::Node(group),
                    key,
                    ParamOptions::new().range(-3.0, 3.0).step(0.01).folder("Group"),
                )?;
            }
            panel.bind(scene, BindTarget::Node(soup), "visible", ParamOptions::new().folder("Buffer geometry"))?;
            panel.bind(scene, BindTarget::Node(soup), "wireframe", ParamOptions::new().folder("Buffer geometry"))?;

            Ok(Vec::new())
        })
        .run()
}
