//! Lights demo: every light kind with its helper, a shadow-casting sun and
//! objects animated from the elapsed time

use std::f32::consts::PI;

use vista::prelude::*;

fn main() -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.window.title = "Lights".to_string();
    config.camera.position = [1.0, 2.0, 6.0];
    config.panel.title = "Lights".to_string();

    SceneApp::new(config)?
        .on_start(|runtime| {
            let scene = &mut runtime.scene;
            let material =
                scene.add_material(Material::new("standard", MaterialKind::Standard).with_roughness(0.4));

            let sphere = scene.add(
                SceneNode::mesh("sphere", Geometry::sphere(0.5, 32, 32), material).with_position(-1.5, 0.0, 0.0),
            );
            let cube = scene.add(SceneNode::mesh("cube", Geometry::cube(1), material).with_scale(0.75));
            let torus = scene.add(
                SceneNode::mesh("torus", Geometry::torus(0.3, 0.2, 32, 64), material).with_position(1.5, 0.0, 0.0),
            );
            scene.add(
                SceneNode::mesh("floor", Geometry::plane(5.0, 5.0), material)
                    .with_rotation(-PI / 2.0, 0.0, 0.0)
                    .with_position(0.0, -0.65, 0.0),
            );

            let ambient = scene.add(SceneNode::light("ambient", Light::ambient(Color::WHITE, 0.5)));
            scene.add(SceneNode::light(
                "hemisphere",
                Light::hemisphere(Color::from_hex(0xff0000), Color::from_hex(0x0000ff), 0.3),
            ));

            let shadow = ShadowSettings {
                map_size: 1024,
                camera: ShadowCamera::square(3.0, 1.0, 8.0),
                radius: 2.0,
                ..Default::default()
            };
            let sun = scene.add(
                SceneNode::light("sun", Light::directional(Color::from_hex(0x00fffc), 0.3).with_shadow(shadow))
                    .with_position(2.0, 2.0, -1.0),
            );
            let bulb = scene.add(
                SceneNode::light("bulb", Light::point(Color::from_hex(0xff9000), 0.5)).with_position(1.0, -0.5, 1.0),
            );
            let panel_light = scene.add(
                SceneNode::light("panel", Light::rect_area(Color::from_hex(0x4e00ff), 2.0, 1.0, 1.0))
                    .with_position(-1.5, 0.0, 1.5),
            );
            let spot = scene.add(
                SceneNode::light("spot", Light::spot(Color::from_hex(0x78ff00), 0.5, PI * 0.1, 0.25))
                    .with_position(0.0, 2.0, 3.0),
            );
            for light in [sun, bulb, panel_light, spot] {
                scene.add_light_helper(light, 0.2);
            }

            let panel = &mut runtime.panel;
            let scene = &runtime.scene;
            panel.bind(
                scene,
                BindTarget::Node(ambient),
                "intensity",
                ParamOptions::new().range(0.0, 1.0).step(0.001).folder("Ambient"),
            )?;
            panel.bind(scene, BindTarget::Node(sun), "cast_shadow", ParamOptions::new().folder("Sun"))?;
            panel.bind(
                scene,
                BindTarget::Node(sun),
                "shadow.radius",
                ParamOptions::new().range(0.0, 10.0).step(0.1).folder("Sun"),
            )?;
            panel.bind(
                scene,
                BindTarget::Node(sun),
                "position.x",
                ParamOptions::new().range(-5.0, 5.0).step(0.01).folder("Sun"),
            )?;

            let animate = hook_fn("animate objects", move |frame, scene, _camera| {
                let elapsed = frame.elapsed_secs();
                for id in [sphere, cube, torus] {
                    if let Some(node) = scene.node_mut(id) {
                        node.transform.rotation.y = 0.1 * elapsed;
                        node.transform.rotation.x = 0.15 * elapsed;
                    }
                }
                if let Some(node) = scene.node_mut(sphere) {
                    node.transform.position.y = (elapsed * 3.0).sin().abs() * 0.5;
                }
                if let Some(node) = scene.node_mut(bulb) {
                    node.transform.position.x = (elapsed * 0.5).cos() * 1.5;
                    node.transform.position.z = (elapsed * 0.5).sin() * 1.5;
                }
                Ok(())
            });

            Ok(vec![animate])
        })
        .run()
}
