//! 3D text demo: typeface text surrounded by a hundred matcap donuts
//!
//! Expects `assets/fonts/helvetiker_regular.typeface.json` and
//! `assets/textures/matcaps/8.png`.

use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

use vista::gfx::resources::{FontData, TextOptions};
use vista::gfx::scene::MaterialId;
use vista::prelude::*;

const MESSAGE: &str = "Hello Vista";
const DONUTS: usize = 100;

fn main() -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.window.title = "3D Text".to_string();

    SceneApp::new(config)?
        .on_start(|runtime| {
            // Filled once the typeface arrives; edits before that only update the tweak
            let loaded_font: Rc<RefCell<Option<Arc<FontData>>>> = Rc::default();

            runtime.scene.set_tweak("message", Value::Text(MESSAGE.to_string()));
            let font_for_edits = loaded_font.clone();
            runtime.panel.bind(
                &runtime.scene,
                BindTarget::Tweaks,
                "message",
                ParamOptions::new().commit_only().on_commit(move |scene, value| {
                    let (Some(font), Some(message)) = (font_for_edits.borrow().clone(), value.as_text())
                    else {
                        return;
                    };
                    if let Some(text) = scene.find_by_name("text") {
                        place_text(scene, text, &font, message);
                    }
                }),
            )?;

            let material = runtime
                .scene
                .add_material(Material::new("matcap", MaterialKind::Matcap));

            runtime.resources.load_texture(
                "textures/matcaps/8.png",
                TextureSettings::color(),
                move |scene, texture| {
                    let id = scene.add_texture(texture);
                    if let Some(material) = scene.material_mut(material) {
                        material.matcap = Some(id);
                    }
                },
                |error| log::warn!("matcap unavailable: {error}"),
            );

            runtime.resources.load_font(
                "/fonts/helvetiker_regular.typeface.json",
                move |scene, font| {
                    let message = match scene.tweak("message") {
                        Some(Value::Text(message)) => message.clone(),
                        _ => MESSAGE.to_string(),
                    };
                    let geometry = font.text_geometry(&message, TextOptions::default());
                    let text = scene.add(SceneNode::mesh("text", geometry, material));
                    centre_text(scene, text, &font, &message);
                    *loaded_font.borrow_mut() = Some(font.clone());
                    scene.add_font(font);
                    add_donuts(scene, material);
                },
                |error| log::error!("font unavailable, no text: {error}"),
            );

            Ok(Vec::new())
        })
        .run()
}

/// Rebuilds the text mesh for a committed message
fn place_text(scene: &mut Scene, text: NodeId, font: &FontData, message: &str) {
    scene.set_geometry(text, font.text_geometry(message, TextOptions::default()));
    centre_text(scene, text, font, message);
}

fn centre_text(scene: &mut Scene, text: NodeId, font: &FontData, message: &str) {
    let width = font.measure(message, TextOptions::default().size);
    if let Some(node) = scene.node_mut(text) {
        node.transform.position.x = -width / 2.0;
    }
}

fn add_donuts(scene: &mut Scene, material: MaterialId) {
    let spread = |r: f32| (r - 0.5) * 10.0;
    for i in 0..DONUTS {
        let scale = rand::random::<f32>();
        let donut = SceneNode::mesh(&format!("donut-{i}"), Geometry::torus(0.3, 0.2, 32, 64), material)
            .with_position(
                spread(rand::random()),
                spread(rand::random()),
                spread(rand::random()),
            )
            .with_rotation(rand::random::<f32>() * PI, rand::random::<f32>() * PI, 0.0)
            .with_scale(scale);
        scene.add(donut);
    }
}
