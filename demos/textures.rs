//! Textures demo: a pixelated color map plus the door texture set
//!
//! Expects an `assets/` directory next to the working directory with
//! `textures/minecraft.png` and `textures/door/*.jpg`. Missing files are
//! reported and the cube stays untextured.

use vista::gfx::resources::{LoadEvent, WrapMode};
use vista::prelude::*;

const DOOR_MAPS: [&str; 6] = [
    "alpha",
    "height",
    "normal",
    "ambientOcclusion",
    "metalness",
    "roughness",
];

fn main() -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.window.title = "Textures".to_string();
    config.camera.position = [1.0, 1.0, 1.0];
    config.panel.visible = false;

    SceneApp::new(config)?
        .on_start(|runtime| {
            let material = runtime
                .scene
                .add_material(Material::basic("cube", Color::WHITE));
            runtime
                .scene
                .add(SceneNode::mesh("cube", Geometry::cube(1), material));

            runtime.resources.set_listener(|event| match event {
                LoadEvent::Started { resource } => log::info!("Loading started: {resource}"),
                LoadEvent::Progress { resource, loaded, total } => {
                    log::info!("Loading in progress: {resource} {loaded}/{total}")
                }
                LoadEvent::Loaded { resource, completed, total } => {
                    log::info!("Loaded {resource} ({completed}/{total})")
                }
                LoadEvent::Failed { resource, error } => log::info!("Loading error: {resource}: {error}"),
                LoadEvent::AllLoaded { loaded, failed } => {
                    log::info!("Loading finished: {loaded} loaded, {failed} failed")
                }
            });

            let settings = TextureSettings::color()
                .pixelated()
                .with_wrap(WrapMode::MirroredRepeat);
            runtime.resources.load_texture(
                "/textures/minecraft.png",
                settings,
                move |scene, texture| {
                    let id = scene.add_texture(texture);
                    if let Some(material) = scene.material_mut(material) {
                        material.map = Some(id);
                    }
                },
                |error| log::warn!("Texture loading error: {error}"),
            );

            for map in DOOR_MAPS {
                runtime.resources.load_texture(
                    &format!("/textures/door/{map}.jpg"),
                    TextureSettings::default(),
                    |scene, texture| {
                        scene.add_texture(texture);
                    },
                    |_| {},
                );
            }

            Ok(Vec::new())
        })
        .run()
}
