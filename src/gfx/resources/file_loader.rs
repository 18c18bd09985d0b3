//! Filesystem-backed [`LoadService`]
//!
//! Reads and decodes on a small `futures` thread pool. Paths are resolved
//! against an asset root; a leading `/` means "from the root", the way a web
//! page addresses its public directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::executor::ThreadPool;

use super::{
    font::FontData,
    loader::{EnvironmentSource, LoadError, LoadService, LoadTicket, Resource, ResourceSpec},
    texture_resource::{EnvironmentMap, TextureData, TextureSettings},
};
use std::sync::Arc;

pub struct FileLoader {
    root: PathBuf,
    pool: ThreadPool,
}

impl FileLoader {
    /// Loader with one worker per core, capped at four
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Self::with_threads(root, num_cpus::get().clamp(1, 4))
    }

    pub fn with_threads(root: impl Into<PathBuf>, threads: usize) -> anyhow::Result<Self> {
        let pool = ThreadPool::builder()
            .pool_size(threads.max(1))
            .name_prefix("vista-loader-")
            .create()
            .context("failed to start loader thread pool")?;
        let root = root.into();
        log::debug!("file loader rooted at {} with {threads} threads", root.display());
        Ok(Self { root, pool })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve(&self.root, path)
    }
}

impl LoadService for FileLoader {
    fn fetch(&self, spec: ResourceSpec, ticket: LoadTicket) {
        let root = self.root.clone();
        self.pool.spawn_ok(async move {
            let result = load_from_disk(&root, &spec, &ticket);
            ticket.complete(result);
        });
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Blocking read + decode of one request
pub(crate) fn load_from_disk(
    root: &Path,
    spec: &ResourceSpec,
    ticket: &LoadTicket,
) -> Result<Resource, LoadError> {
    match spec {
        ResourceSpec::Texture { path, settings } => {
            let texture = read_texture(root, path, *settings)?;
            ticket.progress(1, 1);
            Ok(Resource::Texture(Arc::new(texture)))
        }
        ResourceSpec::Font { path } => {
            let json = std::fs::read_to_string(resolve(root, path))
                .map_err(|e| LoadError::io(path, e))?;
            ticket.progress(json.len() as u64, json.len() as u64);
            let font = FontData::from_typeface_json(&json).map_err(|e| LoadError::font(path, e))?;
            Ok(Resource::Font(Arc::new(font)))
        }
        ResourceSpec::Environment(EnvironmentSource::Equirectangular(path)) => {
            let settings = TextureSettings {
                generate_mipmaps: false,
                ..TextureSettings::color()
            };
            let texture = read_texture(root, path, settings)?;
            ticket.progress(1, 1);
            Ok(Resource::Environment(Arc::new(EnvironmentMap::Equirectangular(texture))))
        }
        ResourceSpec::Environment(EnvironmentSource::Cube(paths)) => {
            let mut faces = Vec::with_capacity(6);
            for (index, path) in paths.iter().enumerate() {
                faces.push(read_texture(root, path, TextureSettings::color())?);
                ticket.progress(index as u64 + 1, 6);
            }

            let (width, height) = (faces[0].width, faces[0].height);
            if let Some(odd) = faces.iter().find(|f| (f.width, f.height) != (width, height)) {
                return Err(LoadError::MismatchedFaces(format!(
                    "'{}' is {}x{}, expected {width}x{height}",
                    odd.source, odd.width, odd.height
                )));
            }

            let faces: [TextureData; 6] = faces
                .try_into()
                .map_err(|_| LoadError::MismatchedFaces("expected six faces".into()))?;
            Ok(Resource::Environment(Arc::new(EnvironmentMap::Cube(Box::new(faces)))))
        }
    }
}

fn read_texture(root: &Path, path: &str, settings: TextureSettings) -> Result<TextureData, LoadError> {
    let bytes = std::fs::read(resolve(root, path)).map_err(|e| LoadError::io(path, e))?;
    let image = image::load_from_memory(&bytes).map_err(|e| LoadError::image(path, e))?;
    Ok(TextureData::from_image(path, image, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::{bridge::ResourceBridge, font::tests::TINY_TYPEFACE, CUBE_FACES};
    use crate::gfx::scene::Scene;
    use futures::channel::mpsc;
    use image::{Rgba, RgbaImage};
    use std::time::{Duration, Instant};

    fn write_png(dir: &Path, name: &str, size: u32) {
        RgbaImage::from_pixel(size, size, Rgba([200, 10, 10, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn ticket() -> LoadTicket {
        let (sender, _receiver) = mpsc::unbounded();
        LoadTicket::new(super::super::loader::FetchId(0), sender)
    }

    #[test]
    fn decodes_png_with_requested_settings() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "minecraft.png", 8);

        let settings = TextureSettings::color().pixelated();
        let resource = load_from_disk(
            dir.path(),
            &ResourceSpec::texture("/minecraft.png", settings),
            &ticket(),
        )
        .unwrap();
        let texture = resource.into_texture().unwrap();
        assert_eq!((texture.width, texture.height), (8, 8));
        assert_eq!(texture.settings, settings);
        assert_eq!(&texture.pixels[..4], &[200, 10, 10, 255]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_from_disk(dir.path(), &ResourceSpec::font("nope.json"), &ticket()).unwrap_err();
        assert!(matches!(error, LoadError::Io { .. }));
    }

    #[test]
    fn garbage_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not an image").unwrap();
        let error = load_from_disk(
            dir.path(),
            &ResourceSpec::texture("bad.png", TextureSettings::default()),
            &ticket(),
        )
        .unwrap_err();
        assert!(matches!(error, LoadError::Image { .. }));
    }

    #[test]
    fn cube_map_requires_matching_faces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("env")).unwrap();
        for face in CUBE_FACES {
            write_png(&dir.path().join("env"), &format!("{face}.png"), 4);
        }
        let spec = ResourceSpec::cube_map("env", "png");
        let map = load_from_disk(dir.path(), &spec, &ticket()).unwrap();
        assert!(matches!(
            map.into_environment().as_deref(),
            Some(EnvironmentMap::Cube(_))
        ));

        write_png(&dir.path().join("env"), "nz.png", 2);
        let error = load_from_disk(dir.path(), &spec, &ticket()).unwrap_err();
        assert!(matches!(error, LoadError::MismatchedFaces(_)));
    }

    #[test]
    fn thread_pool_completes_through_bridge() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.typeface.json"), TINY_TYPEFACE).unwrap();

        let loader = FileLoader::with_threads(dir.path(), 2).unwrap();
        let mut bridge = ResourceBridge::new(loader);
        let mut scene = Scene::new();

        bridge.load_font(
            "/tiny.typeface.json",
            |scene, font| {
                scene.add_font(font);
            },
            |error| panic!("font failed: {error}"),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while !bridge.is_idle() && Instant::now() < deadline {
            bridge.drain(&mut scene);
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(bridge.is_idle());
        assert_eq!(scene.font(crate::gfx::resources::FontId(0)).unwrap().family, "Tiny");
    }
}
