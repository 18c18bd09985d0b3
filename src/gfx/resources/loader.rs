//! Load requests, results and the service seam
//!
//! A [`LoadService`] receives a [`ResourceSpec`] together with a [`LoadTicket`]
//! and must return immediately; the work happens elsewhere and reports back
//! through the ticket. Tickets are `Send` so they can travel to worker threads.

use std::{fmt, sync::Arc};

use futures::channel::mpsc::UnboundedSender;
use thiserror::Error;

use super::{
    font::FontData,
    texture_resource::{EnvironmentMap, TextureData, TextureSettings},
};

/// Where an environment map comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvironmentSource {
    /// Six face images in +X, -X, +Y, -Y, +Z, -Z order
    Cube([String; 6]),
    /// One equirectangular image (HDR or LDR)
    Equirectangular(String),
}

/// What to load; also the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceSpec {
    Texture {
        path: String,
        settings: TextureSettings,
    },
    Font {
        path: String,
    },
    Environment(EnvironmentSource),
}

impl ResourceSpec {
    pub fn texture(path: &str, settings: TextureSettings) -> Self {
        ResourceSpec::Texture {
            path: path.to_string(),
            settings,
        }
    }

    pub fn font(path: &str) -> Self {
        ResourceSpec::Font {
            path: path.to_string(),
        }
    }

    /// Cube map from a directory holding `px.png`, `nx.png`, ... faces
    pub fn cube_map(directory: &str, extension: &str) -> Self {
        let faces = super::texture_resource::CUBE_FACES
            .map(|face| format!("{}/{face}.{extension}", directory.trim_end_matches('/')));
        ResourceSpec::Environment(EnvironmentSource::Cube(faces))
    }

    pub fn equirectangular(path: &str) -> Self {
        ResourceSpec::Environment(EnvironmentSource::Equirectangular(path.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceSpec::Texture { .. } => "texture",
            ResourceSpec::Font { .. } => "font",
            ResourceSpec::Environment(_) => "environment",
        }
    }

    /// Whether `resource` is the kind of payload this request asked for
    pub fn accepts(&self, resource: &Resource) -> bool {
        self.kind() == resource.kind()
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSpec::Texture { path, .. } => write!(f, "texture '{path}'"),
            ResourceSpec::Font { path } => write!(f, "font '{path}'"),
            ResourceSpec::Environment(EnvironmentSource::Cube(faces)) => {
                write!(f, "cube map '{}' (+5 faces)", faces[0])
            }
            ResourceSpec::Environment(EnvironmentSource::Equirectangular(path)) => {
                write!(f, "environment '{path}'")
            }
        }
    }
}

/// A loaded resource, shared between the cache and the scene
#[derive(Debug, Clone)]
pub enum Resource {
    Texture(Arc<TextureData>),
    Font(Arc<FontData>),
    Environment(Arc<EnvironmentMap>),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Texture(_) => "texture",
            Resource::Font(_) => "font",
            Resource::Environment(_) => "environment",
        }
    }

    pub fn into_texture(self) -> Option<Arc<TextureData>> {
        match self {
            Resource::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn into_font(self) -> Option<Arc<FontData>> {
        match self {
            Resource::Font(font) => Some(font),
            _ => None,
        }
    }

    pub fn into_environment(self) -> Option<Arc<EnvironmentMap>> {
        match self {
            Resource::Environment(map) => Some(map),
            _ => None,
        }
    }
}

/// Why a load failed
///
/// Cloneable so one failed fetch can be reported to every request sharing it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("cannot read '{path}'")]
    Io {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("cannot decode image '{path}'")]
    Image {
        path: String,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("malformed font '{path}'")]
    Font {
        path: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("cube map faces differ in size: {0}")]
    MismatchedFaces(String),

    #[error("the loader gave up on the request")]
    Abandoned,

    #[error("expected a {expected} but the loader produced a {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("applying the resource panicked: {0}")]
    ApplyPanicked(String),
}

impl LoadError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_string(),
            source: Arc::new(source),
        }
    }

    pub fn image(path: &str, source: image::ImageError) -> Self {
        LoadError::Image {
            path: path.to_string(),
            source: Arc::new(source),
        }
    }

    pub fn font(path: &str, source: serde_json::Error) -> Self {
        LoadError::Font {
            path: path.to_string(),
            source: Arc::new(source),
        }
    }
}

/// Identifies one fetch issued to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(pub(crate) u64);

#[derive(Debug)]
pub(crate) enum FetchMessage {
    Progress { loaded: u64, total: u64 },
    Done(Result<Resource, LoadError>),
}

/// Handle through which a service reports on one fetch
///
/// Completing consumes the ticket. A ticket dropped without completing reports
/// [`LoadError::Abandoned`], so a request can never hang.
#[derive(Debug)]
pub struct LoadTicket {
    fetch: FetchId,
    sender: Option<UnboundedSender<(FetchId, FetchMessage)>>,
}

impl LoadTicket {
    pub(crate) fn new(fetch: FetchId, sender: UnboundedSender<(FetchId, FetchMessage)>) -> Self {
        Self {
            fetch,
            sender: Some(sender),
        }
    }

    pub fn fetch_id(&self) -> FetchId {
        self.fetch
    }

    /// Reports partial progress, in whatever unit the service counts
    pub fn progress(&self, loaded: u64, total: u64) {
        if let Some(sender) = &self.sender {
            // A closed channel means the bridge is gone; nothing left to tell
            let _ = sender.unbounded_send((self.fetch, FetchMessage::Progress { loaded, total }));
        }
    }

    pub fn complete(mut self, result: Result<Resource, LoadError>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<Resource, LoadError>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.unbounded_send((self.fetch, FetchMessage::Done(result)));
        }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if self.sender.is_some() {
            log::debug!("load ticket {:?} dropped without completing", self.fetch);
            self.finish(Err(LoadError::Abandoned));
        }
    }
}

/// Performs fetches off the frame path
///
/// `fetch` must not block; report through the ticket when done.
pub trait LoadService {
    fn fetch(&self, spec: ResourceSpec, ticket: LoadTicket);
}
