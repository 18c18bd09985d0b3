//! Error taxonomy of the scene runtime
//!
//! None of these errors is fatal: the render loop keeps running through them.
//! Each failure is handed to an [`ErrorSink`], which by default logs it.

use std::any::Any;

use thiserror::Error;

use crate::gfx::resources::LoadError;

/// Recoverable failures reported while the runtime is live
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A resource could not be loaded; the scene keeps its prior state.
    #[error("failed to load {resource}: {source}")]
    ResourceLoad {
        resource: String,
        #[source]
        source: LoadError,
    },

    /// A frame hook failed; the rest of that frame was skipped.
    #[error("frame hook '{hook}' failed in frame {frame}: {source:#}")]
    FrameHook {
        hook: String,
        frame: u64,
        source: anyhow::Error,
    },

    /// The render call itself failed; the next frame retries.
    #[error("render failed in frame {frame}: {source:#}")]
    RenderFailure { frame: u64, source: anyhow::Error },

    /// The platform lacks a feature (e.g. fullscreen); degraded to a no-op.
    #[error("unsupported platform feature: {0}")]
    UnsupportedPlatformFeature(&'static str),
}

impl RuntimeError {
    /// Logs the error at the level its category calls for
    pub fn log(&self) {
        match self {
            RuntimeError::ResourceLoad { .. } => log::warn!("{self}"),
            RuntimeError::FrameHook { .. } | RuntimeError::RenderFailure { .. } => {
                log::error!("{self}")
            }
            RuntimeError::UnsupportedPlatformFeature(_) => log::debug!("{self}"),
        }
    }
}

/// Destination for runtime failures
pub type ErrorSink = Box<dyn FnMut(RuntimeError)>;

/// Sink that only logs
pub fn log_sink() -> ErrorSink {
    Box::new(|error: RuntimeError| error.log())
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_hook_error_mentions_hook_and_frame() {
        let error = RuntimeError::FrameHook {
            hook: "spin".into(),
            frame: 7,
            source: anyhow::anyhow!("boom"),
        };
        let text = error.to_string();
        assert!(text.contains("spin"));
        assert!(text.contains("frame 7"));
        assert!(text.contains("boom"));
    }
}
