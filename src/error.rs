// error.rs — error types shared by the core and the host

use thiserror::Error;

/// Errors surfaced by the projection core to its host.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewerError {
    /// The identifier is not one of the known projection names. The current
    /// projection has already been forced to `NONE` when this is returned.
    #[error("unknown projection identifier `{0}`, falling back to NONE")]
    UnknownProjection(String),

    /// The frame source refused pixel access. Fatal for the playback session.
    #[error("frame source not permitted: {0}")]
    SourceNotPermitted(String),

    /// The core was torn down and no longer accepts work.
    #[error("viewer has been torn down")]
    TornDown,
}

/// Failures reading pixels out of a frame source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("pixel access refused for `{0}`")]
    NotPermitted(String),

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing value for command line flag `{0}`")]
    MissingValue(String),
}

impl From<FrameError> for ViewerError {
    fn from(err: FrameError) -> Self {
        ViewerError::SourceNotPermitted(err.to_string())
    }
}
