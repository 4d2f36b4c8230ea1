use std::path::PathBuf;

use thiserror::Error;

use crate::shared::sample_buffer::MediaKind;

/// Boxed error returned by backend ports; sendable across threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Setup failures reported to whoever configures capture or starts writing.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to add {track} input to the movie: {source}")]
    FailedToAddInput {
        track: MediaKind,
        #[source]
        source: BoxError,
    },
    #[error("failed to create movie output at {path}: {source}")]
    FailedToAddOutput {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("capture at {requested} fps is not supported (format maximum is {max} fps)")]
    HighFrameRateCaptureNotSupported { requested: f64, max: f64 },
}

impl CameraError {
    /// Stable numeric code for callers that surface errors outside Rust.
    pub fn code(&self) -> i32 {
        match self {
            CameraError::FailedToAddInput { .. } => 1000,
            CameraError::FailedToAddOutput { .. } => 1001,
            CameraError::HighFrameRateCaptureNotSupported { .. } => 1002,
        }
    }

    /// The track that failed, for `FailedToAddInput`.
    pub fn track(&self) -> Option<MediaKind> {
        match self {
            CameraError::FailedToAddInput { track, .. } => Some(*track),
            _ => None,
        }
    }
}

/// The container could not be flushed and closed at the end of a session.
#[derive(Error, Debug)]
#[error("failed to finish movie at {path}: {source}")]
pub struct FinalizationError {
    pub path: PathBuf,
    #[source]
    pub source: BoxError,
}
