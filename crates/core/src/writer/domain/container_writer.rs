use std::path::{Path, PathBuf};

use crate::shared::camera_error::BoxError;
use crate::shared::media_time::MediaTime;
use crate::shared::writer_configuration::{AudioSettings, VideoSettings};
use crate::writer::domain::track_input::TrackInput;

/// Abstracts the container file so the movie writer can multiplex tracks
/// without depending on a specific codec library.
///
/// Call order for one session: `add_*_input` → `start_writing` →
/// `start_session_at` → appends through the track inputs →
/// `finish_writing` (or `cancel_writing` at any point).
pub trait ContainerWriter: Send {
    fn output_path(&self) -> &Path;

    /// Fails when the settings are incompatible with the container format or
    /// the encoder cannot be opened.
    fn add_video_input(&mut self, settings: &VideoSettings) -> Result<Box<dyn TrackInput>, BoxError>;

    fn add_audio_input(&mut self, settings: &AudioSettings) -> Result<Box<dyn TrackInput>, BoxError>;

    fn start_writing(&mut self) -> Result<(), BoxError>;

    /// Marks the source time that maps to zero in the output.
    fn start_session_at(&mut self, origin: MediaTime);

    /// Writes out everything accepted so far and closes the file.
    fn finish_writing(self: Box<Self>) -> Result<PathBuf, BoxError>;

    /// Abandons the session and removes any partial output.
    fn cancel_writing(self: Box<Self>);
}

/// Creates one fresh container writer per writing session.
pub trait ContainerWriterFactory: Send + Sync {
    fn create_writer(&self) -> Result<Box<dyn ContainerWriter>, BoxError>;

    /// Where the next container will be written.
    fn output_path(&self) -> PathBuf;
}
