use crate::shared::camera_error::BoxError;
use crate::shared::media_time::MediaTime;
use crate::shared::sample_buffer::{MediaKind, SampleBuffer};

/// One encoder input attached to a container.
///
/// Implementations must answer `is_ready_for_more_media_data` without
/// blocking and accept an `append` without blocking whenever they reported
/// ready.
pub trait TrackInput: Send {
    fn kind(&self) -> MediaKind;

    fn is_ready_for_more_media_data(&self) -> bool;

    /// `time` is relative to the session origin.
    fn append(&mut self, buffer: SampleBuffer, time: MediaTime) -> Result<(), BoxError>;

    /// No more samples will follow. Already accepted samples are still written.
    fn mark_as_finished(&mut self);
}
