use std::path::Path;

use crate::shared::camera_error::FinalizationError;

/// Observer notified when a writing session has been finalized.
///
/// Called on the writer's dispatch queue, never from inside `stop_writing`.
pub trait MovieWriterDelegate: Send + Sync {
    /// The movie at `output` is flushed, closed and ready to use.
    fn did_write_movie(&self, output: &Path);

    /// Finalization failed; `did_write_movie` will not be called for this
    /// session.
    fn did_fail_writing(&self, error: &FinalizationError) {
        log::error!("Movie writing failed: {error}");
    }
}
