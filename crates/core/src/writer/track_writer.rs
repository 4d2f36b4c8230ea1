use crate::shared::media_time::MediaTime;
use crate::shared::sample_buffer::{MediaKind, SampleBuffer};
use crate::writer::domain::track_input::TrackInput;
use crate::writer::session_stats::TrackStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    NotReady,
    OutOfOrder,
    Failed,
}

/// Wraps one track input for the duration of a session.
///
/// Keeps each track's committed times strictly increasing and never waits
/// on the input: a busy input means the sample is dropped.
pub struct TrackWriter {
    input: Box<dyn TrackInput>,
    last_time: Option<MediaTime>,
    stats: TrackStats,
}

impl TrackWriter {
    pub fn new(input: Box<dyn TrackInput>) -> Self {
        Self {
            input,
            last_time: None,
            stats: TrackStats::default(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.input.kind()
    }

    pub fn is_ready(&self) -> bool {
        self.input.is_ready_for_more_media_data()
    }

    pub fn stats(&self) -> TrackStats {
        self.stats
    }

    pub fn last_time(&self) -> Option<MediaTime> {
        self.last_time
    }

    /// `time` is relative to the session origin.
    pub fn append(&mut self, buffer: SampleBuffer, time: MediaTime) -> AppendOutcome {
        if time.is_negative() || self.last_time.is_some_and(|last| time <= last) {
            self.stats.dropped_out_of_order += 1;
            log::trace!("Dropping out-of-order {} sample at {time}", self.kind());
            return AppendOutcome::OutOfOrder;
        }

        if !self.is_ready() {
            self.stats.dropped_not_ready += 1;
            log::trace!("{} input not ready, dropping sample at {time}", self.kind());
            return AppendOutcome::NotReady;
        }

        match self.input.append(buffer, time) {
            Ok(()) => {
                self.last_time = Some(time);
                self.stats.appended += 1;
                AppendOutcome::Appended
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("Failed to append {} sample at {time}: {e}", self.kind());
                AppendOutcome::Failed
            }
        }
    }

    /// Counts a sample whose time cannot be expressed relative to the
    /// session origin.
    pub fn drop_unrepresentable(&mut self, presentation_time: MediaTime) {
        self.stats.dropped_out_of_order += 1;
        log::trace!(
            "Dropping {} sample at {presentation_time}: outside the session time range",
            self.kind()
        );
    }

    /// Closes the input; samples it already accepted are still written.
    pub fn finish(mut self) -> TrackStats {
        self.input.mark_as_finished();
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::audio_chunk::AudioChunk;
    use crate::shared::camera_error::BoxError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    #[derive(Default)]
    struct Shared {
        appended: Mutex<Vec<MediaTime>>,
        busy: AtomicBool,
        failing: AtomicBool,
        finished: AtomicBool,
    }

    struct StubInput {
        shared: Arc<Shared>,
    }

    impl TrackInput for StubInput {
        fn kind(&self) -> MediaKind {
            MediaKind::Audio
        }

        fn is_ready_for_more_media_data(&self) -> bool {
            !self.shared.busy.load(Ordering::SeqCst)
        }

        fn append(&mut self, _buffer: SampleBuffer, time: MediaTime) -> Result<(), BoxError> {
            if self.shared.failing.load(Ordering::SeqCst) {
                return Err("encoder gone".into());
            }
            self.shared.appended.lock().unwrap().push(time);
            Ok(())
        }

        fn mark_as_finished(&mut self) {
            self.shared.finished.store(true, Ordering::SeqCst);
        }
    }

    // --- Helpers ---

    fn writer() -> (TrackWriter, Arc<Shared>) {
        let shared = Arc::new(Shared::default());
        let input = StubInput {
            shared: shared.clone(),
        };
        (TrackWriter::new(Box::new(input)), shared)
    }

    fn sample() -> SampleBuffer {
        SampleBuffer::audio(AudioChunk::silence(1024, 44100, 1).unwrap(), MediaTime::ZERO)
    }

    fn ms(value: i64) -> MediaTime {
        MediaTime::new(value, 1000)
    }

    // --- Tests ---

    #[test]
    fn test_appends_increasing_times() {
        let (mut w, shared) = writer();
        assert_eq!(w.append(sample(), ms(0)), AppendOutcome::Appended);
        assert_eq!(w.append(sample(), ms(23)), AppendOutcome::Appended);
        assert_eq!(*shared.appended.lock().unwrap(), vec![ms(0), ms(23)]);
        assert_eq!(w.stats().appended, 2);
        assert_eq!(w.last_time(), Some(ms(23)));
    }

    #[test]
    fn test_drops_repeated_and_earlier_times() {
        let (mut w, shared) = writer();
        w.append(sample(), ms(10));
        assert_eq!(w.append(sample(), ms(10)), AppendOutcome::OutOfOrder);
        assert_eq!(w.append(sample(), ms(5)), AppendOutcome::OutOfOrder);
        assert_eq!(shared.appended.lock().unwrap().len(), 1);
        assert_eq!(w.stats().dropped_out_of_order, 2);
    }

    #[test]
    fn test_drops_negative_time() {
        let (mut w, _) = writer();
        assert_eq!(w.append(sample(), ms(-1)), AppendOutcome::OutOfOrder);
        assert_eq!(w.last_time(), None);
    }

    #[test]
    fn test_drops_when_not_ready_without_advancing_time() {
        let (mut w, shared) = writer();
        shared.busy.store(true, Ordering::SeqCst);
        assert!(!w.is_ready());
        assert_eq!(w.append(sample(), ms(0)), AppendOutcome::NotReady);
        shared.busy.store(false, Ordering::SeqCst);
        assert_eq!(w.append(sample(), ms(0)), AppendOutcome::Appended);
        assert_eq!(w.stats().dropped_not_ready, 1);
    }

    #[test]
    fn test_backend_failure_is_counted() {
        let (mut w, shared) = writer();
        shared.failing.store(true, Ordering::SeqCst);
        assert_eq!(w.append(sample(), ms(0)), AppendOutcome::Failed);
        assert_eq!(w.stats().failed, 1);
        assert_eq!(w.last_time(), None);
    }

    #[test]
    fn test_finish_marks_input_finished() {
        let (mut w, shared) = writer();
        w.append(sample(), ms(0));
        let stats = w.finish();
        assert!(shared.finished.load(Ordering::SeqCst));
        assert_eq!(stats.appended, 1);
    }
}
