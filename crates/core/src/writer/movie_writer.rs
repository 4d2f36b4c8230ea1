use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::dispatch::dispatch_queue::DispatchQueue;
use crate::shared::camera_error::{CameraError, FinalizationError};
use crate::shared::sample_buffer::{MediaKind, SampleBuffer};
use crate::shared::writer_configuration::WriterConfiguration;
use crate::writer::domain::container_writer::{ContainerWriter, ContainerWriterFactory};
use crate::writer::domain::movie_writer_delegate::MovieWriterDelegate;
use crate::writer::domain::session_clock::SessionClock;
use crate::writer::domain::writing_state::{AtomicWritingState, WritingState};
use crate::writer::infrastructure::ffmpeg_container_writer::FfmpegContainerWriterFactory;
use crate::writer::session_stats::SessionStats;
use crate::writer::track_writer::TrackWriter;

/// Multiplexes live video and audio sample buffers into one movie file per
/// writing session.
///
/// Capture callbacks on any thread feed `process_sample_buffer`; a control
/// thread brackets sessions with `start_writing` / `stop_writing`. All state
/// transitions happen under one lock, and producers are never made to wait
/// on encoding or I/O: buffers that cannot be taken immediately are dropped.
///
/// Finalization runs on the dispatch queue passed at construction, and the
/// delegate is notified there once per session.
pub struct MovieWriter {
    shared: Arc<Shared>,
    queue: DispatchQueue,
}

struct Shared {
    configuration: WriterConfiguration,
    factory: Box<dyn ContainerWriterFactory>,
    state: AtomicWritingState,
    dropped_inactive: AtomicU64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    session: Option<Session>,
    clock: SessionClock,
    delegate: Option<Weak<dyn MovieWriterDelegate>>,
    last_stats: SessionStats,
}

/// Resources owned for one Idle → Writing → Idle cycle.
struct Session {
    container: Box<dyn ContainerWriter>,
    video: Option<TrackWriter>,
    audio: Option<TrackWriter>,
}

impl Session {
    fn track_mut(&mut self, kind: MediaKind) -> Option<&mut TrackWriter> {
        match kind {
            MediaKind::Video => self.video.as_mut(),
            MediaKind::Audio => self.audio.as_mut(),
        }
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            video: self.video.as_ref().map(TrackWriter::stats).unwrap_or_default(),
            audio: self.audio.as_ref().map(TrackWriter::stats).unwrap_or_default(),
            dropped_inactive: 0,
        }
    }
}

impl MovieWriter {
    pub fn new(
        configuration: WriterConfiguration,
        factory: Box<dyn ContainerWriterFactory>,
        queue: DispatchQueue,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                configuration,
                factory,
                state: AtomicWritingState::default(),
                dropped_inactive: AtomicU64::new(0),
                inner: Mutex::new(Inner::default()),
            }),
            queue,
        }
    }

    /// Writes with the FFmpeg backend to `output_path`, replacing any file
    /// already there when a session starts.
    pub fn with_output(
        configuration: WriterConfiguration,
        output_path: impl Into<PathBuf>,
        queue: DispatchQueue,
    ) -> Self {
        Self::new(
            configuration,
            Box::new(FfmpegContainerWriterFactory::new(output_path)),
            queue,
        )
    }

    pub fn configuration(&self) -> &WriterConfiguration {
        &self.shared.configuration
    }

    /// Holds `delegate` weakly; the caller keeps it alive.
    pub fn set_delegate(&self, delegate: &Arc<dyn MovieWriterDelegate>) {
        self.shared.lock().delegate = Some(Arc::downgrade(delegate));
    }

    pub fn clear_delegate(&self) {
        self.shared.lock().delegate = None;
    }

    pub fn is_writing(&self) -> bool {
        self.shared.state.load() == WritingState::Writing
    }

    pub fn writing_state(&self) -> WritingState {
        self.shared.state.load()
    }

    /// Counters for the current session, or the last finished one.
    pub fn stats(&self) -> SessionStats {
        let inner = self.shared.lock();
        let mut stats = match inner.session {
            Some(ref session) => session.stats(),
            None => inner.last_stats,
        };
        stats.dropped_inactive = self.shared.dropped_inactive.load(Ordering::Relaxed);
        stats
    }

    /// Opens a new container and its track inputs and starts accepting
    /// sample buffers.
    ///
    /// A no-op while a session is writing or finishing. On failure nothing
    /// is retained and the writer stays idle.
    pub fn start_writing(&self) -> Result<(), CameraError> {
        let mut inner = self.shared.lock();

        let state = self.shared.state.load();
        if state != WritingState::Idle {
            log::warn!("start_writing ignored: writer is {state}");
            return Ok(());
        }

        let session = self.shared.open_session()?;
        log::info!(
            "Started writing movie to {}",
            session.container.output_path().display()
        );

        inner.session = Some(session);
        inner.clock.reset();
        inner.last_stats = SessionStats::default();
        self.shared.dropped_inactive.store(0, Ordering::Relaxed);
        self.shared.state.store(WritingState::Writing);
        Ok(())
    }

    /// Ends the session. Finalization happens asynchronously on the dispatch
    /// queue; the delegate learns the outcome. A no-op unless writing.
    pub fn stop_writing(&self) {
        let session = {
            let mut inner = self.shared.lock();
            let state = self.shared.state.load();
            if state != WritingState::Writing {
                log::warn!("stop_writing ignored: writer is {state}");
                return;
            }
            let Some(session) = inner.session.take() else {
                self.shared.state.store(WritingState::Idle);
                return;
            };
            self.shared.state.store(WritingState::Finishing);
            session
        };

        log::info!("Stopping movie writer, finalizing on '{}'", self.queue.label());
        let shared = self.shared.clone();
        self.queue.dispatch(move || shared.finish_session(session));
    }

    /// Feeds one sample buffer. Never blocks on encoding and never fails:
    /// buffers that cannot be written right now are dropped.
    pub fn process_sample_buffer(&self, buffer: SampleBuffer) {
        if self.shared.state.load() != WritingState::Writing {
            self.shared.count_inactive();
            return;
        }

        let mut guard = self.shared.lock();
        // Re-checked under the lock: stop_writing may have won the race.
        if self.shared.state.load() != WritingState::Writing {
            drop(guard);
            self.shared.count_inactive();
            return;
        }

        let inner = &mut *guard;
        let Some(session) = inner.session.as_mut() else {
            return;
        };

        let kind = buffer.kind();
        let presentation_time = buffer.presentation_time();

        if session.track_mut(kind).is_none() {
            log::trace!("No {kind} track configured, discarding sample");
            self.shared.count_inactive();
            return;
        }

        if inner.clock.start_if_unset(presentation_time) {
            log::debug!("Session origin set from first {kind} sample at {presentation_time}");
            session.container.start_session_at(presentation_time);
        }

        let relative = inner.clock.relative(presentation_time);
        if let Some(track) = session.track_mut(kind) {
            match relative {
                Some(relative) => {
                    track.append(buffer, relative);
                }
                None => track.drop_unrepresentable(presentation_time),
            }
        }
    }
}

impl Drop for MovieWriter {
    fn drop(&mut self) {
        if self.is_writing() {
            log::warn!("MovieWriter dropped while writing; finalizing session");
            self.stop_writing();
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count_inactive(&self) {
        self.dropped_inactive.fetch_add(1, Ordering::Relaxed);
    }

    fn open_session(&self) -> Result<Session, CameraError> {
        let mut container =
            self.factory
                .create_writer()
                .map_err(|source| CameraError::FailedToAddOutput {
                    path: self.factory.output_path(),
                    source,
                })?;

        let video = match self
            .configuration
            .video()
            .map(|settings| container.add_video_input(settings))
            .transpose()
        {
            Ok(input) => input.map(TrackWriter::new),
            Err(source) => {
                container.cancel_writing();
                return Err(CameraError::FailedToAddInput {
                    track: MediaKind::Video,
                    source,
                });
            }
        };

        let audio = match self
            .configuration
            .audio()
            .map(|settings| container.add_audio_input(settings))
            .transpose()
        {
            Ok(input) => input.map(TrackWriter::new),
            Err(source) => {
                drop(video);
                container.cancel_writing();
                return Err(CameraError::FailedToAddInput {
                    track: MediaKind::Audio,
                    source,
                });
            }
        };

        if let Err(source) = container.start_writing() {
            let path = container.output_path().to_path_buf();
            drop(video);
            drop(audio);
            container.cancel_writing();
            return Err(CameraError::FailedToAddOutput { path, source });
        }

        Ok(Session {
            container,
            video,
            audio,
        })
    }

    /// Runs on the dispatch queue: drains and closes the container, returns
    /// to idle, then tells the delegate. A panicking backend is reported as
    /// a failed session.
    fn finish_session(&self, session: Session) {
        let path = session.container.output_path().to_path_buf();
        let finished = panic::catch_unwind(AssertUnwindSafe(|| {
            let Session {
                container,
                video,
                audio,
            } = session;
            let stats = SessionStats {
                video: video.map(TrackWriter::finish).unwrap_or_default(),
                audio: audio.map(TrackWriter::finish).unwrap_or_default(),
                dropped_inactive: 0,
            };
            (stats, container.finish_writing())
        }));
        let (mut stats, result) = match finished {
            Ok(finished) => finished,
            Err(_) => (
                SessionStats::default(),
                Err("container writer panicked while finalizing".into()),
            ),
        };

        let delegate = {
            let mut inner = self.lock();
            stats.dropped_inactive = self.dropped_inactive.load(Ordering::Relaxed);
            inner.last_stats = stats;
            self.state.store(WritingState::Idle);
            inner.delegate.as_ref().and_then(Weak::upgrade)
        };

        log::info!("{}", stats.summary_string());

        match result {
            Ok(output) => {
                log::info!("Movie written to {}", output.display());
                match delegate {
                    Some(delegate) => delegate.did_write_movie(&output),
                    None => log::debug!("No delegate to notify"),
                }
            }
            Err(source) => {
                let error = FinalizationError { path, source };
                match delegate {
                    Some(delegate) => delegate.did_fail_writing(&error),
                    None => log::error!("Movie writing failed: {error}"),
                }
            }
        }
    }
}
