use std::path::PathBuf;

use thiserror::Error;

use crate::shared::media_time::MediaTime;
use crate::shared::sample_buffer::MediaKind;
use crate::writer::infrastructure::container_format::ContainerFormat;

/// Failures inside the FFmpeg container backend.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("cannot infer container format from {0}; use .mp4, .m4v, .mov or .mkv")]
    UnknownFormat(PathBuf),
    #[error("{codec} {kind} cannot be stored in a {format} container")]
    IncompatibleCodec {
        kind: MediaKind,
        codec: String,
        format: ContainerFormat,
    },
    #[error("no {0} encoder available in this FFmpeg build")]
    EncoderNotFound(String),
    #[error("a {0} input is already attached")]
    DuplicateInput(MediaKind),
    #[error("inputs cannot be added after writing has started")]
    AlreadyStarted,
    #[error("container writing was never started")]
    NotStarted,
    #[error("{expected} input cannot accept a {actual} sample")]
    WrongMediaKind {
        expected: MediaKind,
        actual: MediaKind,
    },
    #[error("{0} input is not ready for more media data")]
    QueueFull(MediaKind),
    #[error("{0} input was marked as finished")]
    InputFinished(MediaKind),
    #[error("muxer thread has stopped")]
    MuxerStopped,
    #[error("muxer thread panicked")]
    MuxerPanicked,
    #[error("audio chunk is {actual_rate} Hz x{actual_channels}, track expects {rate} Hz x{channels}")]
    AudioFormatMismatch {
        rate: u32,
        channels: u16,
        actual_rate: u32,
        actual_channels: u16,
    },
    #[error("frame data is {actual} bytes, expected {expected} for its dimensions")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("sample time {0} does not fit the stream time base")]
    TimestampOutOfRange(MediaTime),
    #[error("output stream {0} is missing")]
    MissingStream(usize),
    #[error("failed to remove stale output {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Ffmpeg(#[from] ffmpeg_next::Error),
}
