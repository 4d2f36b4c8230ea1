use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::audio_chunk::AudioChunk;
use crate::shared::frame::Frame;
use crate::shared::media_time::MediaTime;

/// Which track a sample belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum SamplePayload {
    Video(Frame),
    Audio(AudioChunk),
}

/// One timestamped unit of media handed to the writer by a capture callback.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    presentation_time: MediaTime,
    duration: Option<MediaTime>,
    payload: SamplePayload,
}

impl SampleBuffer {
    pub fn video(frame: Frame, presentation_time: MediaTime) -> Self {
        Self {
            presentation_time,
            duration: None,
            payload: SamplePayload::Video(frame),
        }
    }

    /// Audio buffers carry their own duration, derived from the chunk length.
    pub fn audio(chunk: AudioChunk, presentation_time: MediaTime) -> Self {
        let duration = i32::try_from(chunk.sample_rate())
            .ok()
            .map(|rate| MediaTime::new(chunk.frames() as i64, rate));
        Self {
            presentation_time,
            duration,
            payload: SamplePayload::Audio(chunk),
        }
    }

    pub fn with_duration(mut self, duration: MediaTime) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn kind(&self) -> MediaKind {
        match self.payload {
            SamplePayload::Video(_) => MediaKind::Video,
            SamplePayload::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    pub fn duration(&self) -> Option<MediaTime> {
        self.duration
    }

    pub fn payload(&self) -> &SamplePayload {
        &self.payload
    }

    pub fn into_payload(self) -> SamplePayload {
        self.payload
    }
}
