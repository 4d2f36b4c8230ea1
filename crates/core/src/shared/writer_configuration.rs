use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_AUDIO_BIT_RATE, DEFAULT_AUDIO_CHANNELS, DEFAULT_AUDIO_SAMPLE_RATE,
    DEFAULT_MAX_KEYFRAME_INTERVAL, DEFAULT_VIDEO_BIT_RATE, DEFAULT_VIDEO_FRAME_RATE,
    DEFAULT_VIDEO_HEIGHT, DEFAULT_VIDEO_WIDTH, MAX_VIDEO_FRAME_RATE, SUPPORTED_SAMPLE_RATES,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("video dimensions must be non-zero and even, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("{track} bit rate must be non-zero")]
    InvalidBitRate { track: &'static str },
    #[error(
        "video frame rate must be between 1 and {max} fps, got {0}",
        max = MAX_VIDEO_FRAME_RATE
    )]
    InvalidFrameRate(u32),
    #[error("unsupported audio sample rate {0} Hz")]
    UnsupportedSampleRate(u32),
    #[error("audio must have 1 or 2 channels, got {0}")]
    UnsupportedChannelCount(u16),
    #[error("configuration has neither video nor audio settings")]
    NoTracks,
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    Mpeg4,
    Mjpeg,
}

impl VideoCodec {
    pub const ALL: &[VideoCodec] = &[
        VideoCodec::H264,
        VideoCodec::Hevc,
        VideoCodec::Mpeg4,
        VideoCodec::Mjpeg,
    ];
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "H.264"),
            VideoCodec::Hevc => write!(f, "HEVC"),
            VideoCodec::Mpeg4 => write!(f, "MPEG-4"),
            VideoCodec::Mjpeg => write!(f, "Motion JPEG"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    #[serde(rename = "lpcm")]
    LinearPcm,
}

impl AudioCodec {
    pub const ALL: &[AudioCodec] = &[AudioCodec::Aac, AudioCodec::LinearPcm];
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCodec::Aac => write!(f, "AAC"),
            AudioCodec::LinearPcm => write!(f, "Linear PCM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Target average bit rate in bits per second.
    pub bit_rate: u32,
    /// Expected capture rate; the encoder's rate control is tuned for it.
    pub frame_rate: u32,
    pub max_keyframe_interval: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            width: DEFAULT_VIDEO_WIDTH,
            height: DEFAULT_VIDEO_HEIGHT,
            bit_rate: DEFAULT_VIDEO_BIT_RATE,
            frame_rate: DEFAULT_VIDEO_FRAME_RATE,
            max_keyframe_interval: DEFAULT_MAX_KEYFRAME_INTERVAL,
        }
    }
}

impl VideoSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(SettingsError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.bit_rate == 0 {
            return Err(SettingsError::InvalidBitRate { track: "video" });
        }
        if !(1..=MAX_VIDEO_FRAME_RATE).contains(&self.frame_rate) {
            return Err(SettingsError::InvalidFrameRate(self.frame_rate));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u16,
    /// Ignored by linear PCM.
    pub bit_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Aac,
            sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            channels: DEFAULT_AUDIO_CHANNELS,
            bit_rate: DEFAULT_AUDIO_BIT_RATE,
        }
    }
}

impl AudioSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(SettingsError::UnsupportedSampleRate(self.sample_rate));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(SettingsError::UnsupportedChannelCount(self.channels));
        }
        if self.codec == AudioCodec::Aac && self.bit_rate == 0 {
            return Err(SettingsError::InvalidBitRate { track: "audio" });
        }
        Ok(())
    }
}

/// Encoder settings for one writer. Either track may be absent for
/// video-only or audio-only capture, but not both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfiguration {
    #[serde(default)]
    video: Option<VideoSettings>,
    #[serde(default)]
    audio: Option<AudioSettings>,
}

impl WriterConfiguration {
    pub fn new(
        video: Option<VideoSettings>,
        audio: Option<AudioSettings>,
    ) -> Result<Self, SettingsError> {
        let config = Self { video, audio };
        config.validate()?;
        Ok(config)
    }

    pub fn video_only(video: VideoSettings) -> Result<Self, SettingsError> {
        Self::new(Some(video), None)
    }

    pub fn audio_only(audio: AudioSettings) -> Result<Self, SettingsError> {
        Self::new(None, Some(audio))
    }

    pub fn video(&self) -> Option<&VideoSettings> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&AudioSettings> {
        self.audio.as_ref()
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.video.is_none() && self.audio.is_none() {
            return Err(SettingsError::NoTracks);
        }
        if let Some(ref video) = self.video {
            video.validate()?;
        }
        if let Some(ref audio) = self.audio {
            audio.validate()?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let config: Self = serde_json::from_str(json).map_err(SettingsError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(SettingsError::Parse)
    }
}

impl Default for WriterConfiguration {
    fn default() -> Self {
        Self {
            video: Some(VideoSettings::default()),
            audio: Some(AudioSettings::default()),
        }
    }
}
