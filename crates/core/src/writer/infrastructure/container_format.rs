use std::fmt;
use std::path::Path;

use crate::shared::writer_configuration::{AudioCodec, VideoCodec};
use crate::writer::infrastructure::container_error::ContainerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    QuickTime,
    Matroska,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> Result<Self, ContainerError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mp4" | "m4v") => Ok(ContainerFormat::Mp4),
            Some("mov" | "qt") => Ok(ContainerFormat::QuickTime),
            Some("mkv") => Ok(ContainerFormat::Matroska),
            _ => Err(ContainerError::UnknownFormat(path.to_path_buf())),
        }
    }

    /// FFmpeg muxer short name.
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::QuickTime => "mov",
            ContainerFormat::Matroska => "matroska",
        }
    }

    pub fn supports_video(&self, codec: VideoCodec) -> bool {
        match self {
            ContainerFormat::Mp4 => codec != VideoCodec::Mjpeg,
            ContainerFormat::QuickTime | ContainerFormat::Matroska => true,
        }
    }

    pub fn supports_audio(&self, codec: AudioCodec) -> bool {
        match self {
            ContainerFormat::Mp4 => codec == AudioCodec::Aac,
            ContainerFormat::QuickTime | ContainerFormat::Matroska => true,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Mp4 => write!(f, "MP4"),
            ContainerFormat::QuickTime => write!(f, "QuickTime"),
            ContainerFormat::Matroska => write!(f, "Matroska"),
        }
    }
}
