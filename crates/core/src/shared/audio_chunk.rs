use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AudioChunkError {
    #[error("audio chunk must have at least one channel")]
    NoChannels,
    #[error("audio sample rate must be between 1 and {max} Hz, got {0}", max = i32::MAX)]
    InvalidSampleRate(u32),
    #[error("{samples} samples do not interleave evenly over {channels} channels")]
    RaggedInterleaving { samples: usize, channels: u16 },
}

/// A chunk of uncompressed audio: interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioChunk {
    pub fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioChunkError> {
        if channels == 0 {
            return Err(AudioChunkError::NoChannels);
        }
        if sample_rate == 0 || i32::try_from(sample_rate).is_err() {
            return Err(AudioChunkError::InvalidSampleRate(sample_rate));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioChunkError::RaggedInterleaving {
                samples: samples.len(),
                channels,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn silence(
        frames: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioChunkError> {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}
