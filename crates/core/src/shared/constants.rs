/// Frame rates above this count as high-frame-rate capture.
pub const HIGH_FRAME_RATE_THRESHOLD: f64 = 30.0;

pub const DEFAULT_VIDEO_WIDTH: u32 = 1280;
pub const DEFAULT_VIDEO_HEIGHT: u32 = 720;
pub const DEFAULT_VIDEO_FRAME_RATE: u32 = 30;
pub const MAX_VIDEO_FRAME_RATE: u32 = 1_000;
pub const DEFAULT_VIDEO_BIT_RATE: u32 = 5_000_000;
pub const DEFAULT_MAX_KEYFRAME_INTERVAL: u32 = 30;

pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_AUDIO_CHANNELS: u16 = 2;
pub const DEFAULT_AUDIO_BIT_RATE: u32 = 128_000;

pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[8_000, 16_000, 22_050, 32_000, 44_100, 48_000];

/// Pending samples a track queue holds before the track reports not ready.
pub const VIDEO_QUEUE_CAPACITY: usize = 8;
pub const AUDIO_QUEUE_CAPACITY: usize = 32;

/// Samples per audio frame when the encoder does not dictate a size.
pub const DEFAULT_AUDIO_FRAME_SIZE: usize = 1024;

/// Video encoder time base denominator (millisecond ticks).
pub const VIDEO_TIMESCALE: i32 = 1000;
