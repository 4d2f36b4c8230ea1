use crate::capture::domain::capture_format::CaptureFormat;
use crate::shared::camera_error::CameraError;
use crate::shared::constants::HIGH_FRAME_RATE_THRESHOLD;
use crate::shared::media_time::MediaTime;

/// Timescale used for frame durations; divisible by all common capture rates.
const FRAME_DURATION_TIMESCALE: i32 = 600_000;

/// The outcome of picking a capture format and rate before writing begins.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRateSelection {
    pub format_index: usize,
    pub frame_rate: f64,
    /// Both the minimum and maximum frame duration to lock the device to.
    pub frame_duration: MediaTime,
}

pub fn frame_duration(frame_rate: f64) -> MediaTime {
    MediaTime::new(
        (FRAME_DURATION_TIMESCALE as f64 / frame_rate).round() as i64,
        FRAME_DURATION_TIMESCALE,
    )
}

/// True when any format can capture faster than 30 fps.
pub fn supports_high_frame_rate(formats: &[CaptureFormat]) -> bool {
    formats
        .iter()
        .any(|f| f.max_frame_rate() > HIGH_FRAME_RATE_THRESHOLD)
}

/// Checks `requested` against the format the device is currently using.
pub fn validate_frame_rate(active: &CaptureFormat, requested: f64) -> Result<MediaTime, CameraError> {
    if requested > 0.0 && active.supports_frame_rate(requested) {
        Ok(frame_duration(requested))
    } else {
        Err(CameraError::HighFrameRateCaptureNotSupported {
            requested,
            max: active.max_frame_rate(),
        })
    }
}

/// Picks the smallest format that can deliver `requested` fps.
pub fn select_format_for_frame_rate(
    formats: &[CaptureFormat],
    requested: f64,
) -> Result<FrameRateSelection, CameraError> {
    formats
        .iter()
        .enumerate()
        .filter(|(_, f)| requested > 0.0 && f.supports_frame_rate(requested))
        .min_by_key(|(_, f)| f.area())
        .map(|(format_index, _)| FrameRateSelection {
            format_index,
            frame_rate: requested,
            frame_duration: frame_duration(requested),
        })
        .ok_or_else(|| CameraError::HighFrameRateCaptureNotSupported {
            requested,
            max: best_rate(formats),
        })
}

/// Picks the format with the highest frame rate, as long as it is a
/// high-frame-rate format. Ties go to the larger resolution.
pub fn enable_high_frame_rate_capture(
    formats: &[CaptureFormat],
) -> Result<FrameRateSelection, CameraError> {
    let best = formats.iter().enumerate().max_by(|(_, a), (_, b)| {
        a.max_frame_rate()
            .total_cmp(&b.max_frame_rate())
            .then(a.area().cmp(&b.area()))
    });

    match best {
        Some((format_index, format)) if format.max_frame_rate() > HIGH_FRAME_RATE_THRESHOLD => {
            let frame_rate = format.max_frame_rate();
            log::info!(
                "Enabling high frame rate capture: {}x{} @ {frame_rate} fps",
                format.width,
                format.height
            );
            Ok(FrameRateSelection {
                format_index,
                frame_rate,
                frame_duration: frame_duration(frame_rate),
            })
        }
        _ => Err(CameraError::HighFrameRateCaptureNotSupported {
            requested: HIGH_FRAME_RATE_THRESHOLD,
            max: best_rate(formats),
        }),
    }
}

fn best_rate(formats: &[CaptureFormat]) -> f64 {
    formats
        .iter()
        .map(CaptureFormat::max_frame_rate)
        .fold(0.0, f64::max)
}
