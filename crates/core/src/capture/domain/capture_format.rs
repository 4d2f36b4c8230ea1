/// A closed range of frame rates a capture format can deliver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRateRange {
    pub min: f64,
    pub max: f64,
}

impl FrameRateRange {
    pub fn new(min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "min frame rate must not exceed max");
        Self { min, max }
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.min && rate <= self.max
    }
}

/// One capture format offered by a device: resolution plus supported rates.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate_ranges: Vec<FrameRateRange>,
}

impl CaptureFormat {
    pub fn new(width: u32, height: u32, frame_rate_ranges: Vec<FrameRateRange>) -> Self {
        Self {
            width,
            height,
            frame_rate_ranges,
        }
    }

    /// Highest rate any range of this format reaches; 0 when it has none.
    pub fn max_frame_rate(&self) -> f64 {
        self.frame_rate_ranges
            .iter()
            .map(|r| r.max)
            .fold(0.0, f64::max)
    }

    pub fn supports_frame_rate(&self, rate: f64) -> bool {
        self.frame_rate_ranges.iter().any(|r| r.contains(rate))
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
