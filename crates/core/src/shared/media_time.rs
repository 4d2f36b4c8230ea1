use std::cmp::Ordering;
use std::fmt;

/// Common timescale used when two times with unrelated timescales are combined.
pub const NANOSECOND_TIMESCALE: i32 = 1_000_000_000;

/// A rational timestamp: `value / timescale` seconds.
///
/// Equality and ordering compare the rational value, so `1/2` and `2/4`
/// are the same instant.
#[derive(Clone, Copy, Debug)]
pub struct MediaTime {
    value: i64,
    timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    pub fn new(value: i64, timescale: i32) -> Self {
        assert!(timescale > 0, "timescale must be positive");
        Self { value, timescale }
    }

    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        Self::new((seconds * timescale as f64).round() as i64, timescale)
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    pub fn as_seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Integer tick count of this time in `timescale`, rounded to nearest,
    /// or `None` if it does not fit in an `i64`.
    pub fn checked_rescale(&self, timescale: i32) -> Option<i64> {
        if timescale == self.timescale {
            return Some(self.value);
        }
        let num = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        let rounded = if num >= 0 {
            (num + den / 2) / den
        } else {
            (num - den / 2) / den
        };
        i64::try_from(rounded).ok()
    }

    /// Like `checked_rescale`, saturating at the `i64` bounds.
    pub fn rescale(&self, timescale: i32) -> i64 {
        self.checked_rescale(timescale).unwrap_or(if self.value < 0 {
            i64::MIN
        } else {
            i64::MAX
        })
    }

    /// Difference `self - other`, expressed in a timescale both can share.
    pub fn checked_sub(&self, other: MediaTime) -> Option<MediaTime> {
        let timescale = common_timescale(self.timescale, other.timescale);
        let lhs = self.checked_rescale(timescale)?;
        let rhs = other.checked_rescale(timescale)?;
        lhs.checked_sub(rhs).map(|value| MediaTime::new(value, timescale))
    }

    pub fn checked_add(&self, other: MediaTime) -> Option<MediaTime> {
        let timescale = common_timescale(self.timescale, other.timescale);
        let lhs = self.checked_rescale(timescale)?;
        let rhs = other.checked_rescale(timescale)?;
        lhs.checked_add(rhs).map(|value| MediaTime::new(value, timescale))
    }

    fn cross(&self, other: &MediaTime) -> (i128, i128) {
        (
            self.value as i128 * other.timescale as i128,
            other.value as i128 * self.timescale as i128,
        )
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn common_timescale(a: i32, b: i32) -> i32 {
    if a == b {
        return a;
    }
    let lcm = (a as i64 / gcd(a as i64, b as i64)) * b as i64;
    i32::try_from(lcm).unwrap_or(NANOSECOND_TIMESCALE)
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        let (lhs, rhs) = self.cross(other);
        lhs == rhs
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = self.cross(other);
        lhs.cmp(&rhs)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.3}s)", self.value, self.timescale, self.as_seconds())
    }
}
