use crate::shared::media_time::MediaTime;

/// Holds the time origin of one writing session: the presentation time of
/// the first accepted sample buffer.
#[derive(Clone, Debug, Default)]
pub struct SessionClock {
    origin: Option<MediaTime>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.origin = None;
    }

    pub fn origin(&self) -> Option<MediaTime> {
        self.origin
    }

    pub fn is_started(&self) -> bool {
        self.origin.is_some()
    }

    /// Sets the origin if it is still unset. Returns true only for the call
    /// that set it.
    pub fn start_if_unset(&mut self, presentation_time: MediaTime) -> bool {
        if self.origin.is_some() {
            return false;
        }
        self.origin = Some(presentation_time);
        true
    }

    /// Time of `presentation_time` relative to the origin, if one is set.
    pub fn relative(&self, presentation_time: MediaTime) -> Option<MediaTime> {
        self.origin
            .and_then(|origin| presentation_time.checked_sub(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_start_wins() {
        let mut clock = SessionClock::new();
        assert!(clock.start_if_unset(MediaTime::new(100, 600)));
        assert!(!clock.start_if_unset(MediaTime::new(50, 600)));
        assert_eq!(clock.origin(), Some(MediaTime::new(100, 600)));
    }

    #[test]
    fn test_relative_before_start_is_none() {
        let clock = SessionClock::new();
        assert!(!clock.is_started());
        assert_eq!(clock.relative(MediaTime::new(1, 1)), None);
    }

    #[test]
    fn test_relative_to_origin() {
        let mut clock = SessionClock::new();
        clock.start_if_unset(MediaTime::new(10, 1));
        assert_eq!(clock.relative(MediaTime::new(10, 1)), Some(MediaTime::ZERO));
        assert_eq!(
            clock.relative(MediaTime::new(21, 2)),
            Some(MediaTime::new(1, 2))
        );
        assert!(clock.relative(MediaTime::new(9, 1)).unwrap().is_negative());
    }

    #[test]
    fn test_reset_clears_origin() {
        let mut clock = SessionClock::new();
        clock.start_if_unset(MediaTime::new(5, 1));
        clock.reset();
        assert_eq!(clock.origin(), None);
        assert!(clock.start_if_unset(MediaTime::new(7, 1)));
        assert_eq!(clock.origin(), Some(MediaTime::new(7, 1)));
    }
}
