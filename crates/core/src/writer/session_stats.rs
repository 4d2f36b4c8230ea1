use crate::shared::sample_buffer::MediaKind;

/// Per-track counters for one writing session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackStats {
    pub appended: u64,
    /// Dropped because the encoder queue was full.
    pub dropped_not_ready: u64,
    /// Dropped because the time was not after the previous sample, or
    /// before the session origin.
    pub dropped_out_of_order: u64,
    /// Rejected by the backend after being routed to the track.
    pub failed: u64,
}

impl TrackStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_not_ready + self.dropped_out_of_order + self.failed
    }
}

/// Counters for one writing session, reported when it finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub video: TrackStats,
    pub audio: TrackStats,
    /// Discarded while not writing, or for a kind with no configured track.
    pub dropped_inactive: u64,
}

impl SessionStats {
    pub fn track(&self, kind: MediaKind) -> &TrackStats {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub fn track_mut(&mut self, kind: MediaKind) -> &mut TrackStats {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Human-readable summary for the end-of-session log line.
    pub fn summary_string(&self) -> String {
        let mut lines = vec!["Session summary:".to_string()];
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let t = self.track(kind);
            lines.push(format!(
                "  {kind:5}: {} appended, {} dropped (not ready {}, out of order {}, failed {})",
                t.appended,
                t.dropped(),
                t.dropped_not_ready,
                t.dropped_out_of_order,
                t.failed
            ));
        }
        if self.dropped_inactive > 0 {
            lines.push(format!("  inactive: {} discarded", self.dropped_inactive));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_sums_reasons() {
        let t = TrackStats {
            appended: 10,
            dropped_not_ready: 2,
            dropped_out_of_order: 1,
            failed: 3,
        };
        assert_eq!(t.dropped(), 6);
    }

    #[test]
    fn test_track_mut_routes_by_kind() {
        let mut stats = SessionStats::default();
        stats.track_mut(MediaKind::Audio).appended += 3;
        stats.track_mut(MediaKind::Video).dropped_not_ready += 1;
        assert_eq!(stats.audio.appended, 3);
        assert_eq!(stats.video.dropped_not_ready, 1);
        assert_eq!(stats.video.appended, 0);
    }

    #[test]
    fn test_summary_mentions_both_tracks() {
        let mut stats = SessionStats::default();
        stats.video.appended = 300;
        stats.audio.appended = 430;
        let summary = stats.summary_string();
        assert!(summary.contains("Session summary"));
        assert!(summary.contains("video: 300 appended"));
        assert!(summary.contains("audio: 430 appended"));
        assert!(!summary.contains("inactive"));
    }

    #[test]
    fn test_summary_includes_inactive_drops() {
        let stats = SessionStats {
            dropped_inactive: 4,
            ..SessionStats::default()
        };
        assert!(stats.summary_string().contains("inactive: 4 discarded"));
    }
}
