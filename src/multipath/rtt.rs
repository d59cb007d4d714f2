//! RTT bounds tracking and minimum-RTT path selection.

use std::time::Duration;

use super::Subflow;

/// Running minimum and maximum smoothed RTT observed across a connection's
/// available paths. Feeds the linear interpolation of the blocking estimator.
///
/// Both bounds are zero until the first sample; afterwards `min <= max` holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RttBounds {
    min: Duration,
    max: Duration,
    seeded: bool,
}

impl RttBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one RTT sample. Zero samples (no measurement) are ignored.
    pub fn observe(&mut self, rtt: Duration) {
        if rtt.is_zero() {
            return;
        }
        if self.seeded {
            self.min = self.min.min(rtt);
            self.max = self.max.max(rtt);
        } else {
            self.min = rtt;
            self.max = rtt;
            self.seeded = true;
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Midpoint of the bounds.
    pub fn avg(&self) -> Duration {
        midpoint(self.min, self.max)
    }
}

/// Midpoint of `low..=high` without overflowing; requires `low <= high`.
pub(super) fn midpoint(low: Duration, high: Duration) -> Duration {
    low + high.saturating_sub(low) / 2
}

/// Filter `paths` down to the available ones, in iteration order, folding
/// each available path's RTT into `bounds` along the way.
pub fn filter_available<'a>(paths: &'a [Subflow], bounds: &mut RttBounds) -> Vec<&'a Subflow> {
    paths
        .iter()
        .filter(|path| path.is_available())
        .inspect(|path| bounds.observe(path.srtt))
        .collect()
}

/// Lowest-RTT path among `candidates` with the given backup classification.
/// Ties go to the first one encountered.
pub fn min_rtt_in_tier<'a>(candidates: &[&'a Subflow], backup: bool) -> Option<&'a Subflow> {
    candidates
        .iter()
        .copied()
        .filter(|path| path.backup == backup)
        .min_by_key(|path| path.rtt_key())
}

/// Minimum-RTT selector: regular paths first, backup paths only when no
/// regular path is available.
pub fn select_min_rtt<'a>(candidates: &[&'a Subflow]) -> Option<&'a Subflow> {
    min_rtt_in_tier(candidates, false).or_else(|| min_rtt_in_tier(candidates, true))
}

/// Last-resort choice: the first active path that can send at all, ignoring
/// window and congestion state.
pub fn first_sendable(paths: &[Subflow]) -> Option<&Subflow> {
    paths.iter().find(|path| path.is_sendable())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(id: u32, rtt_ms: u64) -> Subflow {
        Subflow::new(id, Duration::from_millis(rtt_ms), 10, 1460)
    }

    #[test]
    fn test_bounds_track_min_max() {
        let mut bounds = RttBounds::new();
        assert!(!bounds.is_seeded());
        bounds.observe(Duration::from_millis(40));
        assert_eq!(bounds.min(), bounds.max());
        bounds.observe(Duration::from_millis(10));
        bounds.observe(Duration::ZERO);
        bounds.observe(Duration::from_millis(90));
        assert_eq!(bounds.min(), Duration::from_millis(10));
        assert_eq!(bounds.max(), Duration::from_millis(90));
        assert_eq!(bounds.avg(), Duration::from_millis(50));
    }

    #[test]
    fn test_avg_of_extreme_bounds() {
        let mut bounds = RttBounds::new();
        bounds.observe(Duration::MAX);
        bounds.observe(Duration::MAX - Duration::from_secs(2));
        assert_eq!(bounds.avg(), Duration::MAX - Duration::from_secs(1));
    }

    #[test]
    fn test_filter_updates_bounds_only_for_available() {
        let congested = path(2, 300).with_in_flight(10);
        let paths = vec![path(1, 20), congested, path(3, 50)];
        let mut bounds = RttBounds::new();

        let available = filter_available(&paths, &mut bounds);
        assert_eq!(available.len(), 2);
        assert_eq!(bounds.max(), Duration::from_millis(50));
    }

    #[test]
    fn test_min_rtt_prefers_regular_then_backup() {
        let paths = vec![path(1, 40), path(2, 5).as_backup(), path(3, 30)];
        let refs: Vec<_> = paths.iter().collect();
        assert_eq!(select_min_rtt(&refs).unwrap().id.get(), 3);

        let backups = vec![path(4, 80).as_backup(), path(5, 60).as_backup()];
        let refs: Vec<_> = backups.iter().collect();
        assert_eq!(select_min_rtt(&refs).unwrap().id.get(), 5);

        assert!(select_min_rtt(&[]).is_none());
    }

    #[test]
    fn test_min_rtt_tie_goes_to_first() {
        let paths = vec![path(7, 25), path(8, 25)];
        let refs: Vec<_> = paths.iter().collect();
        assert_eq!(select_min_rtt(&refs).unwrap().id.get(), 7);
    }

    #[test]
    fn test_unsampled_rtt_sorts_last() {
        let paths = vec![path(1, 0), path(2, 500)];
        let refs: Vec<_> = paths.iter().collect();
        assert_eq!(select_min_rtt(&refs).unwrap().id.get(), 2);
    }
}
