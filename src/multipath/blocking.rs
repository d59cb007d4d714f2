//! Head-of-line blocking estimator.
//!
//! Before data is committed to a slower candidate path, estimate how many
//! bytes the faster alternative could push while the candidate drains its
//! queue. If that exceeds the connection's remaining send window, the slow
//! path would hold the window hostage and the candidate is rejected.

use std::time::Duration;

use super::lambda::LAMBDA_SCALE;
use super::rtt::midpoint;
use super::{ConnectionAggregate, RttBounds, Subflow};

/// Upper bound on projected slow-start rounds.
pub const MAX_SLOW_START_ROUNDS: u32 = 16;

/// Outcome of one blocking check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingEstimate {
    /// Time until the candidate's queued data drains.
    pub linger: Duration,
    /// Bytes the alternative path could send during `linger`, scaled by lambda.
    pub fast_bytes: u64,
    /// Send-window space left once the candidate's outstanding bytes are counted.
    pub avail_space: u64,
}

impl BlockingEstimate {
    /// The candidate risks blocking the alternative.
    pub fn is_blocking(&self) -> bool {
        self.fast_bytes > self.avail_space
    }
}

/// Bounds to interpolate with; falls back to the path's own RTT before the
/// connection has any sample.
fn effective_bounds(path: &Subflow, bounds: &RttBounds) -> (Duration, Duration) {
    if bounds.is_seeded() {
        (bounds.min(), bounds.max())
    } else {
        (path.srtt, path.srtt)
    }
}

/// Estimate how long the path's outstanding data lingers before draining.
///
/// A path whose window is full (counting the segment about to be sent)
/// lingers for the largest RTT seen; otherwise the estimate is interpolated
/// between the connection's RTT bounds by window occupancy. Never below the
/// path's own smoothed RTT.
pub fn estimate_linger_time(path: &Subflow, bounds: &RttBounds) -> Duration {
    let (min, max) = effective_bounds(path, bounds);
    let inflight = path.packets_in_flight.saturating_add(1);
    let cwnd = path.cwnd.max(1);

    let estimate = if inflight >= cwnd {
        max
    } else {
        let slope = max.saturating_sub(min).as_nanos() * u128::from(inflight) / u128::from(cwnd);
        min.saturating_add(Duration::from_nanos(u64::try_from(slope).unwrap_or(u64::MAX)))
    };

    estimate.max(path.srtt)
}

/// Number of RTT rounds needed to cover `duration`, rounded up, at least one.
fn rounds_in(duration: Duration, avg_rtt: Duration) -> u32 {
    let avg = avg_rtt.as_nanos();
    if avg == 0 {
        return 1;
    }
    let rounds = (duration.as_nanos() + avg - 1) / avg;
    rounds.clamp(1, u128::from(u32::MAX)) as u32
}

/// Estimate the bytes `path` would transmit during `duration`, multiplied by
/// `lambda` (per-mille).
pub fn estimate_bytes(path: &Subflow, duration: Duration, bounds: &RttBounds, lambda: u32) -> u64 {
    let (min, max) = effective_bounds(path, bounds);
    let mut rounds = rounds_in(duration, midpoint(min, max));
    let cwnd = u128::from(path.cwnd);

    let packets = match path.ssthresh {
        None => {
            // Initial slow start: window doubles every round
            rounds = rounds.min(MAX_SLOW_START_ROUNDS);
            cwnd * ((1u128 << rounds) - 1)
        }
        Some(ssthresh) => {
            let ca_cwnd = cwnd.max(u128::from(ssthresh) + 1);
            let rounds = u128::from(rounds);
            (ca_cwnd + (rounds - 1) / 2) * rounds
        }
    };

    let bytes = packets * u128::from(path.mss) * u128::from(lambda) / u128::from(LAMBDA_SCALE);
    bytes.min(u128::from(u64::MAX)) as u64
}

/// Check whether sending on `candidate` risks blocking `alternative`.
pub fn estimate_blocking(
    candidate: &Subflow,
    alternative: &Subflow,
    conn: &ConnectionAggregate,
    bounds: &RttBounds,
    lambda: u32,
) -> BlockingEstimate {
    let linger = estimate_linger_time(candidate, bounds);
    let fast_bytes = estimate_bytes(alternative, linger, bounds, lambda);

    let slow_bytes = conn.buffered_bytes.saturating_add(candidate.unacked_bytes());
    let avail_space = conn.send_window.saturating_sub(slow_bytes);

    BlockingEstimate {
        linger,
        fast_bytes,
        avail_space,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min_ms: u64, max_ms: u64) -> RttBounds {
        let mut bounds = RttBounds::new();
        bounds.observe(Duration::from_millis(min_ms));
        bounds.observe(Duration::from_millis(max_ms));
        bounds
    }

    #[test]
    fn test_linger_full_window_uses_max() {
        let path = Subflow::new(1, Duration::from_millis(30), 10, 1460).with_in_flight(9);
        assert_eq!(estimate_linger_time(&path, &bounds(10, 90)), Duration::from_millis(90));
    }

    #[test]
    fn test_linger_interpolates() {
        // (4 + 1) / 10 of the way from 10ms to 110ms
        let path = Subflow::new(1, Duration::from_millis(10), 10, 1460).with_in_flight(4);
        assert_eq!(estimate_linger_time(&path, &bounds(10, 110)), Duration::from_millis(60));
    }

    #[test]
    fn test_linger_floored_at_own_rtt() {
        let path = Subflow::new(1, Duration::from_millis(100), 100, 1460);
        assert_eq!(estimate_linger_time(&path, &bounds(10, 110)), Duration::from_millis(100));
    }

    #[test]
    fn test_absurd_rtts_saturate() {
        let path = Subflow::new(1, Duration::MAX, u32::MAX, 1460).with_in_flight(u32::MAX - 10);
        let wide = bounds(1, u64::MAX);
        assert!(estimate_linger_time(&path, &wide) >= path.srtt);

        let huge = Subflow::new(2, Duration::MAX, 10, 1460).with_ssthresh(5);
        let mut extreme = RttBounds::new();
        extreme.observe(Duration::MAX);
        extreme.observe(Duration::MAX - Duration::from_nanos(1));
        assert!(estimate_bytes(&huge, Duration::MAX, &extreme, 1300) > 0);
    }

    #[test]
    fn test_linger_unseeded_bounds() {
        let path = Subflow::new(1, Duration::from_millis(42), 10, 1460);
        assert_eq!(estimate_linger_time(&path, &RttBounds::new()), Duration::from_millis(42));
    }

    #[test]
    fn test_bytes_congestion_avoidance() {
        let path = Subflow::new(1, Duration::from_millis(10), 50, 1000).with_ssthresh(40);
        // avg 50ms, 120ms -> 3 rounds: (50 + 1) * 3 = 153 packets
        let bytes = estimate_bytes(&path, Duration::from_millis(120), &bounds(10, 90), 1000);
        assert_eq!(bytes, 153_000);
    }

    #[test]
    fn test_bytes_ssthresh_raises_window() {
        let path = Subflow::new(1, Duration::from_millis(10), 10, 1000).with_ssthresh(30);
        // one round with effective cwnd 31
        let bytes = estimate_bytes(&path, Duration::from_millis(50), &bounds(10, 90), 1000);
        assert_eq!(bytes, 31_000);
    }

    #[test]
    fn test_bytes_slow_start_capped() {
        let path = Subflow::new(1, Duration::from_millis(10), 2, 100);
        let two_rounds = estimate_bytes(&path, Duration::from_millis(20), &bounds(10, 10), 1000);
        assert_eq!(two_rounds, 2 * 3 * 100);

        let capped = estimate_bytes(&path, Duration::from_secs(60), &bounds(10, 10), 1000);
        assert_eq!(capped, 2 * ((1 << 16) - 1) * 100);
    }

    #[test]
    fn test_bytes_scaled_by_lambda() {
        let path = Subflow::new(1, Duration::from_millis(10), 10, 1000).with_ssthresh(5);
        let base = estimate_bytes(&path, Duration::from_millis(10), &bounds(10, 10), 1000);
        let scaled = estimate_bytes(&path, Duration::from_millis(10), &bounds(10, 10), 1250);
        assert_eq!(base, 10_000);
        assert_eq!(scaled, 12_500);
    }

    #[test]
    fn test_zero_avg_rtt_single_round() {
        assert_eq!(rounds_in(Duration::from_millis(5), Duration::ZERO), 1);
        assert_eq!(rounds_in(Duration::ZERO, Duration::from_millis(5)), 1);
        assert_eq!(rounds_in(Duration::from_millis(11), Duration::from_millis(5)), 3);
        assert_eq!(rounds_in(Duration::from_millis(10), Duration::from_millis(5)), 2);
    }

    #[test]
    fn test_avail_space_saturates() {
        let slow = Subflow::new(2, Duration::from_millis(100), 20, 1000).with_in_flight(19);
        let fast = Subflow::new(1, Duration::from_millis(10), 20, 1000).with_ssthresh(10);
        let conn = ConnectionAggregate {
            send_window: 5_000,
            buffered_bytes: 1_000,
            ..Default::default()
        };
        let estimate = estimate_blocking(&slow, &fast, &conn, &bounds(10, 100), 1000);
        assert_eq!(estimate.avail_space, 0);
        assert!(estimate.is_blocking());
    }
}
