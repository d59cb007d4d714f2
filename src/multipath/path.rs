//! Per-path telemetry as exposed by the transport, and the availability filter.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CongestionState, PathId};

/// Congestion window at or below which a path in recovery is skipped.
pub const RECOVERY_MIN_CWND: u32 = 4;

/// Snapshot of one path's congestion-control state.
///
/// The transport owns and refreshes these values; the scheduler only reads
/// them. Sequence-space fields are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subflow {
    /// Path identifier.
    pub id: PathId,
    /// Local address the path is bound to (used for link classification).
    #[serde(default)]
    pub local_addr: Option<IpAddr>,
    /// Smoothed round-trip time. Zero means no sample yet.
    #[serde(with = "humantime_serde")]
    pub srtt: Duration,
    /// Congestion window in segments.
    pub cwnd: u32,
    /// Slow-start threshold in segments; `None` while in initial slow start.
    #[serde(default)]
    pub ssthresh: Option<u32>,
    /// Segments currently in flight.
    #[serde(default)]
    pub packets_in_flight: u32,
    /// Maximum segment size in bytes.
    #[serde(default = "default_mss")]
    pub mss: u32,
    /// Low-priority path, only used when no regular path is available.
    #[serde(default)]
    pub backup: bool,
    /// Established and not closing.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Transport reports the socket able to send (not blocked by the peer).
    #[serde(default = "default_true")]
    pub can_send: bool,
    /// Send-buffer memory available.
    #[serde(default = "default_true")]
    pub memory_free: bool,
    /// Congestion-control state.
    #[serde(default)]
    pub ca_state: CongestionState,
    /// Next sequence number to send.
    #[serde(default)]
    pub snd_nxt: u64,
    /// Right edge of the usable send window.
    #[serde(default = "default_wnd_end")]
    pub wnd_end: u64,
    /// Outstanding zero-window / RTO probes.
    #[serde(default)]
    pub probes_out: u32,
    /// Bytes written to the path (write_seq).
    #[serde(default)]
    pub bytes_written: u64,
    /// Bytes cumulatively acknowledged on the path (snd_una).
    #[serde(default)]
    pub bytes_acked: u64,
}

fn default_mss() -> u32 {
    1460
}
fn default_true() -> bool {
    true
}
fn default_wnd_end() -> u64 {
    u64::from(u32::MAX)
}

impl Subflow {
    /// Create a healthy, idle path with the given RTT, window and MSS.
    pub fn new(id: u32, srtt: Duration, cwnd: u32, mss: u32) -> Self {
        Self {
            id: PathId::new(id),
            local_addr: None,
            srtt,
            cwnd,
            ssthresh: None,
            packets_in_flight: 0,
            mss,
            backup: false,
            active: true,
            can_send: true,
            memory_free: true,
            ca_state: CongestionState::Open,
            snd_nxt: 0,
            wnd_end: default_wnd_end(),
            probes_out: 0,
            bytes_written: 0,
            bytes_acked: 0,
        }
    }

    /// Set segments in flight; unacknowledged bytes follow as `packets * mss`.
    pub fn with_in_flight(mut self, packets: u32) -> Self {
        self.packets_in_flight = packets;
        self.bytes_written = self.bytes_acked + u64::from(packets) * u64::from(self.mss);
        self
    }

    /// Leave slow start with the given threshold.
    pub fn with_ssthresh(mut self, ssthresh: u32) -> Self {
        self.ssthresh = Some(ssthresh);
        self
    }

    /// Mark as a backup path.
    pub fn as_backup(mut self) -> Self {
        self.backup = true;
        self
    }

    /// Bind to a local address.
    pub fn with_local_addr(mut self, addr: IpAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Full availability predicate.
    ///
    /// A path is available only when it is active, sendable, has buffer
    /// memory, is not cwnd-limited, is not in loss (or in recovery with a
    /// collapsed window), has room in its send window and has no outstanding
    /// probes. Evaluated fresh on every call, never cached.
    pub fn is_available(&self) -> bool {
        if !self.active || !self.can_send || !self.memory_free {
            return false;
        }

        if self.packets_in_flight >= self.cwnd {
            return false;
        }

        match self.ca_state {
            CongestionState::Loss => return false,
            CongestionState::Recovery if self.cwnd <= RECOVERY_MIN_CWND => return false,
            _ => {}
        }

        if self.wnd_end <= self.snd_nxt {
            return false;
        }

        self.probes_out == 0
    }

    /// Weaker predicate used by the relaxed fallback tier: active and sendable,
    /// ignoring window and congestion state.
    pub fn is_sendable(&self) -> bool {
        self.active && self.can_send
    }

    /// RTT used for ordering. Paths without a sample sort last.
    pub fn rtt_key(&self) -> Duration {
        if self.srtt.is_zero() {
            Duration::MAX
        } else {
            self.srtt
        }
    }

    /// Bytes written but not yet acknowledged.
    pub fn unacked_bytes(&self) -> u64 {
        self.bytes_written.saturating_sub(self.bytes_acked)
    }

    /// Projected delivery rate in bytes per second (`cwnd * mss / srtt`).
    pub fn delivery_rate(&self) -> u64 {
        let micros = self.srtt.as_micros();
        if micros == 0 {
            return 0;
        }
        let window = u128::from(self.cwnd) * u128::from(self.mss);
        (window * 1_000_000 / micros).min(u128::from(u64::MAX)) as u64
    }
}

/// Connection-wide values visible to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAggregate {
    /// Aggregate send window of the connection in bytes.
    pub send_window: u64,
    /// Cumulative retransmitted bytes at connection level.
    #[serde(default)]
    pub bytes_retransmitted: u64,
    /// Bytes queued for the send opportunity being scheduled.
    #[serde(default)]
    pub buffered_bytes: u64,
}

impl ConnectionAggregate {
    pub fn new(send_window: u64) -> Self {
        Self {
            send_window,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> Subflow {
        Subflow::new(1, Duration::from_millis(20), 10, 1460)
    }

    #[test]
    fn test_healthy_path_available() {
        assert!(healthy().is_available());
    }

    #[test]
    fn test_cwnd_limited_unavailable() {
        assert!(!healthy().with_in_flight(10).is_available());
        assert!(healthy().with_in_flight(9).is_available());
    }

    #[test]
    fn test_congestion_states() {
        let mut path = healthy();
        path.ca_state = CongestionState::Loss;
        assert!(!path.is_available());

        path.ca_state = CongestionState::Recovery;
        assert!(path.is_available());
        path.cwnd = 4;
        assert!(!path.is_available());

        path.ca_state = CongestionState::Disorder;
        assert!(path.is_available());
    }

    #[test]
    fn test_window_and_probes() {
        let mut path = healthy();
        path.snd_nxt = 5000;
        path.wnd_end = 5000;
        assert!(!path.is_available());

        let mut path = healthy();
        path.probes_out = 1;
        assert!(!path.is_available());
        assert!(path.is_sendable());
    }

    #[test]
    fn test_flags() {
        for mutate in [
            (|p: &mut Subflow| p.active = false) as fn(&mut Subflow),
            |p| p.can_send = false,
            |p| p.memory_free = false,
        ] {
            let mut path = healthy();
            mutate(&mut path);
            assert!(!path.is_available());
        }
    }

    #[test]
    fn test_availability_is_idempotent() {
        let path = healthy().with_in_flight(3);
        assert_eq!(path.is_available(), path.is_available());
    }

    #[test]
    fn test_delivery_rate() {
        // 10 * 1460 bytes every 20ms
        assert_eq!(healthy().delivery_rate(), 730_000);
        let mut idle = healthy();
        idle.srtt = Duration::ZERO;
        assert_eq!(idle.delivery_rate(), 0);
        assert_eq!(idle.rtt_key(), Duration::MAX);
    }
}
