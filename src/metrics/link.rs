//! Shared link bitrate snapshot.
//!
//! Written by the background sampler, read concurrently by every
//! connection's cross-layer policy. All writes of one sampling round land in
//! a single critical section, so readers never see a half-updated pair.
//! Each class carries the time of its own last sample: a source that stops
//! producing readings goes stale even while the other class keeps updating.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::LinkClass;

/// Sentinel for "never sampled" or "last sample failed".
pub const BITRATE_UNKNOWN: i64 = -1;

/// Point-in-time copy of the per-class bitrates, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    wifi_bps: i64,
    cellular_bps: i64,
    wifi_at: Option<Instant>,
    cellular_at: Option<Instant>,
    updated_at: Option<Instant>,
}

impl Default for LinkSnapshot {
    fn default() -> Self {
        Self::unknown()
    }
}

impl LinkSnapshot {
    /// Snapshot with every class unknown.
    pub const fn unknown() -> Self {
        Self {
            wifi_bps: BITRATE_UNKNOWN,
            cellular_bps: BITRATE_UNKNOWN,
            wifi_at: None,
            cellular_at: None,
            updated_at: None,
        }
    }

    /// Raw value for `class`, possibly [`BITRATE_UNKNOWN`].
    pub fn raw(&self, class: LinkClass) -> i64 {
        match class {
            LinkClass::Wifi => self.wifi_bps,
            LinkClass::Cellular => self.cellular_bps,
        }
    }

    /// Valid (strictly positive) bitrate for `class`.
    pub fn bitrate(&self, class: LinkClass) -> Option<u64> {
        u64::try_from(self.raw(class)).ok().filter(|bps| *bps > 0)
    }

    /// Valid bitrate for `class`, provided its own sample is no older than
    /// `max_age` at `now`.
    pub fn fresh_bitrate(&self, class: LinkClass, now: Instant, max_age: Duration) -> Option<u64> {
        if self.is_class_fresh(class, now, max_age) {
            self.bitrate(class)
        } else {
            None
        }
    }

    /// Time `class` was last published.
    pub fn sampled_at(&self, class: LinkClass) -> Option<Instant> {
        match class {
            LinkClass::Wifi => self.wifi_at,
            LinkClass::Cellular => self.cellular_at,
        }
    }

    /// Time of the last publish of any class.
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    /// Whether `class` was published within `max_age` of `now`.
    pub fn is_class_fresh(&self, class: LinkClass, now: Instant, max_age: Duration) -> bool {
        self.sampled_at(class)
            .is_some_and(|at| now.saturating_duration_since(at) <= max_age)
    }

    /// Whether any class was published within `max_age` of `now`.
    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        self.updated_at
            .is_some_and(|at| now.saturating_duration_since(at) <= max_age)
    }

    /// All classes with their raw values.
    pub fn iter(&self) -> impl Iterator<Item = (LinkClass, i64)> + '_ {
        LinkClass::ALL.into_iter().map(|class| (class, self.raw(class)))
    }

    fn set(&mut self, class: LinkClass, bps: i64, at: Instant) {
        match class {
            LinkClass::Wifi => {
                self.wifi_bps = bps;
                self.wifi_at = Some(at);
            }
            LinkClass::Cellular => {
                self.cellular_bps = bps;
                self.cellular_at = Some(at);
            }
        }
    }
}

/// Lock-protected link metrics shared across connections.
#[derive(Debug, Default)]
pub struct LinkMetrics {
    inner: RwLock<LinkSnapshot>,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one class's bitrate.
    pub fn publish(&self, class: LinkClass, bps: i64) {
        self.publish_batch(&[(class, bps)]);
    }

    /// Publish several classes atomically.
    pub fn publish_batch(&self, values: &[(LinkClass, i64)]) {
        if values.is_empty() {
            return;
        }
        let now = Instant::now();
        let mut snapshot = self.inner.write();
        for &(class, bps) in values {
            snapshot.set(class, bps, now);
        }
        snapshot.updated_at = Some(now);
    }

    /// Mark a class unknown without touching the others.
    pub fn invalidate(&self, class: LinkClass) {
        self.inner.write().set(class, BITRATE_UNKNOWN, Instant::now());
    }

    /// Copy out the current snapshot.
    pub fn snapshot(&self) -> LinkSnapshot {
        *self.inner.read()
    }
}
