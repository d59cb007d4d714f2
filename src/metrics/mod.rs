//! Cross-layer link metrics.
//!
//! This module provides:
//! - A shared, lock-protected bitrate snapshot per link class
//! - Bitrate sources (sysfs link speed, operator-configured values)
//! - A periodic background sampler with a stop signal

mod link;
mod sampler;

pub use link::{LinkMetrics, LinkSnapshot, BITRATE_UNKNOWN};
pub use sampler::{BitrateSource, LinkSampler, StaticBitrate, SysfsLinkSpeed};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Link metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetricsConfig {
    /// Interval between sampling rounds.
    #[serde(default = "default_sample_interval", with = "humantime_serde")]
    pub sample_interval: Duration,

    /// Snapshots older than this are treated as invalid.
    #[serde(default = "default_max_age", with = "humantime_serde")]
    pub max_age: Duration,

    /// WiFi interface to sample.
    #[serde(default = "default_wifi_interface")]
    pub wifi_interface: Option<String>,

    /// Cellular interface to sample, if the driver reports a link speed.
    #[serde(default)]
    pub cellular_interface: Option<String>,

    /// Fixed cellular bitrate (bits per second) when no interface is sampled.
    #[serde(default)]
    pub cellular_bitrate_bps: Option<u64>,
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_max_age() -> Duration {
    Duration::from_secs(5)
}
fn default_wifi_interface() -> Option<String> {
    Some("wlan0".to_string())
}

impl Default for LinkMetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            max_age: default_max_age(),
            wifi_interface: default_wifi_interface(),
            cellular_interface: None,
            cellular_bitrate_bps: None,
        }
    }
}

impl LinkMetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            return Err(Error::InvalidConfig("sample_interval must be non-zero".into()));
        }
        if self.max_age < self.sample_interval {
            return Err(Error::InvalidConfig(format!(
                "max_age {:?} shorter than sample_interval {:?}",
                self.max_age, self.sample_interval
            )));
        }
        Ok(())
    }
}
