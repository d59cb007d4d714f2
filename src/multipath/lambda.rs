//! Adaptive safety margin ("lambda") applied to fast-path byte projections.
//!
//! Lambda is kept per connection as a per-mille integer. It grows quickly when
//! the connection retransmits and decays slowly otherwise, at most once per
//! reference-path RTT.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{ConnectionAggregate, Subflow};
use crate::error::{Error, Result};

/// Fixed-point scale of lambda values (1000 = 1.0x).
pub const LAMBDA_SCALE: u32 = 1000;

/// Lambda tunables, expressed as real multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaConfig {
    /// Starting multiplier.
    #[serde(default = "default_initial")]
    pub initial: f64,
    /// Lower clamp.
    #[serde(default = "default_min")]
    pub min: f64,
    /// Upper clamp.
    #[serde(default = "default_max")]
    pub max: f64,
    /// Decrease applied after a retransmission-free interval.
    #[serde(default = "default_good_step")]
    pub good_step: f64,
    /// Increase applied after an interval with retransmissions.
    #[serde(default = "default_bad_step")]
    pub bad_step: f64,
}

fn default_initial() -> f64 { 1.2 }
fn default_min() -> f64 { 1.0 }
fn default_max() -> f64 { 1.3 }
fn default_good_step() -> f64 { 0.01 }
fn default_bad_step() -> f64 { 0.04 }

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            initial: default_initial(),
            min: default_min(),
            max: default_max(),
            good_step: default_good_step(),
            bad_step: default_bad_step(),
        }
    }
}

impl LambdaConfig {
    /// Reject settings that would corrupt a running lambda state.
    pub fn validate(&self) -> Result<()> {
        let all = [self.initial, self.min, self.max, self.good_step, self.bad_step];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig("lambda values must be finite".into()));
        }
        if self.min <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "lambda min must be positive, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(Error::InvalidConfig(format!(
                "lambda min {} exceeds max {}",
                self.min, self.max
            )));
        }
        if !(self.min..=self.max).contains(&self.initial) {
            return Err(Error::InvalidConfig(format!(
                "initial lambda {} outside [{}, {}]",
                self.initial, self.min, self.max
            )));
        }
        if self.good_step < 0.0 || self.bad_step < 0.0 {
            return Err(Error::InvalidConfig("lambda steps must not be negative".into()));
        }
        Ok(())
    }

    /// Convert to per-mille integers.
    pub fn scaled(&self) -> LambdaParams {
        LambdaParams {
            initial: to_scaled(self.initial),
            min: to_scaled(self.min),
            max: to_scaled(self.max),
            good_step: to_scaled(self.good_step),
            bad_step: to_scaled(self.bad_step),
        }
    }
}

fn to_scaled(value: f64) -> u32 {
    (value * f64::from(LAMBDA_SCALE)).round() as u32
}

/// Lambda tunables in per-mille units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LambdaParams {
    pub initial: u32,
    pub min: u32,
    pub max: u32,
    pub good_step: u32,
    pub bad_step: u32,
}

impl Default for LambdaParams {
    fn default() -> Self {
        LambdaConfig::default().scaled()
    }
}

impl LambdaParams {
    /// Clamp into `[min, max]`, tolerating swapped bounds.
    pub fn clamp(&self, value: u32) -> u32 {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        value.clamp(lo, hi)
    }
}

/// Per-connection lambda controller state.
#[derive(Debug, Clone)]
pub struct LambdaState {
    value: u32,
    last_update: Option<Instant>,
    last_retransmitted: u64,
}

impl LambdaState {
    pub fn new(params: &LambdaParams) -> Self {
        Self {
            value: params.clamp(params.initial),
            last_update: None,
            last_retransmitted: 0,
        }
    }

    /// Current value in per-mille.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Current value as a real multiplier.
    pub fn multiplier(&self) -> f64 {
        f64::from(self.value) / f64::from(LAMBDA_SCALE)
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Adjust lambda once per `reference` RTT.
    ///
    /// Returns `false` when the RTT guard suppressed the update.
    pub fn update(
        &mut self,
        params: &LambdaParams,
        conn: &ConnectionAggregate,
        reference: &Subflow,
        now: Instant,
    ) -> bool {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) < reference.srtt {
                return false;
            }
        }

        let retransmitted = conn.bytes_retransmitted > self.last_retransmitted;
        let next = if retransmitted {
            self.value.saturating_add(params.bad_step)
        } else {
            self.value.saturating_sub(params.good_step)
        };
        let next = params.clamp(next);

        trace!(
            from = self.value,
            to = next,
            retransmitted,
            reference = %reference.id,
            "lambda update"
        );

        self.value = next;
        self.last_retransmitted = conn.bytes_retransmitted;
        self.last_update = Some(now);
        true
    }

    /// Force a value, clamped to the configured bounds.
    pub fn set(&mut self, params: &LambdaParams, value: u32) {
        self.value = params.clamp(value);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn reference() -> Subflow {
        Subflow::new(1, Duration::from_millis(50), 20, 1460)
    }

    #[test]
    fn test_defaults() {
        let params = LambdaParams::default();
        assert_eq!(params.initial, 1200);
        assert_eq!(params.min, 1000);
        assert_eq!(params.max, 1300);
        assert_eq!(params.good_step, 10);
        assert_eq!(params.bad_step, 40);
        assert!(LambdaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = LambdaConfig {
            min: 1.5,
            max: 1.1,
            initial: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LambdaConfig {
            initial: 2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LambdaConfig {
            bad_step: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rtt_guard() {
        let params = LambdaParams::default();
        let mut state = LambdaState::new(&params);
        let conn = ConnectionAggregate::new(100_000);
        let start = Instant::now();

        assert!(state.update(&params, &conn, &reference(), start));
        assert_eq!(state.value(), 1190);

        // Within one RTT: ignored
        assert!(!state.update(&params, &conn, &reference(), start + Duration::from_millis(10)));
        assert_eq!(state.value(), 1190);

        assert!(state.update(&params, &conn, &reference(), start + Duration::from_millis(50)));
        assert_eq!(state.value(), 1180);
    }

    #[test]
    fn test_decays_to_floor() {
        let params = LambdaParams::default();
        let mut state = LambdaState::new(&params);
        let conn = ConnectionAggregate::new(100_000);
        let start = Instant::now();

        for i in 0..40 {
            state.update(&params, &conn, &reference(), start + Duration::from_secs(i));
        }
        assert_eq!(state.value(), 1000);
    }

    #[test]
    fn test_defensive_clamp_with_swapped_bounds() {
        let params = LambdaParams {
            initial: 5000,
            min: 1300,
            max: 1000,
            good_step: 10,
            bad_step: 40,
        };
        let state = LambdaState::new(&params);
        assert_eq!(state.value(), 1300);
    }
}
