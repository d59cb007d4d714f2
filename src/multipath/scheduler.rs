//! Path scheduler: policy dispatch over per-connection state.
//!
//! Implements the scheduling policies:
//! - Minimum RTT
//! - Round-robin
//! - Redundant (send on every available path)
//! - BLEST (throughput-first with HoL-blocking estimation)
//! - Cross-layer (link bitrate-first with HoL-blocking estimation)
//!
//! Every call runs `filter available -> policy selection -> [blocking check]`
//! and ends in [`Decision::Scheduled`] or [`Decision::Rejected`]. Rejection is
//! not an error: the transport retries at the next send opportunity.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::blocking::estimate_blocking;
use super::crosslayer::choose_candidate;
use super::lambda::{LambdaConfig, LambdaParams, LambdaState};
use super::round_robin::RoundRobinCursor;
use super::rtt::{filter_available, first_sendable, select_min_rtt, RttBounds};
use super::{ConnectionAggregate, Subflow};
use crate::error::{Error, Result};
use crate::metrics::LinkMetrics;
use crate::types::PathId;
use crate::util::Classify;

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Lowest smoothed RTT first.
    MinRtt,
    /// Cycle through available paths.
    RoundRobin,
    /// Duplicate every send on all available paths.
    Redundant,
    /// Highest delivery rate, vetoed by the blocking estimator.
    #[default]
    Blest,
    /// Highest link bitrate, vetoed by the blocking estimator.
    CrossLayer,
}

impl Policy {
    pub const ALL: [Policy; 5] = [
        Policy::MinRtt,
        Policy::RoundRobin,
        Policy::Redundant,
        Policy::Blest,
        Policy::CrossLayer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MinRtt => "minrtt",
            Self::RoundRobin => "roundrobin",
            Self::Redundant => "redundant",
            Self::Blest => "blest",
            Self::CrossLayer => "crosslayer",
        }
    }

    /// Whether the policy consults the blocking estimator.
    pub fn uses_blocking_estimator(self) -> bool {
        matches!(self, Self::Blest | Self::CrossLayer)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|policy| policy.name() == lower)
            .ok_or_else(|| Error::UnknownPolicy(s.to_string()))
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduling policy.
    #[serde(default)]
    pub policy: Policy,

    /// After regular and backup tiers, fall back to any path that can send
    /// at all (min-RTT and round-robin only).
    #[serde(default)]
    pub relaxed_fallback: bool,

    /// Lambda controller tunables.
    #[serde(default)]
    pub lambda: LambdaConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            relaxed_fallback: false,
            lambda: LambdaConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        self.lambda.validate()
    }
}

/// Terminal state of one scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Send on these paths (more than one only for the redundant policy).
    Scheduled(Vec<PathId>),
    /// No suitable path now; retry at the next opportunity.
    Rejected,
}

impl Decision {
    fn single(path: &Subflow) -> Self {
        Self::Scheduled(vec![path.id])
    }

    /// First scheduled path.
    pub fn primary(&self) -> Option<PathId> {
        match self {
            Self::Scheduled(paths) => paths.first().copied(),
            Self::Rejected => None,
        }
    }

    pub fn paths(&self) -> &[PathId] {
        match self {
            Self::Scheduled(paths) => paths,
            Self::Rejected => &[],
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled(paths) => {
                let ids: Vec<String> = paths.iter().map(ToString::to_string).collect();
                write!(f, "scheduled [{}]", ids.join(", "))
            }
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Per-connection decision counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Scheduling calls.
    pub decisions: u64,
    /// Calls that ended without a path.
    pub rejected: u64,
    /// Candidates vetoed by the blocking estimator.
    pub hol_prevented: u64,
    /// Times each path was scheduled.
    pub per_path: HashMap<PathId, u64>,
}

/// Shared inputs of the cross-layer policy.
#[derive(Clone)]
pub struct LinkContext {
    /// Bitrate snapshot written by the background sampler.
    pub metrics: Arc<LinkMetrics>,
    /// Local address to link class mapping.
    pub classifier: Arc<dyn Classify>,
    /// Snapshots older than this are ignored.
    pub max_age: Duration,
}

impl fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkContext")
            .field("snapshot", &self.metrics.snapshot())
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// Mutable estimator state owned by exactly one connection.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub rtt_bounds: RttBounds,
    pub lambda: LambdaState,
    pub cursor: RoundRobinCursor,
}

impl SchedulerState {
    pub fn new(params: &LambdaParams) -> Self {
        Self {
            rtt_bounds: RttBounds::new(),
            lambda: LambdaState::new(params),
            cursor: RoundRobinCursor::new(),
        }
    }
}

/// Scheduler for one connection.
#[derive(Debug)]
pub struct Scheduler {
    policy: Policy,
    lambda_params: LambdaParams,
    relaxed_fallback: bool,
    state: SchedulerState,
    link: Option<LinkContext>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create a scheduler running the configured policy.
    pub fn new(config: &SchedulerConfig) -> Self {
        Self::with_policy(config.policy, config)
    }

    /// Create a scheduler running `policy` with the tunables of `config`.
    pub fn with_policy(policy: Policy, config: &SchedulerConfig) -> Self {
        let lambda_params = config.lambda.scaled();
        let scheduler = Self {
            policy,
            lambda_params,
            relaxed_fallback: config.relaxed_fallback,
            state: SchedulerState::new(&lambda_params),
            link: None,
            stats: SchedulerStats::default(),
        };
        debug!(
            policy = %policy,
            lambda = scheduler.state.lambda.value(),
            "Scheduler initialized"
        );
        scheduler
    }

    /// Attach link metrics for the cross-layer policy.
    pub fn with_link_context(mut self, link: LinkContext) -> Self {
        self.link = Some(link);
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Current lambda in per-mille.
    pub fn lambda(&self) -> u32 {
        self.state.lambda.value()
    }

    /// Schedule the next send opportunity.
    pub fn select(&mut self, paths: &[Subflow], conn: &ConnectionAggregate) -> Decision {
        self.select_at(paths, conn, Instant::now())
    }

    /// Schedule the next send opportunity; returns the primary path only.
    pub fn select_path(&mut self, paths: &[Subflow], conn: &ConnectionAggregate) -> Option<PathId> {
        self.select(paths, conn).primary()
    }

    /// Schedule with an explicit clock, for the lambda RTT guard.
    pub fn select_at(
        &mut self,
        paths: &[Subflow],
        conn: &ConnectionAggregate,
        now: Instant,
    ) -> Decision {
        let available = filter_available(paths, &mut self.state.rtt_bounds);
        trace!(
            policy = %self.policy,
            total = paths.len(),
            available = available.len(),
            "scheduling opportunity"
        );

        let decision = match self.policy {
            Policy::MinRtt => self.select_min_rtt(&available, paths),
            Policy::RoundRobin => self
                .state
                .cursor
                .select(&available, paths, self.relaxed_fallback)
                .map_or(Decision::Rejected, Decision::single),
            Policy::Redundant => Self::select_redundant(&available),
            Policy::Blest => self.select_blest(&available, conn, now),
            Policy::CrossLayer => self.select_crosslayer(&available, conn, now),
        };

        self.record(&decision);
        decision
    }

    fn record(&mut self, decision: &Decision) {
        self.stats.decisions += 1;
        match decision {
            Decision::Scheduled(paths) => {
                for id in paths {
                    *self.stats.per_path.entry(*id).or_default() += 1;
                }
            }
            Decision::Rejected => {
                self.stats.rejected += 1;
                trace!(policy = %self.policy, "no suitable path");
            }
        }
    }

    fn select_min_rtt(&self, available: &[&Subflow], all: &[Subflow]) -> Decision {
        let selected = select_min_rtt(available).or_else(|| {
            if self.relaxed_fallback {
                first_sendable(all)
            } else {
                None
            }
        });
        selected.map_or(Decision::Rejected, Decision::single)
    }

    fn select_redundant(available: &[&Subflow]) -> Decision {
        if available.is_empty() {
            return Decision::Rejected;
        }
        Decision::Scheduled(available.iter().map(|path| path.id).collect())
    }

    fn select_blest(
        &mut self,
        available: &[&Subflow],
        conn: &ConnectionAggregate,
        now: Instant,
    ) -> Decision {
        let Some(fastest) = select_min_rtt(available) else {
            return Decision::Rejected;
        };

        // Highest projected delivery rate within the tier min-RTT settled on;
        // reversed so ties keep the first path in iteration order.
        let candidate = available
            .iter()
            .rev()
            .copied()
            .filter(|path| path.backup == fastest.backup)
            .max_by_key(|path| path.delivery_rate())
            .unwrap_or(fastest);

        Decision::single(self.guard_blocking(candidate, fastest, conn, now))
    }

    fn select_crosslayer(
        &mut self,
        available: &[&Subflow],
        conn: &ConnectionAggregate,
        now: Instant,
    ) -> Decision {
        let Some(fastest) = select_min_rtt(available) else {
            return Decision::Rejected;
        };

        let Some(link) = &self.link else {
            debug!("cross-layer: no link metrics attached, using min-RTT");
            return Decision::single(fastest);
        };

        let snapshot = link.metrics.snapshot();
        let (candidate, reason) = choose_candidate(
            available,
            fastest,
            &snapshot,
            now,
            link.max_age,
            link.classifier.as_ref(),
        );
        debug!(candidate = %candidate.id, %reason, "cross-layer candidate");

        Decision::single(self.guard_blocking(candidate, fastest, conn, now))
    }

    /// Run `candidate` past the blocking estimator against `fastest`.
    ///
    /// Returns `fastest` if sending on the candidate would leave the
    /// connection's send window too small for what the fast path could push
    /// while the candidate drains.
    fn guard_blocking<'a>(
        &mut self,
        candidate: &'a Subflow,
        fastest: &'a Subflow,
        conn: &ConnectionAggregate,
        now: Instant,
    ) -> &'a Subflow {
        if candidate.id == fastest.id {
            return candidate;
        }

        self.state
            .lambda
            .update(&self.lambda_params, conn, candidate, now);

        let estimate = estimate_blocking(
            candidate,
            fastest,
            conn,
            &self.state.rtt_bounds,
            self.state.lambda.value(),
        );

        if estimate.is_blocking() {
            self.stats.hol_prevented += 1;
            debug!(
                candidate = %candidate.id,
                fastest = %fastest.id,
                fast_bytes = estimate.fast_bytes,
                avail_space = estimate.avail_space,
                linger = ?estimate.linger,
                "HoL prevention: using fastest path"
            );
            fastest
        } else {
            candidate
        }
    }

    /// Log final counters on connection teardown.
    pub fn release(&self) {
        info!(
            policy = %self.policy,
            decisions = self.stats.decisions,
            rejected = self.stats.rejected,
            hol_prevented = self.stats.hol_prevented,
            lambda = self.state.lambda.value(),
            "Scheduler released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(id: u32, rtt_ms: u64) -> Subflow {
        Subflow::new(id, Duration::from_millis(rtt_ms), 20, 1460).with_ssthresh(10)
    }

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::new(&SchedulerConfig::default());
        assert_eq!(scheduler.policy(), Policy::Blest);
        assert_eq!(scheduler.lambda(), 1200);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("minrtt".parse::<Policy>().unwrap(), Policy::MinRtt);
        assert_eq!("CrossLayer".parse::<Policy>().unwrap(), Policy::CrossLayer);
        assert!(matches!("fastest".parse::<Policy>(), Err(Error::UnknownPolicy(_))));
        for policy in Policy::ALL {
            assert_eq!(policy.to_string().parse::<Policy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_empty_paths_rejected() {
        let conn = ConnectionAggregate::new(100_000);
        for policy in Policy::ALL {
            let mut scheduler = Scheduler::with_policy(policy, &SchedulerConfig::default());
            assert_eq!(scheduler.select(&[], &conn), Decision::Rejected);
            assert_eq!(scheduler.stats().rejected, 1);
        }
    }

    #[test]
    fn test_redundant_schedules_all_available() {
        let paths = vec![path(1, 10), path(2, 30).with_in_flight(20), path(3, 50)];
        let mut scheduler = Scheduler::with_policy(Policy::Redundant, &SchedulerConfig::default());
        let decision = scheduler.select(&paths, &ConnectionAggregate::new(100_000));
        assert_eq!(decision.paths(), &[PathId::new(1), PathId::new(3)]);
    }

    #[test]
    fn test_min_rtt_relaxed_fallback() {
        let paths = vec![path(1, 10).with_in_flight(20)];
        let conn = ConnectionAggregate::new(100_000);

        let mut strict = Scheduler::with_policy(Policy::MinRtt, &SchedulerConfig::default());
        assert_eq!(strict.select(&paths, &conn), Decision::Rejected);

        let config = SchedulerConfig {
            relaxed_fallback: true,
            ..Default::default()
        };
        let mut relaxed = Scheduler::with_policy(Policy::MinRtt, &config);
        assert_eq!(relaxed.select_path(&paths, &conn), Some(PathId::new(1)));
    }

    #[test]
    fn test_crosslayer_without_link_context_is_min_rtt() {
        let paths = vec![path(1, 40), path(2, 15)];
        let mut scheduler = Scheduler::with_policy(Policy::CrossLayer, &SchedulerConfig::default());
        let chosen = scheduler.select_path(&paths, &ConnectionAggregate::new(100_000));
        assert_eq!(chosen, Some(PathId::new(2)));
    }

    #[test]
    fn test_stats_per_path() {
        let paths = vec![path(1, 10), path(2, 20)];
        let conn = ConnectionAggregate::new(100_000);
        let mut scheduler = Scheduler::with_policy(Policy::RoundRobin, &SchedulerConfig::default());
        for _ in 0..6 {
            scheduler.select(&paths, &conn);
        }
        assert_eq!(scheduler.stats().decisions, 6);
        assert_eq!(scheduler.stats().per_path[&PathId::new(1)], 3);
        assert_eq!(scheduler.stats().per_path[&PathId::new(2)], 3);
    }

    #[test]
    fn test_decision_display() {
        let decision = Decision::Scheduled(vec![PathId::new(1), PathId::new(4)]);
        assert_eq!(decision.to_string(), "scheduled [path-1, path-4]");
        assert_eq!(Decision::Rejected.to_string(), "rejected");
        assert_eq!(Decision::Rejected.primary(), None);
    }
}
