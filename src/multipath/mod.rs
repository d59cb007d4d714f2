//! Multi-path subflow scheduling.
//!
//! This module implements the scheduling core:
//! - Subflow and connection snapshots supplied by the transport
//! - Path eligibility and per-connection RTT bounds
//! - Min-RTT, round-robin, redundant, BLEST and cross-layer policies
//! - Head-of-line blocking estimation with an adaptive lambda
//! - A registry owning one scheduler per connection

mod blocking;
mod crosslayer;
mod lambda;
mod manager;
mod path;
mod round_robin;
mod rtt;
mod scheduler;

pub use blocking::{
    estimate_blocking, estimate_bytes, estimate_linger_time, BlockingEstimate, MAX_SLOW_START_ROUNDS,
};
pub use crosslayer::{choose_candidate, CrossLayerReason};
pub use lambda::{LambdaConfig, LambdaParams, LambdaState, LAMBDA_SCALE};
pub use manager::SchedulerRegistry;
pub use path::{ConnectionAggregate, Subflow};
pub use round_robin::RoundRobinCursor;
pub use rtt::{filter_available, first_sendable, min_rtt_in_tier, select_min_rtt, RttBounds};
pub use scheduler::{
    Decision, LinkContext, Policy, Scheduler, SchedulerConfig, SchedulerState, SchedulerStats,
};
