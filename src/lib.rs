//! # subflow-sched
//!
//! Per-packet path scheduling for multi-path transport connections.
//!
//! Given a snapshot of a connection's subflows, the scheduler decides which
//! path carries the next segment. Throughput-seeking choices are vetoed when
//! they would stall the receive window (head-of-line blocking), using an
//! estimator whose aggressiveness adapts to observed retransmissions.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Transport (subflow snapshots)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                  Scheduler Registry (per conn)                  │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐         │
//! │  │  MinRTT  │  │RoundRobin│  │  BLEST   │  │CrossLayer│  ...    │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────┘         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        HoL Blocking Estimator  ·  Adaptive Lambda               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │       Link Metrics (WiFi / cellular bitrate, background)        │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_possible_truncation)]  // Saturating fixed-point math
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::similar_names)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::struct_excessive_bools)]    // Subflow flags mirror the transport
#![allow(clippy::match_same_arms)]
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use

pub mod config;
pub mod error;
pub mod metrics;
pub mod multipath;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{LinkMetrics, LinkSampler, LinkSnapshot};
    pub use crate::multipath::{
        ConnectionAggregate, Decision, Policy, Scheduler, SchedulerConfig, SchedulerRegistry,
        Subflow,
    };
    pub use crate::types::*;
    pub use crate::util::{Classify, InterfaceClassifier};
}
