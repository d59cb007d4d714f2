//! Command-line interface for subflow-sched.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::multipath::{ConnectionAggregate, Policy, Subflow};
use crate::types::LinkClass;
use crate::util::InterfaceClassifier;

/// subflow-sched - multi-path subflow scheduler
#[derive(Parser, Debug)]
#[command(
    name = "subflow-sched",
    author,
    version,
    about = "Multi-path subflow scheduler with head-of-line blocking estimation",
    long_about = r#"
subflow-sched decides which path of a multi-path connection carries the
next segment. It provides:

  - Min-RTT, round-robin and redundant scheduling
  - BLEST: throughput-first choices vetoed on head-of-line blocking risk
  - Cross-layer: WiFi vs. cellular choice by link bitrate
  - An adaptive lambda that tracks retransmissions

QUICK START:
  subflow-sched config --example > sched.toml
  subflow-sched decide scenario.toml --policy blest --rounds 5
  subflow-sched sample --duration 10
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Logging settings with the command-line overrides applied to `base`.
    pub fn logging(&self, base: &LoggingConfig) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone().unwrap_or_else(|| base.level.clone()),
            color: !self.no_color && base.color,
            ..base.clone()
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler over a path scenario file
    Decide(DecideArgs),

    /// List network interfaces and their link class
    Interfaces(InterfacesArgs),

    /// Sample link bitrates in the background and print snapshots
    Sample(SampleArgs),

    /// Show or validate configuration
    Config(ConfigArgs),

    /// List scheduling policies
    Policies,
}

/// Decide command arguments
#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Override the configured policy
    #[arg(short, long)]
    pub policy: Option<Policy>,

    /// Number of scheduling rounds
    #[arg(short, long, default_value = "1")]
    pub rounds: u32,
}

/// Interfaces command arguments
#[derive(Args, Debug)]
pub struct InterfacesArgs {
    /// Include down and loopback interfaces
    #[arg(short, long)]
    pub all: bool,
}

/// Sample command arguments
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Duration in seconds
    #[arg(short, long, default_value = "5")]
    pub duration: u64,

    /// WiFi interface override
    #[arg(long)]
    pub wifi: Option<String>,

    /// Fixed cellular bitrate in bits per second
    #[arg(long)]
    pub cellular_bps: Option<u64>,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print example configuration
    #[arg(long)]
    pub example: bool,

    /// Validate a configuration file
    #[arg(long, value_name = "FILE")]
    pub validate: Option<PathBuf>,

    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Link bitrates published before a scenario runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioLink {
    /// WiFi bitrate in bits per second; negative means unknown.
    #[serde(default = "unknown_bitrate")]
    pub wifi_bps: i64,
    /// Cellular bitrate in bits per second; negative means unknown.
    #[serde(default = "unknown_bitrate")]
    pub cellular_bps: i64,
}

fn unknown_bitrate() -> i64 {
    crate::metrics::BITRATE_UNKNOWN
}

/// One scheduling situation read from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Connection-level values.
    pub connection: ConnectionAggregate,

    /// Link bitrates for the cross-layer policy.
    #[serde(default)]
    pub link: Option<ScenarioLink>,

    /// Local address to link class table.
    #[serde(default)]
    pub classes: HashMap<IpAddr, LinkClass>,

    /// Subflow snapshots.
    #[serde(default)]
    pub paths: Vec<Subflow>,
}

impl Scenario {
    /// Load a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read scenario: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse scenario: {e}")))
    }

    /// Classifier built from the scenario's class table.
    pub fn classifier(&self) -> InterfaceClassifier {
        let mut classifier = InterfaceClassifier::new();
        for (addr, class) in &self.classes {
            classifier.insert(*addr, *class);
        }
        classifier
    }
}
