//! Configuration management for the subflow scheduler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::LinkMetricsConfig;
use crate::multipath::{LambdaConfig, Policy, SchedulerConfig};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Cross-layer link metrics configuration.
    #[serde(default)]
    pub link_metrics: LinkMetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.link_metrics.validate()?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::InvalidConfig(format!(
                "unknown log format {:?} (expected text or json)",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "subflow-sched", "subflow-sched").map_or_else(
            || PathBuf::from("subflow-sched.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            scheduler: SchedulerConfig {
                policy: Policy::CrossLayer,
                lambda: LambdaConfig::default(),
                relaxed_fallback: false,
            },
            link_metrics: LinkMetricsConfig {
                sample_interval: Duration::from_millis(500),
                max_age: Duration::from_secs(3),
                wifi_interface: Some("wlan0".into()),
                cellular_interface: None,
                cellular_bitrate_bps: Some(50_000_000),
            },
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color).with_target(false))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scheduler.policy, Policy::Blest);
        assert_eq!(config.link_metrics.max_age, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse(
            r#"
            [scheduler]
            policy = "roundrobin"
            relaxed_fallback = true

            [scheduler.lambda]
            max = 1.5

            [link_metrics]
            sample_interval = "250ms"
            cellular_bitrate_bps = 20000000
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.policy, Policy::RoundRobin);
        assert!(config.scheduler.relaxed_fallback);
        assert!((config.scheduler.lambda.max - 1.5).abs() < f64::EPSILON);
        assert!((config.scheduler.lambda.initial - 1.2).abs() < f64::EPSILON);
        assert_eq!(config.link_metrics.sample_interval, Duration::from_millis(250));
        assert_eq!(config.link_metrics.cellular_bitrate_bps, Some(20_000_000));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Config::parse("[scheduler]\npolicy = \"fastest\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::parse("[scheduler.lambda]\nmin = 2.0\nmax = 1.0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::parse("[logging]\nformat = \"xml\""),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::example();
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
