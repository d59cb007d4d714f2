//! Periodic link bitrate sampling.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{LinkMetrics, LinkMetricsConfig, BITRATE_UNKNOWN};
use crate::error::{Error, SamplerError};
use crate::types::LinkClass;

/// A source of bitrate readings for one link class.
pub trait BitrateSource: Send + Sync {
    /// Class the readings belong to.
    fn class(&self) -> LinkClass;

    /// Human-readable source name for logs.
    fn name(&self) -> String;

    /// Take one reading in bits per second.
    fn sample(&self) -> Result<u64, SamplerError>;
}

/// Reads the negotiated link speed from `/sys/class/net/<iface>/speed`.
#[derive(Debug, Clone)]
pub struct SysfsLinkSpeed {
    class: LinkClass,
    interface: String,
    root: PathBuf,
}

impl SysfsLinkSpeed {
    pub fn new(class: LinkClass, interface: impl Into<String>) -> Self {
        Self::with_root(class, interface, "/sys/class/net")
    }

    /// Use an alternate sysfs root (tests, containers).
    pub fn with_root(class: LinkClass, interface: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            class,
            interface: interface.into(),
            root: root.into(),
        }
    }
}

impl BitrateSource for SysfsLinkSpeed {
    fn class(&self) -> LinkClass {
        self.class
    }

    fn name(&self) -> String {
        format!("sysfs:{}", self.interface)
    }

    fn sample(&self) -> Result<u64, SamplerError> {
        let dir = self.root.join(&self.interface);
        if !dir.exists() {
            return Err(SamplerError::InterfaceNotFound(self.interface.clone()));
        }

        let raw = fs::read_to_string(dir.join("speed"))?;
        let mbps: i64 = raw.trim().parse().map_err(|_| SamplerError::Parse {
            source_name: self.name(),
            value: raw.trim().to_string(),
        })?;

        // Drivers report -1 when the link is down or speed is unknown
        if mbps <= 0 {
            return Err(SamplerError::NoData(self.class));
        }
        Ok(mbps.unsigned_abs() * 1_000_000)
    }
}

/// Operator-configured bitrate, updated through a typed setter.
#[derive(Debug)]
pub struct StaticBitrate {
    class: LinkClass,
    bps: AtomicI64,
}

impl StaticBitrate {
    pub fn new(class: LinkClass) -> Self {
        Self {
            class,
            bps: AtomicI64::new(BITRATE_UNKNOWN),
        }
    }

    pub fn with_bitrate(class: LinkClass, bps: u64) -> Self {
        let source = Self::new(class);
        source.bps.store(i64::try_from(bps).unwrap_or(i64::MAX), Ordering::Relaxed);
        source
    }

    /// Set the bitrate in bits per second; negative values are rejected.
    pub fn set(&self, bps: i64) -> Result<(), SamplerError> {
        if bps < 0 {
            return Err(SamplerError::NegativeBitrate(bps));
        }
        self.bps.store(bps, Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self) -> i64 {
        self.bps.load(Ordering::Relaxed)
    }
}

impl BitrateSource for StaticBitrate {
    fn class(&self) -> LinkClass {
        self.class
    }

    fn name(&self) -> String {
        format!("static:{}", self.class)
    }

    fn sample(&self) -> Result<u64, SamplerError> {
        u64::try_from(self.get())
            .ok()
            .filter(|bps| *bps > 0)
            .ok_or(SamplerError::NoData(self.class))
    }
}

/// Background task that polls bitrate sources into [`LinkMetrics`].
pub struct LinkSampler {
    metrics: Arc<LinkMetrics>,
    sources: Vec<Arc<dyn BitrateSource>>,
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl LinkSampler {
    pub fn new(metrics: Arc<LinkMetrics>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            metrics,
            sources: Vec::new(),
            interval,
            shutdown_tx,
        }
    }

    /// Build a sampler with the sources described by `config`.
    ///
    /// Returns the cellular static source, if configured, so the caller can
    /// keep updating it.
    pub fn from_config(
        config: &LinkMetricsConfig,
        metrics: Arc<LinkMetrics>,
    ) -> (Self, Option<Arc<StaticBitrate>>) {
        let mut sampler = Self::new(metrics, config.sample_interval);

        if let Some(ref wifi) = config.wifi_interface {
            sampler = sampler.with_source(Arc::new(SysfsLinkSpeed::new(LinkClass::Wifi, wifi)));
        }

        let mut cellular_static = None;
        if let Some(ref iface) = config.cellular_interface {
            sampler = sampler.with_source(Arc::new(SysfsLinkSpeed::new(LinkClass::Cellular, iface)));
        } else if let Some(bps) = config.cellular_bitrate_bps {
            let source = Arc::new(StaticBitrate::with_bitrate(LinkClass::Cellular, bps));
            sampler = sampler.with_source(source.clone());
            cellular_static = Some(source);
        }

        (sampler, cellular_static)
    }

    /// Add a bitrate source.
    pub fn with_source(mut self, source: Arc<dyn BitrateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sampling round.
    ///
    /// Successful readings are published together; a failing source keeps
    /// its previous value (still [`BITRATE_UNKNOWN`] if it never succeeded).
    /// Returns the number of classes published.
    pub fn sample_once(&self) -> usize {
        let mut readings = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.sample() {
                Ok(bps) => {
                    debug!(source = %source.name(), bps, "link bitrate sampled");
                    readings.push((source.class(), i64::try_from(bps).unwrap_or(i64::MAX)));
                }
                Err(e) => {
                    let e = Error::from(e);
                    if e.is_recoverable() {
                        debug!(source = %source.name(), "link sample failed: {}", e);
                    } else {
                        warn!(source = %source.name(), "link sample rejected: {}", e);
                    }
                }
            }
        }

        self.metrics.publish_batch(&readings);
        readings.len()
    }

    /// Spawn the periodic sampling loop on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                interval = ?self.interval,
                sources = self.sources.len(),
                "Link sampler started"
            );
            let mut ticker = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.sample_once() == 0 && !self.sources.is_empty() {
                            warn!("No link bitrate source produced a sample");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            info!("Link sampler stopped");
        })
    }

    /// Signal the sampling loop to exit.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for LinkSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSampler")
            .field("interval", &self.interval)
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
