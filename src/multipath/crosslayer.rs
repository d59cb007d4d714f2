//! Bandwidth-aware candidate choice using link-layer bitrates.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use super::rtt::select_min_rtt;
use super::Subflow;
use crate::metrics::LinkSnapshot;
use crate::types::LinkClass;
use crate::util::Classify;

/// Why the cross-layer policy picked its candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossLayerReason {
    /// Both classes present with valid bitrates; this one is faster.
    HigherBitrate(LinkClass),
    /// Only this class is represented among available paths.
    OnlyClass(LinkClass),
    /// Both classes present but bitrates are unknown or stale.
    InvalidMetrics,
    /// No available path could be classified.
    Unclassified,
}

impl fmt::Display for CrossLayerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HigherBitrate(class) => write!(f, "higher bitrate on {class}"),
            Self::OnlyClass(class) => write!(f, "only {class} available"),
            Self::InvalidMetrics => write!(f, "no valid link metrics"),
            Self::Unclassified => write!(f, "no classified path"),
        }
    }
}

/// Best (lowest-RTT) available path of each class.
fn representatives<'a>(
    available: &[&'a Subflow],
    classifier: &dyn Classify,
) -> (Option<&'a Subflow>, Option<&'a Subflow>) {
    let mut wifi: Vec<&'a Subflow> = Vec::new();
    let mut cellular: Vec<&'a Subflow> = Vec::new();

    for &path in available {
        match path.local_addr.and_then(|addr| classifier.classify(addr)) {
            Some(LinkClass::Wifi) => wifi.push(path),
            Some(LinkClass::Cellular) => cellular.push(path),
            None => {}
        }
    }

    (select_min_rtt(&wifi), select_min_rtt(&cellular))
}

/// Choose the cross-layer candidate among `available` paths.
///
/// A class's bitrate counts only if its own sample is at most `max_age` old
/// at `now`. Falls back to `min_rtt` whenever bitrates cannot settle the
/// choice.
pub fn choose_candidate<'a>(
    available: &[&'a Subflow],
    min_rtt: &'a Subflow,
    snapshot: &LinkSnapshot,
    now: Instant,
    max_age: Duration,
    classifier: &dyn Classify,
) -> (&'a Subflow, CrossLayerReason) {
    let (wifi, cellular) = representatives(available, classifier);

    match (wifi, cellular) {
        (Some(wifi), Some(cellular)) => {
            let rates = snapshot
                .fresh_bitrate(LinkClass::Wifi, now, max_age)
                .zip(snapshot.fresh_bitrate(LinkClass::Cellular, now, max_age));

            match rates {
                Some((wifi_bps, cellular_bps)) if wifi_bps > cellular_bps => {
                    debug!(wifi_bps, cellular_bps, "cross-layer: WiFi has higher bitrate");
                    (wifi, CrossLayerReason::HigherBitrate(LinkClass::Wifi))
                }
                Some((wifi_bps, cellular_bps)) => {
                    debug!(wifi_bps, cellular_bps, "cross-layer: cellular has higher bitrate");
                    (cellular, CrossLayerReason::HigherBitrate(LinkClass::Cellular))
                }
                None => {
                    debug!("cross-layer: no valid metrics, falling back to min-RTT");
                    (min_rtt, CrossLayerReason::InvalidMetrics)
                }
            }
        }
        (Some(wifi), None) => (wifi, CrossLayerReason::OnlyClass(LinkClass::Wifi)),
        (None, Some(cellular)) => (cellular, CrossLayerReason::OnlyClass(LinkClass::Cellular)),
        (None, None) => (min_rtt, CrossLayerReason::Unclassified),
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::metrics::LinkMetrics;
    use crate::util::InterfaceClassifier;

    const MAX_AGE: Duration = Duration::from_secs(5);
    const WIFI_ADDR: &str = "192.168.1.10";
    const CELL_ADDR: &str = "10.64.0.2";

    fn classifier() -> InterfaceClassifier {
        let mut classifier = InterfaceClassifier::new();
        classifier.insert(WIFI_ADDR.parse().unwrap(), LinkClass::Wifi);
        classifier.insert(CELL_ADDR.parse().unwrap(), LinkClass::Cellular);
        classifier
    }

    fn path(id: u32, rtt_ms: u64, addr: &str) -> Subflow {
        Subflow::new(id, Duration::from_millis(rtt_ms), 20, 1460)
            .with_local_addr(addr.parse::<IpAddr>().unwrap())
    }

    fn snapshot(wifi: i64, cellular: i64) -> LinkSnapshot {
        let metrics = Arc::new(LinkMetrics::new());
        metrics.publish_batch(&[(LinkClass::Wifi, wifi), (LinkClass::Cellular, cellular)]);
        metrics.snapshot()
    }

    #[test]
    fn test_higher_bitrate_wins() {
        let paths = [path(1, 40, WIFI_ADDR), path(2, 20, CELL_ADDR)];
        let refs: Vec<_> = paths.iter().collect();
        let (chosen, reason) = choose_candidate(
            &refs,
            &paths[1],
            &snapshot(150_000_000, 50_000_000),
            Instant::now(),
            MAX_AGE,
            &classifier(),
        );
        assert_eq!(chosen.id.get(), 1);
        assert_eq!(reason, CrossLayerReason::HigherBitrate(LinkClass::Wifi));
    }

    #[test]
    fn test_equal_bitrate_prefers_cellular() {
        let paths = [path(1, 40, WIFI_ADDR), path(2, 20, CELL_ADDR)];
        let refs: Vec<_> = paths.iter().collect();
        let (chosen, _) = choose_candidate(
            &refs,
            &paths[1],
            &snapshot(10, 10),
            Instant::now(),
            MAX_AGE,
            &classifier(),
        );
        assert_eq!(chosen.id.get(), 2);
    }

    #[test]
    fn test_invalid_or_stale_metrics_fall_back() {
        let paths = [path(1, 40, WIFI_ADDR), path(2, 20, CELL_ADDR)];
        let refs: Vec<_> = paths.iter().collect();

        let (chosen, reason) = choose_candidate(
            &refs,
            &paths[1],
            &snapshot(-1, 50),
            Instant::now(),
            MAX_AGE,
            &classifier(),
        );
        assert_eq!(chosen.id.get(), 2);
        assert_eq!(reason, CrossLayerReason::InvalidMetrics);

        let published = snapshot(150, 50);
        let later = published.updated_at().unwrap() + MAX_AGE + Duration::from_millis(1);
        let (_, reason) =
            choose_candidate(&refs, &paths[1], &published, later, MAX_AGE, &classifier());
        assert_eq!(reason, CrossLayerReason::InvalidMetrics);
    }

    #[test]
    fn test_single_class_and_unclassified() {
        let paths = [path(1, 40, WIFI_ADDR), path(2, 20, "172.16.0.1")];
        let refs: Vec<_> = paths.iter().collect();
        let (chosen, reason) =
            choose_candidate(&refs, &paths[1], &LinkSnapshot::unknown(), Instant::now(), MAX_AGE, &classifier());
        assert_eq!(chosen.id.get(), 1);
        assert_eq!(reason, CrossLayerReason::OnlyClass(LinkClass::Wifi));

        let refs = vec![&paths[1]];
        let (chosen, reason) =
            choose_candidate(&refs, &paths[1], &LinkSnapshot::unknown(), Instant::now(), MAX_AGE, &classifier());
        assert_eq!(chosen.id.get(), 2);
        assert_eq!(reason, CrossLayerReason::Unclassified);
    }
}
