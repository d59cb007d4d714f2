//! Core types used throughout the scheduler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one path (subflow) within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u32);

impl PathId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path-{}", self.0)
    }
}

impl From<u32> for PathId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of a multi-path connection, assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{:08x}", self.0)
    }
}

/// Link-layer class of the interface a path leaves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkClass {
    /// 802.11 wireless LAN.
    Wifi,
    /// Cellular radio (LTE / 5G NR).
    Cellular,
}

impl LinkClass {
    /// All classes tracked by the link metrics snapshot.
    pub const ALL: [LinkClass; 2] = [LinkClass::Wifi, LinkClass::Cellular];
}

impl fmt::Display for LinkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi => write!(f, "wifi"),
            Self::Cellular => write!(f, "cellular"),
        }
    }
}

impl FromStr for LinkClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wifi" | "wlan" => Ok(Self::Wifi),
            "cellular" | "5g" | "nr" | "lte" => Ok(Self::Cellular),
            _ => Err(format!("unknown link class: {s}")),
        }
    }
}

/// Congestion-control state of a path as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionState {
    /// Normal operation.
    #[default]
    Open,
    /// Duplicate ACKs or SACKs seen, no reduction yet.
    Disorder,
    /// Window reduced after an ECN signal.
    Cwr,
    /// Fast recovery in progress.
    Recovery,
    /// Retransmission timeout fired.
    Loss,
}

impl fmt::Display for CongestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Disorder => write!(f, "disorder"),
            Self::Cwr => write!(f, "cwr"),
            Self::Recovery => write!(f, "recovery"),
            Self::Loss => write!(f, "loss"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_class_parse() {
        assert_eq!("wifi".parse::<LinkClass>().unwrap(), LinkClass::Wifi);
        assert_eq!("5G".parse::<LinkClass>().unwrap(), LinkClass::Cellular);
        assert!("ethernet".parse::<LinkClass>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PathId::new(3).to_string(), "path-3");
        assert_eq!(ConnectionId::new(0xab).to_string(), "conn-000000ab");
        assert_eq!(CongestionState::Recovery.to_string(), "recovery");
    }
}
