//! Error types for the subflow scheduler.

use std::io;

use thiserror::Error;

use crate::types::{ConnectionId, LinkClass};

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
///
/// Scheduling outcomes (no eligible path, blocking risk, stale metrics) are not
/// errors; they surface as [`crate::multipath::Decision::Rejected`] or as an
/// internal fallback. This type covers configuration, registry and sampling.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    // Registry errors
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is already registered")]
    ConnectionExists(ConnectionId),

    // Link metrics errors
    #[error("link sampler error: {0}")]
    Sampler(#[from] SamplerError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Link bitrate sampling errors.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("interface {0} not found")]
    InterfaceNotFound(String),

    #[error("no bitrate data for {0}")]
    NoData(LinkClass),

    #[error("invalid bitrate reading {value:?} from {source_name}")]
    Parse { source_name: String, value: String },

    #[error("negative bitrate {0} rejected")]
    NegativeBitrate(i64),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Check if the error is transient (the next sampling tick may succeed).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Sampler(
                SamplerError::NoData(_) | SamplerError::Io(_) | SamplerError::InterfaceNotFound(_)
            ) | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(Error::from(SamplerError::NoData(LinkClass::Wifi)).is_recoverable());
        assert!(!Error::InvalidConfig("min > max".into()).is_recoverable());
        assert!(!Error::from(SamplerError::NegativeBitrate(-5)).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::UnknownConnection(ConnectionId::new(1));
        assert_eq!(err.to_string(), "connection conn-00000001 is not registered");
    }
}
