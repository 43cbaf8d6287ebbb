//! Error types for the bridge core

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a radio adapter implementation
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("no Bluetooth adapter found")]
    AdapterUnavailable,

    #[error(transparent)]
    Bluetooth(#[from] bluest::Error),

    #[error("{0}")]
    Other(String),
}

/// Per-request failures of the bridge. None of these terminate the process.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown device address: {0}")]
    UnknownDevice(String),

    #[error("device {0} is not connected")]
    NotConnected(String),

    #[error("vehicle service not found on {0}")]
    ServiceNotFound(String),

    #[error("expected 2 vehicle characteristics on {address}, found {found}")]
    MissingCharacteristics { address: String, found: usize },

    #[error("{operation} failed: {source}")]
    Radio {
        operation: &'static str,
        #[source]
        source: RadioError,
    },

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("control connection closed")]
    ControlClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
