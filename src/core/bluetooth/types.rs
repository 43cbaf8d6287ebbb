//! Defines shared data structures for the Bluetooth module.

use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::radio::RadioAdapter;

/// Represents a discovered vehicle
#[derive(Debug, Clone)]
pub struct DeviceRecord<P> {
    /// Normalized address, the registry key
    pub address: String,
    /// Tagged manufacturer data, hex-encoded
    pub manufacturer_data: String,
    /// Local name reported to the controller, hex-encoded
    pub local_name: String,
    /// Radio handle used to open a connection
    pub address_handle: P,
}

/// The write and read/notify characteristics of a connected vehicle
#[derive(Debug, Clone)]
pub struct CapabilityPair<E> {
    pub write: E,
    pub notify: E,
}

/// Represents the state of a successfully connected vehicle.
/// This struct holds the active handles needed for interaction.
pub struct ConnectionRecord<R: RadioAdapter> {
    pub address: String,
    /// Distinguishes this connection from earlier ones to the same address
    pub id: u64,
    /// The device handle, used for disconnecting.
    pub connection_handle: R::Peripheral,
    pub capabilities: CapabilityPair<R::Endpoint>,
    /// Cancelled when the record is replaced or removed; stops the notification relay.
    pub relay: CancellationToken,
}

/// Strips `-` and `:` separators and upper-cases. Idempotent.
pub fn normalize_address(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .chars()
        .filter(|c| *c != '-' && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
