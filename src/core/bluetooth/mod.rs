//! Bluetooth functionality for the bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, forwarding commands and relaying notifications from vehicles.

mod bluest_radio;
mod connection;
pub mod constants;
mod error;
mod manager;
#[cfg(test)]
pub(crate) mod mock;
mod notification;
mod radio;
mod registry;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use bluest_radio::BluestRadio;
pub use connection::ConnectionManager;
pub use error::{BridgeError, RadioError};
pub use manager::BluetoothManager;
pub use notification::NotificationHandler;
pub use radio::{Advertisement, AdvertisementCallback, NotificationStream, RadioAdapter};
pub use registry::{ConnectionRegistry, DeviceRegistry};
pub use scanner::{encode_manufacturer_data, vehicle_record, VehicleScanner};
pub use types::{normalize_address, CapabilityPair, ConnectionRecord, DeviceRecord};
