//! Constants used throughout the bridge
//! This module contains the fixed values of the Anki Drive protocol,
//! such as UUIDs, the advertisement filter, and default timeouts.

use uuid::Uuid;

/// Substring an advertised name must contain to be treated as a vehicle
pub const VEHICLE_NAME_FILTER: &str = "Drive";

/// The UUID of the Anki Drive vehicle service
pub const UUID_VEHICLE_SERVICE: Uuid = Uuid::from_u128(0xbe15beef_6186_407e_8381_0bd89c4d8df4);

/// The UUID of the vehicle read/notify characteristic
pub const UUID_VEHICLE_READ_CHAR: Uuid = Uuid::from_u128(0xbe15bee0_6186_407e_8381_0bd89c4d8df4);

/// The UUID of the vehicle write characteristic
pub const UUID_VEHICLE_WRITE_CHAR: Uuid = Uuid::from_u128(0xbe15bee1_6186_407e_8381_0bd89c4d8df4);

/// Characteristics requested during discovery. Index 0 is write, index 1 is read/notify.
pub const VEHICLE_CHARACTERISTICS: [Uuid; 2] = [UUID_VEHICLE_WRITE_CHAR, UUID_VEHICLE_READ_CHAR];

/// Tag prepended to the vendor payload before it is reported to the controller
pub const MANUFACTURER_DATA_TAG: [u8; 2] = [0xbe, 0xef];

/// Canonical local name reported for every vehicle, already hex-encoded
pub const VEHICLE_LOCAL_NAME_HEX: &str = "10603001202020204472697665";

/// Scan duration in milliseconds
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 5000;

/// Delay between two scan result lines in milliseconds
pub const DEFAULT_SCAN_RESULT_PACING_MS: u64 = 500;

/// Timeout for Bluetooth operations in milliseconds
pub const DEFAULT_RADIO_OPERATION_TIMEOUT_MS: u64 = 10_000;
