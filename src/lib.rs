//! Anki Drive bridge library
//! This is the main library for the Anki Drive bridge, which relays the SDK's
//! TCP control protocol to vehicles over Bluetooth LE.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod server;

pub use crate::core::bluetooth::{BluestRadio, BridgeError, RadioAdapter};
pub use crate::core::BluetoothManager;
pub use server::ControlServer;
