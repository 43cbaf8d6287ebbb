//! Core functionality for the Anki Drive bridge
//! This module contains the protocol engine between the controller connection and the vehicles

pub mod bluetooth;
pub mod protocol;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use protocol::{ControlMessage, ControlSender, OutboundMessage, Outcome};
