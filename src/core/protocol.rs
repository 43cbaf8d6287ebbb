//! Control-connection wire format
//! Inbound lines are parsed into a [`ControlMessage`]; everything sent back to
//! the controller is an [`OutboundMessage`] pushed through a [`ControlSender`].

use std::fmt;

use tokio::sync::mpsc;

use crate::core::bluetooth::{normalize_address, BridgeError};

const SCAN: &str = "SCAN";
const CONNECT: &str = "CONNECT";
const DISCONNECT: &str = "DISCONNECT";

/// A parsed inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Scan,
    Connect { address: String },
    Disconnect { address: String },
    /// Bytes to write to the vehicle's write characteristic
    RawCommand { address: String, payload: Vec<u8> },
    /// Anything else, with the cleaned line for logging
    Malformed(String),
}

impl ControlMessage {
    /// Parses one line. Trailing line breaks and null padding are ignored.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let line = clean_field(&text);
        let fields: Vec<&str> = line.split(';').map(clean_field).collect();

        match fields.as_slice() {
            [SCAN, ..] => Self::Scan,
            [CONNECT, address, ..] if !address.is_empty() => Self::Connect {
                address: normalize_address(address),
            },
            [DISCONNECT, address, ..] if !address.is_empty() => Self::Disconnect {
                address: normalize_address(address),
            },
            [keyword, ..] if [CONNECT, DISCONNECT].contains(keyword) => {
                Self::Malformed(line.to_string())
            }
            [address, payload] if !address.is_empty() => match hex::decode(payload) {
                Ok(payload) => Self::RawCommand {
                    address: normalize_address(address),
                    payload,
                },
                Err(_) => Self::Malformed(line.to_string()),
            },
            _ => Self::Malformed(line.to_string()),
        }
    }
}

fn clean_field(field: &str) -> &str {
    field.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Outcome reported for CONNECT and DISCONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// A line sent to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    ScanResult {
        address: String,
        manufacturer_data: String,
        local_name: String,
    },
    ScanCompleted,
    Connect(Outcome),
    Disconnect(Outcome),
    /// Payload received from a vehicle
    Notification { address: String, payload: Vec<u8> },
}

impl OutboundMessage {
    /// The message with its terminating line break
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanResult {
                address,
                manufacturer_data,
                local_name,
            } => write!(f, "{SCAN};{address};{manufacturer_data};{local_name}"),
            Self::ScanCompleted => write!(f, "{SCAN};COMPLETED"),
            Self::Connect(outcome) => write!(f, "{CONNECT};{outcome}"),
            Self::Disconnect(outcome) => write!(f, "{DISCONNECT};{outcome}"),
            Self::Notification { address, payload } => {
                write!(f, "{};{}", address, hex::encode(payload))
            }
        }
    }
}

/// A clonable handle that queues lines for the control connection's single writer.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ControlSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        self.tx
            .send(message)
            .map_err(|_| BridgeError::ControlClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
