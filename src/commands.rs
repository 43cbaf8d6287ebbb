//! Controller commands
//! This module routes every parsed control message to the Bluetooth manager
//! and queues the replies the controller expects.

use log::{debug, info, warn};
use tokio::time::sleep;

use crate::core::bluetooth::{BluetoothManager, BridgeError, RadioAdapter};
use crate::core::protocol::{ControlMessage, ControlSender, OutboundMessage, Outcome};

/// Handles one inbound line. Only a closed control connection is returned as an error;
/// every other failure is logged and, for CONNECT and DISCONNECT, answered with `FAILED`.
pub async fn dispatch<R: RadioAdapter>(
    manager: &BluetoothManager<R>,
    raw: &[u8],
    sender: &ControlSender,
) -> Result<(), BridgeError> {
    match ControlMessage::parse(raw) {
        ControlMessage::Scan => scan_vehicles(manager, sender).await,
        ControlMessage::Connect { address } => connect_vehicle(manager, &address, sender).await,
        ControlMessage::Disconnect { address } => disconnect_vehicle(manager, &address, sender).await,
        ControlMessage::RawCommand { address, payload } => {
            forward_command(manager, &address, &payload).await;
            Ok(())
        }
        ControlMessage::Malformed(line) => {
            warn!("Ignoring malformed message: {:?}", line);
            Ok(())
        }
    }
}

/// Streams one `SCAN;...` line per vehicle found, then `SCAN;COMPLETED`
async fn scan_vehicles<R: RadioAdapter>(
    manager: &BluetoothManager<R>,
    sender: &ControlSender,
) -> Result<(), BridgeError> {
    info!("Scanning...");
    let pacing = manager.result_pacing();

    for device in manager.scan().await {
        sender.send(OutboundMessage::ScanResult {
            address: device.address,
            manufacturer_data: device.manufacturer_data,
            local_name: device.local_name,
        })?;
        if !pacing.is_zero() {
            sleep(pacing).await;
        }
    }

    sender.send(OutboundMessage::ScanCompleted)?;
    info!("Scanning Completed.");
    Ok(())
}

async fn connect_vehicle<R: RadioAdapter>(
    manager: &BluetoothManager<R>,
    address: &str,
    sender: &ControlSender,
) -> Result<(), BridgeError> {
    let outcome = match manager.connect(address, sender.clone()).await {
        Ok(()) => {
            info!("CONNECT COMPLETED");
            Outcome::Success
        }
        Err(e) => {
            warn!("CONNECT {} failed: {}", address, e);
            Outcome::Failed
        }
    };
    sender.send(OutboundMessage::Connect(outcome))
}

async fn disconnect_vehicle<R: RadioAdapter>(
    manager: &BluetoothManager<R>,
    address: &str,
    sender: &ControlSender,
) -> Result<(), BridgeError> {
    let outcome = match manager.disconnect(address).await {
        Ok(()) => Outcome::Success,
        Err(e) => {
            warn!("DISCONNECT {} failed: {}", address, e);
            Outcome::Failed
        }
    };
    sender.send(OutboundMessage::Disconnect(outcome))
}

/// Raw commands are fire-and-forget: failures are logged, never answered.
async fn forward_command<R: RadioAdapter>(manager: &BluetoothManager<R>, address: &str, payload: &[u8]) {
    match manager.write(address, payload).await {
        Ok(()) => debug!("Forwarded {} byte(s) to {}", payload.len(), address),
        Err(e) => warn!("Dropping command for {}: {}", address, e),
    }
}
