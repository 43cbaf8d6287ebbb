//! Bluetooth manager for the bridge
//! Owns the device and connection registries for the lifetime of the process
//! and is shared by every dispatch task.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::config::{DiscoveryConfig, RadioConfig};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::error::BridgeError;
use crate::core::bluetooth::radio::RadioAdapter;
use crate::core::bluetooth::registry::{ConnectionRegistry, DeviceRegistry};
use crate::core::bluetooth::scanner::VehicleScanner;
use crate::core::bluetooth::types::DeviceRecord;
use crate::core::protocol::ControlSender;

/// Manages Bluetooth operations
pub struct BluetoothManager<R: RadioAdapter> {
    /// Map of device addresses to discovered vehicles
    devices: DeviceRegistry<R::Peripheral>,
    /// Map of device addresses to live connections
    connections: Arc<ConnectionRegistry<R>>,
    /// Bluetooth scanner
    scanner: VehicleScanner<R>,
    /// Connection manager
    connection_manager: ConnectionManager<R>,
    merge_registry: bool,
    result_pacing: Duration,
}

impl<R: RadioAdapter> BluetoothManager<R> {
    pub fn new(radio: Arc<R>, discovery: &DiscoveryConfig, radio_config: &RadioConfig) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let scanner = VehicleScanner::new(
            radio.clone(),
            discovery.scan_timeout(),
            discovery.name_filter.clone(),
        );
        let connection_manager = ConnectionManager::new(
            radio,
            connections.clone(),
            radio_config.operation_timeout(),
        );

        Self {
            devices: DeviceRegistry::new(),
            connections,
            scanner,
            connection_manager,
            merge_registry: discovery.merge_registry,
            result_pacing: discovery.result_pacing(),
        }
    }

    /// Runs one discovery pass and records its results.
    /// Returns the vehicles seen in this pass, in discovery order.
    pub async fn scan(&self) -> Vec<DeviceRecord<R::Peripheral>> {
        let found = self.scanner.discover().await;

        if self.merge_registry {
            for device in &found {
                self.devices.upsert(device.clone()).await;
            }
        } else {
            // Connected vehicles stay registered so their connection records keep a device.
            let connected = self.connections.addresses().await;
            self.devices.replace_all(found.clone(), &connected).await;
        }

        info!(
            "Discovery pass found {} vehicle(s), {} registered",
            found.len(),
            self.devices.len().await
        );
        found
    }

    /// Connects to a previously discovered vehicle
    pub async fn connect(&self, address: &str, sender: ControlSender) -> Result<(), BridgeError> {
        let device = self
            .devices
            .get(address)
            .await
            .ok_or_else(|| BridgeError::UnknownDevice(address.to_string()))?;

        self.connection_manager.connect(&device, sender).await?;
        info!("Device {} successfully connected and state stored.", address);
        Ok(())
    }

    pub async fn disconnect(&self, address: &str) -> Result<(), BridgeError> {
        self.connection_manager.disconnect(address).await
    }

    /// Forwards raw command bytes to a connected vehicle
    pub async fn write(&self, address: &str, payload: &[u8]) -> Result<(), BridgeError> {
        self.connection_manager.write(address, payload).await
    }

    pub fn devices(&self) -> &DeviceRegistry<R::Peripheral> {
        &self.devices
    }

    pub fn connections(&self) -> &ConnectionRegistry<R> {
        &self.connections
    }

    /// Delay between two scan result lines
    pub fn result_pacing(&self) -> Duration {
        self.result_pacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::{MockPeripheral, MockRadio};

    fn discovery(merge_registry: bool) -> DiscoveryConfig {
        DiscoveryConfig {
            scan_timeout_ms: 500,
            result_pacing_ms: 0,
            merge_registry,
            ..DiscoveryConfig::default()
        }
    }

    fn vehicle(address: &str) -> DeviceRecord<MockPeripheral> {
        DeviceRecord {
            address: address.to_string(),
            manufacturer_data: String::new(),
            local_name: String::new(),
            address_handle: MockPeripheral(address.to_string()),
        }
    }

    fn advertising_radio() -> Arc<MockRadio> {
        Arc::new(MockRadio::new().with_advertisement("58-F1-D2-AA-BB-CC", "Drive", None))
    }

    #[tokio::test]
    async fn connect_requires_a_discovered_device() {
        let manager = BluetoothManager::new(Arc::new(MockRadio::new()), &discovery(true), &RadioConfig::default());
        let (sender, _receiver) = ControlSender::channel();

        let result = manager.connect("58F1D2AABBCC", sender).await;

        assert!(matches!(result, Err(BridgeError::UnknownDevice(_))));
        assert_eq!(manager.connections().len().await, 0);
    }

    #[tokio::test]
    async fn scan_merges_into_the_registry() {
        let manager = BluetoothManager::new(advertising_radio(), &discovery(true), &RadioConfig::default());
        manager.devices().upsert(vehicle("E304AA109F01")).await;

        let found = manager.scan().await;

        assert_eq!(found.len(), 1);
        assert_eq!(manager.devices().len().await, 2);
    }

    #[tokio::test]
    async fn clean_slate_scan_keeps_connected_devices() {
        let manager = BluetoothManager::new(advertising_radio(), &discovery(false), &RadioConfig::default());
        let (sender, _receiver) = ControlSender::channel();
        manager.devices().upsert(vehicle("E304AA109F01")).await;
        manager.devices().upsert(vehicle("0A0B0C0D0E0F")).await;
        manager.connect("E304AA109F01", sender).await.unwrap();

        manager.scan().await;

        assert!(manager.devices().get("58F1D2AABBCC").await.is_some());
        assert!(manager.devices().get("E304AA109F01").await.is_some());
        assert!(manager.devices().get("0A0B0C0D0E0F").await.is_none());
    }
}
