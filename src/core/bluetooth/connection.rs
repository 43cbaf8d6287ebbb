//! Bluetooth connection handling for vehicles
//! This module connects to and disconnects from vehicles and forwards commands
//! to their write characteristic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{UUID_VEHICLE_SERVICE, VEHICLE_CHARACTERISTICS};
use crate::core::bluetooth::error::{BridgeError, RadioError};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::radio::RadioAdapter;
use crate::core::bluetooth::registry::ConnectionRegistry;
use crate::core::bluetooth::types::{CapabilityPair, ConnectionRecord, DeviceRecord};
use crate::core::protocol::ControlSender;

/// Connection manager for vehicles
pub struct ConnectionManager<R: RadioAdapter> {
    radio: Arc<R>,
    connections: Arc<ConnectionRegistry<R>>,
    notification_handler: NotificationHandler<R>,
    operation_timeout: Duration,
}

impl<R: RadioAdapter> ConnectionManager<R> {
    pub fn new(radio: Arc<R>, connections: Arc<ConnectionRegistry<R>>, operation_timeout: Duration) -> Self {
        let notification_handler = NotificationHandler::new(connections.clone());
        Self {
            radio,
            connections,
            notification_handler,
            operation_timeout,
        }
    }

    /// Connects, resolves the capability pair and starts relaying notifications to `sender`.
    /// If any step after the link is up fails, the link is closed again.
    pub async fn connect(
        &self,
        device: &DeviceRecord<R::Peripheral>,
        sender: ControlSender,
    ) -> Result<Arc<ConnectionRecord<R>>, BridgeError> {
        let peripheral = device.address_handle.clone();
        info!("Initiating connection to {}...", device.address);
        self.bounded("connect", self.radio.connect(&peripheral)).await?;
        info!("Connected to {}", device.address);

        match self.set_up(&device.address, peripheral.clone(), sender).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!("Setting up {} failed, closing the link: {}", device.address, e);
                if let Err(e) = self.bounded("disconnect", self.radio.disconnect(&peripheral)).await {
                    warn!("Failed to close the link to {}: {}", device.address, e);
                }
                Err(e)
            }
        }
    }

    async fn set_up(
        &self,
        address: &str,
        peripheral: R::Peripheral,
        sender: ControlSender,
    ) -> Result<Arc<ConnectionRecord<R>>, BridgeError> {
        info!("Discovering services of {}...", address);
        let service = self
            .bounded(
                "service discovery",
                self.radio.discover_service(&peripheral, UUID_VEHICLE_SERVICE),
            )
            .await?
            .ok_or_else(|| BridgeError::ServiceNotFound(address.to_string()))?;

        let characteristics = self
            .bounded(
                "characteristic discovery",
                self.radio.discover_characteristics(&service, &VEHICLE_CHARACTERISTICS),
            )
            .await?;
        let found = characteristics.len();
        let mut characteristics = characteristics.into_iter();
        let (Some(write), Some(notify)) = (characteristics.next(), characteristics.next()) else {
            return Err(BridgeError::MissingCharacteristics {
                address: address.to_string(),
                found,
            });
        };

        info!("Setting up notifications for {}...", address);
        let notifications = self.bounded("subscribe", self.radio.subscribe(&notify)).await?;

        let record = Arc::new(ConnectionRecord {
            address: address.to_string(),
            id: self.connections.next_id(),
            connection_handle: peripheral,
            capabilities: CapabilityPair { write, notify },
            relay: CancellationToken::new(),
        });
        if let Some(previous) = self.connections.insert(record.clone()).await {
            info!("Replacing previous connection record of {}", address);
            previous.relay.cancel();
        }

        self.notification_handler.start(
            address.to_string(),
            record.id,
            notifications,
            record.relay.clone(),
            sender,
        );

        info!("Connection and setup of {} completed successfully", address);
        Ok(record)
    }

    /// Closes the link and drops the connection record together with its capability pair.
    /// The record stays registered when the radio fails to disconnect, so a retry can reach it.
    pub async fn disconnect(&self, address: &str) -> Result<(), BridgeError> {
        let record = self
            .connections
            .get(address)
            .await
            .ok_or_else(|| BridgeError::NotConnected(address.to_string()))?;

        self.bounded("disconnect", self.radio.disconnect(&record.connection_handle))
            .await?;

        self.connections.remove_if_current(address, record.id).await;
        record.relay.cancel();
        info!("{} Disconnected.", address);
        Ok(())
    }

    /// Writes `payload` to the write characteristic without waiting for a response
    pub async fn write(&self, address: &str, payload: &[u8]) -> Result<(), BridgeError> {
        let record = self
            .connections
            .get(address)
            .await
            .ok_or_else(|| BridgeError::NotConnected(address.to_string()))?;

        self.bounded(
            "write",
            self.radio.write_without_response(&record.capabilities.write, payload),
        )
        .await?;
        debug!("SENDING: [{};{}]", address, hex::encode(payload));
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, RadioError>>,
    ) -> Result<T, BridgeError> {
        match tokio::time::timeout(self.operation_timeout, future).await {
            Ok(result) => result.map_err(|source| BridgeError::Radio { operation, source }),
            Err(_) => Err(BridgeError::Timeout {
                operation,
                limit: self.operation_timeout,
            }),
        }
    }
}
