//! Radio adapter backed by the bluest library

use std::sync::{LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Service, Uuid};
use futures_util::{stream, StreamExt};
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::radio::{
    Advertisement, AdvertisementCallback, NotificationStream, RadioAdapter,
};

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").expect("MAC address pattern is valid")
});

pub struct BluestRadio {
    adapter: Adapter,
    scan_cancel: Mutex<CancellationToken>,
}

impl BluestRadio {
    /// Opens the default adapter and waits until it is powered on
    pub async fn new() -> Result<Self, RadioError> {
        let adapter = Adapter::default()
            .await
            .ok_or(RadioError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");
        Ok(Self {
            adapter,
            scan_cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// The platform id embeds the MAC address on Windows and Linux; macOS only exposes a UUID.
    fn device_address(device: &Device) -> String {
        let id = device.id().to_string();
        MAC_ADDRESS
            .find_iter(&id)
            .last()
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or(id)
    }

    fn fresh_scan_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self
            .scan_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = token.clone();
        token
    }
}

#[async_trait]
impl RadioAdapter for BluestRadio {
    type Peripheral = Device;
    type Service = Service;
    type Endpoint = Characteristic;

    async fn scan(&self, mut on_advertisement: AdvertisementCallback<Device>) -> Result<(), RadioError> {
        let cancel_token = self.fresh_scan_token();

        info!("Starting bluetooth scan");
        let mut scan_stream = self.adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            let adv_data = discovered_device.adv_data;
                            let name = adv_data.local_name.or_else(|| device.name().ok());
                            debug!("Found device - Device: {:?}, Name: {:?}, RSSI: {:?}",
                                device, name, discovered_device.rssi);

                            on_advertisement(Advertisement {
                                address: Self::device_address(&device),
                                name,
                                manufacturer_data: adv_data.manufacturer_data.map(|m| m.data),
                                peripheral: device,
                            });
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), RadioError> {
        info!("Stopping Bluetooth scan.");
        self.scan_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        Ok(())
    }

    async fn connect(&self, device: &Device) -> Result<(), RadioError> {
        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter.connect_device(device).await?;
        }
        Ok(())
    }

    async fn discover_service(&self, device: &Device, uuid: Uuid) -> Result<Option<Service>, RadioError> {
        let services = device.discover_services_with_uuid(uuid).await?;
        Ok(services.into_iter().next())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
        uuids: &[Uuid],
    ) -> Result<Vec<Characteristic>, RadioError> {
        let mut found = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            match service.discover_characteristics_with_uuid(*uuid).await?.into_iter().next() {
                Some(characteristic) => found.push(characteristic),
                None => info!("Characteristic {} not found on service {}", uuid, service.uuid()),
            }
        }
        Ok(found)
    }

    async fn write_without_response(
        &self,
        characteristic: &Characteristic,
        payload: &[u8],
    ) -> Result<(), RadioError> {
        characteristic.write_without_response(payload).await?;
        Ok(())
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<NotificationStream, RadioError> {
        // bluest notification streams borrow the characteristic, so a task owns it
        // and forwards payloads until the link drops or the receiver goes away.
        let characteristic = characteristic.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut notification_stream = match characteristic.notify().await {
                Ok(notification_stream) => {
                    let _ = ready_tx.send(Ok(()));
                    notification_stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(RadioError::from(e)));
                    return;
                }
            };

            loop {
                tokio::select! {
                    item = notification_stream.next() => {
                        let Some(item) = item else { break };
                        if let Err(e) = &item {
                            error!("Error in notification stream: {}", e);
                        }
                        if tx.send(item.map_err(RadioError::from)).is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!("Notification forwarding for {} ended", characteristic.uuid());
        });

        ready_rx
            .await
            .map_err(|_| RadioError::Other("notification task ended before subscribing".to_string()))??;

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn disconnect(&self, device: &Device) -> Result<(), RadioError> {
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter.disconnect_device(device).await?;
        } else {
            info!("Device {} not connected", device.id());
        }
        Ok(())
    }
}
