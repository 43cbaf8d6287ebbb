//! Scripted radio adapter for tests

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::RadioError;
use crate::core::bluetooth::radio::{
    Advertisement, AdvertisementCallback, NotificationStream, RadioAdapter,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPeripheral(pub String);

#[derive(Debug)]
pub struct MockService(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEndpoint {
    pub address: String,
    pub index: usize,
}

impl MockEndpoint {
    pub fn new(address: &str, index: usize) -> Self {
        Self {
            address: address.to_string(),
            index,
        }
    }
}

/// How a scripted operation misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Fail,
    Hang,
}

type NotificationSender = mpsc::UnboundedSender<Result<Vec<u8>, RadioError>>;

#[derive(Default)]
pub struct MockRadio {
    advertisements: Vec<Advertisement<MockPeripheral>>,
    /// Keep scanning after the scripted advertisements until `stop_scan`
    scan_until_stopped: bool,
    missing_service: bool,
    characteristic_count: Option<usize>,
    faults: Mutex<HashMap<&'static str, Fault>>,
    calls: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    notifiers: Mutex<HashMap<String, NotificationSender>>,
    scan_cancel: Mutex<CancellationToken>,
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advertisement(mut self, address: &str, name: &str, manufacturer_data: Option<&[u8]>) -> Self {
        self.advertisements.push(Advertisement {
            address: address.to_string(),
            name: Some(name.to_string()),
            manufacturer_data: manufacturer_data.map(<[u8]>::to_vec),
            peripheral: MockPeripheral(address.to_string()),
        });
        self
    }

    pub fn scanning_until_stopped(mut self) -> Self {
        self.scan_until_stopped = true;
        self
    }

    pub fn without_vehicle_service(mut self) -> Self {
        self.missing_service = true;
        self
    }

    pub fn with_characteristic_count(mut self, count: usize) -> Self {
        self.characteristic_count = Some(count);
        self
    }

    pub fn with_fault(self, operation: &'static str, fault: Fault) -> Self {
        locked(&self.faults).insert(operation, fault);
        self
    }

    pub fn clear_fault(&self, operation: &str) {
        locked(&self.faults).remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        locked(&self.calls).clone()
    }

    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        locked(&self.writes).clone()
    }

    /// Emits a notification on the read characteristic of `address`
    pub fn notify(&self, address: &str, payload: &[u8]) -> bool {
        locked(&self.notifiers)
            .get(address)
            .map(|tx| tx.send(Ok(payload.to_vec())).is_ok())
            .unwrap_or(false)
    }

    /// Ends the notification stream of `address`, as a dropped link would
    pub fn drop_link(&self, address: &str) {
        locked(&self.notifiers).remove(address);
    }

    async fn record(&self, operation: &'static str, detail: &str) -> Result<(), RadioError> {
        let fault = locked(&self.faults).get(operation).copied();
        locked(&self.calls).push(format!("{}:{}", operation, detail));
        match fault {
            Some(Fault::Fail) => Err(RadioError::Other(format!("{} refused", operation))),
            Some(Fault::Hang) => std::future::pending().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RadioAdapter for MockRadio {
    type Peripheral = MockPeripheral;
    type Service = MockService;
    type Endpoint = MockEndpoint;

    async fn scan(&self, mut on_advertisement: AdvertisementCallback<MockPeripheral>) -> Result<(), RadioError> {
        let cancel_token = CancellationToken::new();
        *locked(&self.scan_cancel) = cancel_token.clone();
        self.record("scan", "").await?;

        for advertisement in &self.advertisements {
            on_advertisement(advertisement.clone());
        }
        if self.scan_until_stopped {
            cancel_token.cancelled().await;
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), RadioError> {
        locked(&self.scan_cancel).cancel();
        self.record("stop_scan", "").await
    }

    async fn connect(&self, peripheral: &MockPeripheral) -> Result<(), RadioError> {
        self.record("connect", &peripheral.0).await
    }

    async fn discover_service(
        &self,
        peripheral: &MockPeripheral,
        _uuid: Uuid,
    ) -> Result<Option<MockService>, RadioError> {
        self.record("discover_service", &peripheral.0).await?;
        if self.missing_service {
            return Ok(None);
        }
        Ok(Some(MockService(peripheral.0.clone())))
    }

    async fn discover_characteristics(
        &self,
        service: &MockService,
        uuids: &[Uuid],
    ) -> Result<Vec<MockEndpoint>, RadioError> {
        self.record("discover_characteristics", &service.0).await?;
        let count = self.characteristic_count.unwrap_or(uuids.len());
        Ok((0..count).map(|index| MockEndpoint::new(&service.0, index)).collect())
    }

    async fn write_without_response(&self, endpoint: &MockEndpoint, payload: &[u8]) -> Result<(), RadioError> {
        self.record("write", &format!("{}#{}", endpoint.address, endpoint.index)).await?;
        locked(&self.writes).push((endpoint.address.clone(), payload.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, endpoint: &MockEndpoint) -> Result<NotificationStream, RadioError> {
        self.record("subscribe", &format!("{}#{}", endpoint.address, endpoint.index)).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        locked(&self.notifiers).insert(endpoint.address.clone(), tx);
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn disconnect(&self, peripheral: &MockPeripheral) -> Result<(), RadioError> {
        self.record("disconnect", &peripheral.0).await
    }
}
