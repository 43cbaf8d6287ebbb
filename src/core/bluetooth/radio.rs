//! Radio subsystem capability
//! The bridge core only talks to the radio through [`RadioAdapter`], so the
//! protocol engine can run against real hardware or a scripted adapter.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use uuid::Uuid;

use crate::core::bluetooth::error::RadioError;

/// One advertisement seen during a scan
#[derive(Debug, Clone)]
pub struct Advertisement<P> {
    /// Address as reported by the platform, not yet normalized
    pub address: String,
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Vendor payload of the manufacturer-specific data, company id stripped
    pub manufacturer_data: Option<Vec<u8>>,
    /// Handle needed to connect to the advertiser
    pub peripheral: P,
}

/// Callback invoked once per received advertisement
pub type AdvertisementCallback<P> = Box<dyn FnMut(Advertisement<P>) + Send>;

/// Payloads emitted by a subscribed characteristic
pub type NotificationStream = BoxStream<'static, Result<Vec<u8>, RadioError>>;

#[async_trait]
pub trait RadioAdapter: Send + Sync + 'static {
    /// Address handle, also used as the connection handle once connected
    type Peripheral: Clone + Send + Sync + 'static;
    /// A discovered GATT service
    type Service: Send + Sync + 'static;
    /// A discovered characteristic
    type Endpoint: Clone + Send + Sync + 'static;

    /// Scans until the scan ends on its own or `stop_scan` is called.
    async fn scan(
        &self,
        on_advertisement: AdvertisementCallback<Self::Peripheral>,
    ) -> Result<(), RadioError>;

    async fn stop_scan(&self) -> Result<(), RadioError>;

    async fn connect(&self, peripheral: &Self::Peripheral) -> Result<(), RadioError>;

    /// Returns `None` when the peripheral does not expose the service.
    async fn discover_service(
        &self,
        peripheral: &Self::Peripheral,
        uuid: Uuid,
    ) -> Result<Option<Self::Service>, RadioError>;

    /// Returns the characteristics found, in the order they were requested.
    async fn discover_characteristics(
        &self,
        service: &Self::Service,
        uuids: &[Uuid],
    ) -> Result<Vec<Self::Endpoint>, RadioError>;

    async fn write_without_response(
        &self,
        endpoint: &Self::Endpoint,
        payload: &[u8],
    ) -> Result<(), RadioError>;

    /// Enables notifications. The stream ends when the link is lost.
    async fn subscribe(&self, endpoint: &Self::Endpoint) -> Result<NotificationStream, RadioError>;

    async fn disconnect(&self, peripheral: &Self::Peripheral) -> Result<(), RadioError>;
}
