//! Notification relay for connected vehicles
//! Every payload a vehicle emits on its read characteristic is forwarded to the
//! controller as one `<address>;<hexPayload>` line.

use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::radio::{NotificationStream, RadioAdapter};
use crate::core::bluetooth::registry::ConnectionRegistry;
use crate::core::protocol::{ControlSender, OutboundMessage};

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    /// The vehicle's notification stream ended or failed
    StreamEnded,
    /// The controller is gone; the link is untouched
    ControlClosed,
    /// The record was replaced or disconnected
    Cancelled,
}

/// Notification handler for vehicle data
pub struct NotificationHandler<R: RadioAdapter> {
    connections: Arc<ConnectionRegistry<R>>,
}

impl<R: RadioAdapter> NotificationHandler<R> {
    pub fn new(connections: Arc<ConnectionRegistry<R>>) -> Self {
        Self { connections }
    }

    /// Starts relaying until `cancel` fires, the stream ends or the controller goes away.
    /// A stream that ends on its own means the link dropped, so the relay removes its
    /// connection record.
    pub fn start(
        &self,
        address: String,
        connection_id: u64,
        notifications: NotificationStream,
        cancel: CancellationToken,
        sender: ControlSender,
    ) -> JoinHandle<()> {
        let connections = self.connections.clone();

        tokio::spawn(async move {
            let end = Self::process_notifications(&address, notifications, &cancel, &sender).await;

            // A closed control connection leaves the link up, so the record must stay
            // reachable for a later DISCONNECT.
            if end == RelayEnd::StreamEnded && connections.remove_if_current(&address, connection_id).await {
                warn!("Lost link to {}, connection record removed", address);
            }
        })
    }

    async fn process_notifications(
        address: &str,
        mut notifications: NotificationStream,
        cancel: &CancellationToken,
        sender: &ControlSender,
    ) -> RelayEnd {
        info!("Listening for notifications from {}...", address);

        let end = loop {
            tokio::select! {
                item = notifications.next() => {
                    match item {
                        Some(Ok(value)) => {
                            let message = OutboundMessage::Notification {
                                address: address.to_string(),
                                payload: value,
                            };
                            debug!("RECEIVED: [{}]", message);
                            if sender.send(message).is_err() {
                                warn!("Control connection closed, dropping notifications from {}", address);
                                break RelayEnd::ControlClosed;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream of {}: {}", address, e);
                            break RelayEnd::StreamEnded;
                        }
                        None => break RelayEnd::StreamEnded,
                    }
                }
                _ = cancel.cancelled() => break RelayEnd::Cancelled,
            }
        };

        info!("Notification relay of {} stopped: {:?}", address, end);
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::error::RadioError;
    use crate::core::bluetooth::mock::{MockEndpoint, MockPeripheral, MockRadio};
    use crate::core::bluetooth::types::{CapabilityPair, ConnectionRecord};
    use futures_util::stream;

    fn record(address: &str, id: u64, relay: &CancellationToken) -> Arc<ConnectionRecord<MockRadio>> {
        Arc::new(ConnectionRecord {
            address: address.to_string(),
            id,
            connection_handle: MockPeripheral(address.to_string()),
            capabilities: CapabilityPair {
                write: MockEndpoint::new(address, 0),
                notify: MockEndpoint::new(address, 1),
            },
            relay: relay.clone(),
        })
    }

    #[tokio::test]
    async fn relays_payloads_as_hex_lines() {
        let connections = Arc::new(ConnectionRegistry::<MockRadio>::new());
        let handler = NotificationHandler::new(connections);
        let (sender, mut receiver) = ControlSender::channel();
        let payloads: NotificationStream = Box::pin(stream::iter(vec![Ok::<_, RadioError>(vec![0xaa, 0xbb])]));

        handler
            .start("58F1D2AABBCC".to_string(), 1, payloads, CancellationToken::new(), sender)
            .await
            .unwrap();

        let line = receiver.recv().await.unwrap().to_line();
        assert_eq!(line, "58F1D2AABBCC;aabb\n");
    }

    #[tokio::test]
    async fn ended_stream_removes_own_record_only() {
        let connections = Arc::new(ConnectionRegistry::<MockRadio>::new());
        let handler = NotificationHandler::new(connections.clone());
        let (sender, _receiver) = ControlSender::channel();
        let relay = CancellationToken::new();
        connections.insert(record("AA", 7, &relay)).await;

        let stale: NotificationStream = Box::pin(stream::empty::<Result<Vec<u8>, RadioError>>());
        handler
            .start("AA".to_string(), 3, stale, CancellationToken::new(), sender.clone())
            .await
            .unwrap();
        assert!(connections.get("AA").await.is_some());

        let current: NotificationStream = Box::pin(stream::empty::<Result<Vec<u8>, RadioError>>());
        handler
            .start("AA".to_string(), 7, current, relay, sender)
            .await
            .unwrap();
        assert!(connections.get("AA").await.is_none());
    }

    #[tokio::test]
    async fn cancelled_relay_keeps_record() {
        let connections = Arc::new(ConnectionRegistry::<MockRadio>::new());
        let handler = NotificationHandler::new(connections.clone());
        let (sender, _receiver) = ControlSender::channel();
        let relay = CancellationToken::new();
        connections.insert(record("AA", 1, &relay)).await;

        relay.cancel();
        let pending: NotificationStream = Box::pin(stream::pending::<Result<Vec<u8>, RadioError>>());
        handler
            .start("AA".to_string(), 1, pending, relay, sender)
            .await
            .unwrap();

        assert!(connections.get("AA").await.is_some());
    }

    #[tokio::test]
    async fn closed_control_connection_keeps_record() {
        let connections = Arc::new(ConnectionRegistry::<MockRadio>::new());
        let handler = NotificationHandler::new(connections.clone());
        let (sender, receiver) = ControlSender::channel();
        let relay = CancellationToken::new();
        connections.insert(record("AA", 1, &relay)).await;
        drop(receiver);

        let payloads: NotificationStream = Box::pin(
            stream::iter(vec![Ok::<_, RadioError>(vec![0x01])]).chain(stream::pending()),
        );
        handler
            .start("AA".to_string(), 1, payloads, relay, sender)
            .await
            .unwrap();

        assert!(connections.get("AA").await.is_some());
    }
}
