//! Fan-out of location updates and departures to every open connection.

use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::protocol::{self, ConnectionId, ServerEvent, RECEIVE_LOCATION};
use crate::registry::Registry;

/// Owns the connection registry and relays events across it.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Mutex<Registry>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
        }
    }

    /// Register a new connection and hand back the queue its socket writer drains.
    pub async fn on_connect(&self) -> (ConnectionId, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded::<Message>();
        let id = self.registry.lock().await.register(tx);
        info!(%id, "connection registered");
        (id, rx)
    }

    /// Relay a `send-location` payload, tagged with `sender`, to every
    /// connection, the sender included.
    ///
    /// The payload is not validated; whatever the client sent goes out.
    pub async fn on_location_update(&self, sender: ConnectionId, data: Value) {
        let text = match protocol::encode_relayed(sender, data) {
            Ok(text) => text,
            Err(e) => {
                error!(event = RECEIVE_LOCATION, error = %e, "failed to serialize event");
                return;
            }
        };
        let registry = self.registry.lock().await;
        fan_out(&registry, RECEIVE_LOCATION, &text);
    }

    /// Drop `id` from the registry and tell everyone left that it is gone.
    ///
    /// Does nothing for an id that is no longer registered.
    pub async fn on_disconnect(&self, id: ConnectionId) {
        let mut registry = self.registry.lock().await;
        if registry.remove(&id).is_none() {
            debug!(%id, "disconnect for unknown connection");
            return;
        }
        info!(%id, remaining = registry.len(), "connection removed");
        let event = ServerEvent::UserDisconnected(id);
        match event.encode() {
            Ok(text) => fan_out(&registry, event.name(), &text),
            Err(e) => error!(event = event.name(), error = %e, "failed to serialize event"),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

fn fan_out(registry: &Registry, event: &str, text: &str) {
    let mut delivered = 0usize;
    for conn in registry.iter() {
        if conn.send(text.to_owned()) {
            delivered += 1;
        } else {
            debug!(conn_id = %conn.id, event, "recipient gone, update dropped");
        }
    }
    debug!(event, delivered, "broadcast event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LocationSample, RelayedUpdate};
    use futures_util::{FutureExt, StreamExt};
    use serde_json::json;

    fn sample(latitude: f64, longitude: f64) -> Value {
        serde_json::to_value(LocationSample::new(latitude, longitude)).unwrap()
    }

    fn next_raw(rx: &mut UnboundedReceiver<Message>) -> Option<Value> {
        match rx.next().now_or_never() {
            Some(Some(Message::Text(text))) => Some(serde_json::from_str(&text).unwrap()),
            _ => None,
        }
    }

    fn next_event(rx: &mut UnboundedReceiver<Message>) -> Option<ServerEvent> {
        match rx.next().now_or_never() {
            Some(Some(Message::Text(text))) => Some(ServerEvent::decode(&text).unwrap()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn connect_registers() {
        let broadcaster = Broadcaster::new();
        let (a, _rx_a) = broadcaster.on_connect().await;
        let (b, _rx_b) = broadcaster.on_connect().await;
        assert_ne!(a, b);
        assert_eq!(broadcaster.connection_count().await, 2);
    }

    #[tokio::test]
    async fn update_reaches_everyone_including_sender() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = broadcaster.on_connect().await;
        let (_b, mut rx_b) = broadcaster.on_connect().await;
        let (_c, mut rx_c) = broadcaster.on_connect().await;

        broadcaster
            .on_location_update(a, sample(10.0, 20.0))
            .await;

        let expected = ServerEvent::ReceiveLocation(RelayedUpdate::new(
            a,
            LocationSample::new(10.0, 20.0),
        ));
        assert_eq!(next_event(&mut rx_a), Some(expected.clone()));
        assert_eq!(next_event(&mut rx_b), Some(expected.clone()));
        assert_eq!(next_event(&mut rx_c), Some(expected));
    }

    #[tokio::test]
    async fn disconnect_announced_once_to_remaining() {
        let broadcaster = Broadcaster::new();
        let (a, rx_a) = broadcaster.on_connect().await;
        let (_b, mut rx_b) = broadcaster.on_connect().await;
        drop(rx_a);

        broadcaster.on_disconnect(a).await;
        broadcaster.on_disconnect(a).await;

        assert_eq!(next_event(&mut rx_b), Some(ServerEvent::UserDisconnected(a)));
        assert_eq!(next_event(&mut rx_b), None);
        assert_eq!(broadcaster.connection_count().await, 1);
    }

    #[tokio::test]
    async fn dead_recipient_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let (a, _rx_a) = broadcaster.on_connect().await;
        let (_b, rx_b) = broadcaster.on_connect().await;
        let (_c, mut rx_c) = broadcaster.on_connect().await;
        drop(rx_b);

        broadcaster
            .on_location_update(a, sample(1.0, 2.0))
            .await;

        assert!(matches!(
            next_event(&mut rx_c),
            Some(ServerEvent::ReceiveLocation(update)) if update.id == a
        ));
    }

    #[tokio::test]
    async fn update_with_no_other_connections() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = broadcaster.on_connect().await;
        broadcaster
            .on_location_update(a, sample(0.0, 0.0))
            .await;
        let frame = rx_a.next().await;
        assert!(matches!(frame, Some(Message::Text(_))));
    }

    #[tokio::test]
    async fn disconnect_of_unknown_id_is_silent() {
        let broadcaster = Broadcaster::new();
        let (_a, mut rx_a) = broadcaster.on_connect().await;
        broadcaster.on_disconnect(ConnectionId::new()).await;
        assert_eq!(next_event(&mut rx_a), None);
    }

    #[tokio::test]
    async fn malformed_payload_is_relayed_as_is() {
        let broadcaster = Broadcaster::new();
        let (a, _rx_a) = broadcaster.on_connect().await;
        let (_b, mut rx_b) = broadcaster.on_connect().await;

        broadcaster
            .on_location_update(a, json!({"latitude": "north", "longitude": 2}))
            .await;

        assert_eq!(
            next_raw(&mut rx_b),
            Some(json!({
                "event": RECEIVE_LOCATION,
                "data": {"id": a.to_string(), "latitude": "north", "longitude": 2},
            }))
        );
    }

    #[tokio::test]
    async fn sender_cannot_forge_its_id() {
        let broadcaster = Broadcaster::new();
        let (a, _rx_a) = broadcaster.on_connect().await;
        let (b, mut rx_b) = broadcaster.on_connect().await;

        broadcaster
            .on_location_update(a, json!({"id": b.to_string(), "latitude": 1.0, "longitude": 2.0}))
            .await;

        let relayed = next_raw(&mut rx_b).unwrap();
        assert_eq!(relayed["data"]["id"], json!(a.to_string()));
    }
}
