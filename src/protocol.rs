//! JSON envelopes exchanged over the relay socket.
//!
//! Every text frame is `{"event": <name>, "data": <payload>}`. Clients send
//! `send-location`; the server sends `receive-location` and
//! `user-disconnected`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ProtocolError;

pub const SEND_LOCATION: &str = "send-location";
pub const RECEIVE_LOCATION: &str = "receive-location";
pub const USER_DISCONNECTED: &str = "user-disconnected";

/// Key the server tags every relayed location with.
pub const ORIGIN_KEY: &str = "id";

/// Identity the server assigns to a connection for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One position fix reported by a client.
///
/// Coordinates are not range checked. Keys other than `latitude` and
/// `longitude` are kept in `extra` and relayed untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            extra: Map::new(),
        }
    }
}

/// A [`LocationSample`] tagged with the connection it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayedUpdate {
    pub id: ConnectionId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelayedUpdate {
    pub fn new(id: ConnectionId, sample: LocationSample) -> Self {
        let mut extra = sample.extra;
        let _ = extra.remove(ORIGIN_KEY);
        Self {
            id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            extra,
        }
    }
}

/// Tag a `send-location` payload with its origin, keeping every other key
/// exactly as the client sent it.
///
/// Object payloads are copied key by key; any `id` the client put there is
/// replaced by `origin`. Anything that is not an object contributes no keys.
pub fn tag_origin(origin: ConnectionId, data: Value) -> Map<String, Value> {
    let mut tagged = match data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let _ = tagged.insert(ORIGIN_KEY.to_owned(), Value::String(origin.to_string()));
    tagged
}

/// Build the `receive-location` frame relayed for a raw `send-location` payload.
pub fn encode_relayed(origin: ConnectionId, data: Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope::new(RECEIVE_LOCATION, &tag_origin(origin, data))?)
}

/// Raw frame shape shared by both directions.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    fn new<T: Serialize>(event: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_owned(),
            data: serde_json::to_value(data)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    SendLocation(LocationSample),
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope = Envelope::decode(text)?;
        match envelope.event.as_str() {
            SEND_LOCATION => Ok(Self::SendLocation(serde_json::from_value(envelope.data)?)),
            other => Err(ProtocolError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let envelope = match self {
            Self::SendLocation(sample) => Envelope::new(SEND_LOCATION, sample)?,
        };
        serde_json::to_string(&envelope)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    ReceiveLocation(RelayedUpdate),
    UserDisconnected(ConnectionId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReceiveLocation(_) => RECEIVE_LOCATION,
            Self::UserDisconnected(_) => USER_DISCONNECTED,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope = Envelope::decode(text)?;
        match envelope.event.as_str() {
            RECEIVE_LOCATION => Ok(Self::ReceiveLocation(serde_json::from_value(
                envelope.data,
            )?)),
            USER_DISCONNECTED => Ok(Self::UserDisconnected(serde_json::from_value(
                envelope.data,
            )?)),
            other => Err(ProtocolError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let envelope = match self {
            Self::ReceiveLocation(update) => Envelope::new(RECEIVE_LOCATION, update)?,
            Self::UserDisconnected(id) => Envelope::new(USER_DISCONNECTED, id)?,
        };
        serde_json::to_string(&envelope)
    }
}
