use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failure to turn a text frame into a protocol event.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected event `{0}`")]
    UnknownEvent(String),
}

/// Errors surfaced by [`crate::client::session::LocationClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("connection closed")]
    Closed,
}
