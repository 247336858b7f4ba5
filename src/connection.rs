use futures_channel::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::ConnectionId;

/// Write side of one open relay connection.
#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub tx: UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, tx: UnboundedSender<Message>) -> Self {
        Self { id, tx }
    }

    /// Queue a text frame for the socket writer.
    ///
    /// Returns `false` once the writer is gone.
    pub fn send(&self, text: String) -> bool {
        self.tx.unbounded_send(Message::Text(text)).is_ok()
    }
}
