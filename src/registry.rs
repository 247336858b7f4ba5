//! Set of currently open connections.

use std::collections::hash_map::{Entry, HashMap};

use futures_channel::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::Connection;
use crate::protocol::ConnectionId;

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new connection under an identity no open connection holds.
    pub fn register(&mut self, tx: UnboundedSender<Message>) -> ConnectionId {
        loop {
            let id = ConnectionId::new();
            if let Entry::Vacant(slot) = self.connections.entry(id) {
                let _ = slot.insert(Connection::new(id, tx));
                return id;
            }
        }
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
