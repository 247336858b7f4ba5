//! Real-time location sharing relay.
//!
//! Clients hold a WebSocket open, push `send-location` fixes, and receive
//! every connection's fixes back as `receive-location`. When a connection
//! closes the others are told with `user-disconnected`.

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use broadcaster::Broadcaster;
pub use config::ServerConfig;
pub use server::RelayServer;
