//! WebSocket server
//!
//! Accepts TCP connections, upgrades them on the configured path and ties
//! each client to the hub through a delivery loop.

pub mod config;
pub mod listener;
pub mod transport;

pub use config::ServerConfig;
pub use listener::StreamServer;
pub use transport::WsTransport;
