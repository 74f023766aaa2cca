//! Broadcast hub for connection membership and message fan-out
//!
//! The hub owns the set of live connections and the cached greeting. All
//! state lives in one task and is reached only through [`HubHandle`]
//! requests, so no lock guards it.
//!
//! # Architecture
//!
//! ```text
//!     [ingest task]            [accept tasks]
//!   handle.broadcast()   handle.register() / unregister()
//!          │                        │
//!          └──────────┬─────────────┘
//!                     ▼  unbounded mpsc
//!          ┌─────────────────────────┐
//!          │ Hub (single task)       │
//!          │   connections: HashMap  │
//!          │   greeting: Bytes       │
//!          └───────────┬─────────────┘
//!                      │ try_send (bounded, per connection)
//!        ┌─────────────┼─────────────┐
//!        ▼             ▼             ▼
//!    [Outbound]    [Outbound]    [Outbound]
//!    deliver()     deliver()     deliver()  ──► WebSocket
//! ```
//!
//! # Slow consumers
//!
//! Broadcast never waits on a connection. If a connection's queue is full
//! the hub evicts it on the spot: the handle is dropped, which closes the
//! queue, and the delivery loop drains what is left and sends a close.
//!
//! # Greeting
//!
//! The first non-empty payload ever broadcast is cached and queued to every
//! connection registered afterwards. It is never replaced.

pub mod config;
pub mod connection;
pub mod control;
pub mod id;

pub use config::HubConfig;
pub use connection::{ConnectionHandle, DeliveryOutcome, DeliveryReport, Outbound, Transport};
pub use control::{Hub, HubCommand, HubHandle};
pub use id::ConnectionId;
