//! # adsb-ws
//!
//! Relays a stream of line-delimited telemetry messages (for example decoded
//! ADS-B JSON from `adsbus`) to any number of WebSocket clients.
//!
//! - [`hub`]: single-task broadcast hub with per-connection bounded queues,
//!   slow-consumer eviction and a cached first-message greeting
//! - [`server`]: TCP accept loop and WebSocket upgrade
//! - [`ingest`]: framing of the producer's byte stream
//!
//! ```no_run
//! use adsb_ws::hub::{Hub, HubConfig};
//! use adsb_ws::ingest::{run_ingest, FrameReader, Framing};
//! use adsb_ws::server::{ServerConfig, StreamServer};
//!
//! # async fn example() -> adsb_ws::error::Result<()> {
//! let (hub, _hub_task) = Hub::spawn(HubConfig::default());
//!
//! let server = StreamServer::new(ServerConfig::default(), hub.clone());
//! tokio::spawn(async move { server.run().await });
//!
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! run_ingest(FrameReader::new(stdin, Framing::Lines), &hub).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod ingest;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{Hub, HubConfig, HubHandle};
pub use server::{ServerConfig, StreamServer};
