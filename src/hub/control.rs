//! Hub control loop
//!
//! The hub owns the connection set and the cached greeting. Both live inside
//! [`Hub`], which is moved into a single task; everything else talks to it
//! through a cloneable [`HubHandle`] that enqueues [`HubCommand`]s. Requests
//! are processed one at a time in arrival order, so no lock guards the state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::stats::HubStats;

use super::config::HubConfig;
use super::connection::{self, ConnectionHandle, EnqueueError, Outbound};
use super::id::ConnectionId;

/// Request sent to the control loop
#[derive(Debug)]
pub enum HubCommand {
    /// Add a connection and replay the greeting to it
    Register(ConnectionHandle),
    /// Remove a connection and close its queue (no-op if absent)
    Unregister(ConnectionId),
    /// Fan a payload out to every connection
    Broadcast(Bytes),
    /// Report a statistics snapshot
    Stats(oneshot::Sender<HubStats>),
}

/// State owned by the control loop
pub struct Hub {
    /// Registered connections
    connections: HashMap<ConnectionId, ConnectionHandle>,

    /// First payload ever broadcast (empty until then)
    greeting: Bytes,

    /// Incoming requests
    rx: mpsc::UnboundedReceiver<HubCommand>,

    broadcasts: u64,
    registrations: u64,
    evictions: u64,
}

impl Hub {
    /// Create a hub and the handle used to reach it
    ///
    /// The hub does nothing until [`Hub::run`] is awaited.
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Self {
            connections: HashMap::new(),
            greeting: Bytes::new(),
            rx,
            broadcasts: 0,
            registrations: 0,
            evictions: 0,
        };

        let handle = HubHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: config.queue_capacity,
        };

        (hub, handle)
    }

    /// Create a hub and spawn its control loop
    pub fn spawn(config: HubConfig) -> (HubHandle, tokio::task::JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Run the control loop until every [`HubHandle`] has been dropped
    pub async fn run(mut self) {
        tracing::debug!("Hub control loop started");

        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }

        tracing::debug!(
            connections = self.connections.len(),
            "Hub control loop stopped"
        );
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(conn) => self.register(conn),
            HubCommand::Unregister(id) => self.unregister(id),
            HubCommand::Broadcast(payload) => self.broadcast(payload),
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn register(&mut self, conn: ConnectionHandle) {
        let id = conn.id();
        self.registrations += 1;

        if !self.greeting.is_empty() {
            // Fresh queue (capacity is at least 1), so this only fails if
            // the delivery loop is already gone.
            if conn.try_enqueue(self.greeting.clone()).is_err() {
                tracing::debug!(conn = %id, "Connection gone before greeting");
                return;
            }
        }

        self.connections.insert(id, conn);

        tracing::debug!(
            conn = %id,
            connections = self.connections.len(),
            greeting = !self.greeting.is_empty(),
            "Connection registered"
        );
    }

    fn unregister(&mut self, id: ConnectionId) {
        // Dropping the handle closes the queue.
        if self.connections.remove(&id).is_some() {
            tracing::debug!(
                conn = %id,
                connections = self.connections.len(),
                "Connection unregistered"
            );
        }
    }

    fn broadcast(&mut self, payload: Bytes) {
        self.broadcasts += 1;

        if self.greeting.is_empty() {
            self.greeting = payload.clone();
        }

        let mut evictions = 0;
        self.connections
            .retain(|id, conn| match conn.try_enqueue(payload.clone()) {
                Ok(()) => true,
                Err(EnqueueError::Full) => {
                    tracing::info!(conn = %id, "Evicting slow consumer");
                    evictions += 1;
                    false
                }
                Err(EnqueueError::Closed) => {
                    tracing::debug!(conn = %id, "Dropping closed connection");
                    false
                }
            });
        self.evictions += evictions;
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            greeting_len: self.greeting.len(),
            broadcasts: self.broadcasts,
            registrations: self.registrations,
            evictions: self.evictions,
        }
    }
}

/// Cloneable entry point to a running hub
///
/// Every method returns immediately. If the control loop has stopped the
/// request is discarded.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl HubHandle {
    /// Allocate a new, not yet registered connection
    pub fn new_connection(&self) -> (ConnectionHandle, Outbound) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        connection::channel(id, self.queue_capacity)
    }

    /// Register a connection; the cached greeting is queued for it first
    pub fn register(&self, conn: ConnectionHandle) {
        self.send(HubCommand::Register(conn));
    }

    /// Unregister a connection, closing its queue (idempotent)
    pub fn unregister(&self, id: ConnectionId) {
        self.send(HubCommand::Unregister(id));
    }

    /// Fan a payload out to every registered connection
    pub fn broadcast(&self, payload: impl Into<Bytes>) {
        self.send(HubCommand::Broadcast(payload.into()));
    }

    /// Ask the control loop for a statistics snapshot
    ///
    /// Returns `None` if the control loop is no longer running.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Stats(reply_tx));
        reply_rx.await.ok()
    }

    fn send(&self, command: HubCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!("Hub control loop is not running; request dropped");
        }
    }
}
