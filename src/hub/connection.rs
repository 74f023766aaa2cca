//! Per-client outbound queue and delivery loop
//!
//! A connection is split into two halves that share one bounded queue:
//!
//! - [`ConnectionHandle`]: the producer end. Once registered it is owned by
//!   the hub control loop, which is the only writer. Dropping it closes the
//!   queue.
//! - [`Outbound`]: the consumer end, drained by [`Outbound::deliver`] into a
//!   [`Transport`] until the queue is closed or a write fails.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Error, Result};
use crate::stats::ConnectionStats;

use super::id::ConnectionId;

/// Network side of a connection, as seen by the delivery loop
pub trait Transport: Send {
    /// Write one payload to the peer
    fn send(&mut self, payload: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Send a close/termination signal to the peer
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Create the two halves of a connection with the given queue capacity
///
/// A capacity of 0 is raised to 1.
pub fn channel(id: ConnectionId, capacity: usize) -> (ConnectionHandle, Outbound) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ConnectionHandle { id, tx }, Outbound { id, rx })
}

/// Why a non-blocking enqueue was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EnqueueError {
    /// Queue at capacity, consumer is too slow
    Full,
    /// Delivery loop has already exited
    Closed,
}

/// Producer end of a connection's outbound queue
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueue without waiting
    pub(super) fn try_enqueue(&self, payload: Bytes) -> std::result::Result<(), EnqueueError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// How a delivery loop ended
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Queue closed by the hub and fully drained; a close was sent
    Closed,
    /// Writing to the transport failed; remaining items were abandoned
    WriteFailed(Error),
}

/// Summary returned when a delivery loop exits
#[derive(Debug)]
pub struct DeliveryReport {
    /// Connection the loop served
    pub id: ConnectionId,
    /// Exit reason
    pub outcome: DeliveryOutcome,
    /// What was delivered before exit
    pub stats: ConnectionStats,
}

/// Consumer end of a connection's outbound queue
#[derive(Debug)]
pub struct Outbound {
    id: ConnectionId,
    rx: mpsc::Receiver<Bytes>,
}

impl Outbound {
    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Take the next payload, or `None` once the queue is closed and empty
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Run the delivery loop
    ///
    /// Payloads are written in queue order. When the hub closes the queue the
    /// remaining items are still written, then the transport is closed. A
    /// failed write ends the loop immediately.
    pub async fn deliver<T: Transport>(mut self, transport: &mut T) -> DeliveryReport {
        let mut stats = ConnectionStats::new();

        loop {
            let Some(payload) = self.rx.recv().await else {
                if let Err(e) = transport.close().await {
                    tracing::debug!(conn = %self.id, error = %e, "Close signal not sent");
                }
                return DeliveryReport {
                    id: self.id,
                    outcome: DeliveryOutcome::Closed,
                    stats,
                };
            };

            let len = payload.len();
            if let Err(e) = transport.send(payload).await {
                tracing::debug!(conn = %self.id, error = %e, "Write failed");
                return DeliveryReport {
                    id: self.id,
                    outcome: DeliveryOutcome::WriteFailed(e),
                    stats,
                };
            }
            stats.record(len);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transports for exercising the delivery loop

    use super::*;

    /// Records every payload and whether a close was sent
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub sent: Vec<Bytes>,
        pub closed: bool,
        /// Fail the write after this many successful sends
        pub fail_after: Option<usize>,
    }

    impl RecordingTransport {
        pub fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Default::default()
            }
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&mut self, payload: Bytes) -> Result<()> {
            if self.fail_after == Some(self.sent.len()) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "peer gone",
                )));
            }
            self.sent.push(payload);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }
}
