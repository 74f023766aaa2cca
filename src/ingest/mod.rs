//! Ingestion of messages from the external producer
//!
//! The producer (typically a decoder writing JSON lines to our stdin) is
//! read through a [`FrameReader`] and every message is handed to the hub.

pub mod framing;

pub use framing::{FrameReader, Framing, DEFAULT_MAX_MESSAGE_SIZE, VARINT_MESSAGE_TAG};

use tokio::io::AsyncBufRead;

use crate::error::Result;
use crate::hub::HubHandle;

/// Broadcast every message from `reader` until end of stream
///
/// Returns the number of messages broadcast, or the first framing/I/O error.
pub async fn run_ingest<R>(mut reader: FrameReader<R>, hub: &HubHandle) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut count = 0u64;

    while let Some(frame) = reader.next_frame().await? {
        if count == 0 {
            tracing::info!(framing = %reader.framing(), bytes = frame.len(), "First message received");
        }
        hub.broadcast(frame);
        count += 1;
    }

    tracing::info!(messages = count, "Input closed");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::{Error, IngestError};
    use crate::hub::{Hub, HubConfig};

    #[tokio::test]
    async fn test_run_ingest_broadcasts_lines() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let (conn, mut out) = hub.new_connection();
        hub.register(conn);

        let input = Builder::new().read(b"alpha\nbravo\ncharlie\n").build();
        let reader = FrameReader::new(BufReader::new(input), Framing::Lines);

        let count = run_ingest(reader, &hub).await.unwrap();
        assert_eq!(count, 3);

        assert_eq!(out.recv().await, Some(Bytes::from_static(b"alpha")));
        assert_eq!(out.recv().await, Some(Bytes::from_static(b"bravo")));
        assert_eq!(out.recv().await, Some(Bytes::from_static(b"charlie")));

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.broadcasts, 3);
        assert_eq!(stats.greeting_len, 5);
    }

    #[tokio::test]
    async fn test_run_ingest_stops_on_framing_error() {
        let (hub, _task) = Hub::spawn(HubConfig::default());

        let input = Builder::new()
            .read(&[VARINT_MESSAGE_TAG, 2, b'o', b'k', 0x7b])
            .build();
        let reader = FrameReader::new(BufReader::new(input), Framing::Varint);

        let err = run_ingest(reader, &hub).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingest(IngestError::InvalidMessageType(0x7b))
        ));

        // The message before the bad tag still went out
        assert_eq!(hub.stats().await.unwrap().broadcasts, 1);
    }
}
