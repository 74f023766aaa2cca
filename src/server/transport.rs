//! WebSocket transport for the delivery loop

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;
use crate::hub::Transport;

/// Outbound half of a WebSocket connection
///
/// UTF-8 payloads are sent as text frames, anything else as binary.
pub struct WsTransport<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap the sink half of a split WebSocket stream
    pub fn new(sink: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self { sink }
    }
}

impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let message = match Utf8Bytes::try_from(payload.clone()) {
            Ok(text) => Message::Text(text),
            Err(_) => Message::Binary(payload),
        };
        self.sink.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.send(Message::Close(None)).await?;
        Ok(())
    }
}
