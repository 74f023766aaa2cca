//! Error types
//!
//! Hub operations never fail from the caller's side; these errors come from
//! the edges of the relay (sockets, WebSocket frames and stdin framing).

use tokio_tungstenite::tungstenite;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or stdin I/O failure
    Io(std::io::Error),
    /// WebSocket handshake or frame failure
    WebSocket(tungstenite::Error),
    /// Malformed ingestion stream
    Ingest(IngestError),
    /// Handshake did not complete in time
    HandshakeTimeout,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Ingest(e) => write!(f, "Ingest error: {}", e),
            Error::HandshakeTimeout => write!(f, "Handshake timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Ingest(e) => Some(e),
            Error::HandshakeTimeout => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

impl From<IngestError> for Error {
    fn from(e: IngestError) -> Self {
        Error::Ingest(e)
    }
}

/// Framing errors on the ingestion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Varint framing: leading byte was not the expected field tag
    InvalidMessageType(u8),
    /// Varint framing: length prefix longer than four bytes
    InvalidVarint,
    /// Varint framing: stream ended inside a message
    ShortRead { expected: usize, actual: usize },
    /// Message exceeds the configured size limit
    MessageTooLarge { len: usize, max: usize },
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::InvalidMessageType(tag) => {
                write!(f, "Invalid message type: 0x{:02x}", tag)
            }
            IngestError::InvalidVarint => write!(f, "Invalid varint length prefix"),
            IngestError::ShortRead { expected, actual } => {
                write!(f, "Short read: expected {} bytes, got {}", expected, actual)
            }
            IngestError::MessageTooLarge { len, max } => {
                write!(f, "Message too large: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for IngestError {}
