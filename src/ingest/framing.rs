//! Message framing on the ingestion stream

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{IngestError, Result};

/// Default upper bound on a single message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Field tag that precedes every varint-framed message
pub const VARINT_MESSAGE_TAG: u8 = 0x0a;

/// Largest varint shift accepted (four length bytes)
const MAX_VARINT_SHIFT: u32 = 21;

/// How the ingestion byte stream is split into messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Newline-delimited; the newline (and a preceding `\r`) is stripped
    #[default]
    Lines,
    /// Tag byte `0x0a`, base-128 varint length, then the payload
    Varint,
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" | "line" => Ok(Framing::Lines),
            "varint" => Ok(Framing::Varint),
            other => Err(format!("unknown framing '{}' (expected lines or varint)", other)),
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Lines => write!(f, "lines"),
            Framing::Varint => write!(f, "varint"),
        }
    }
}

/// Reads framed messages from a buffered byte stream
pub struct FrameReader<R> {
    reader: R,
    framing: Framing,
    max_message_size: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    /// Create a reader with the default size limit
    pub fn new(reader: R, framing: Framing) -> Self {
        Self {
            reader,
            framing,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buf: Vec::new(),
        }
    }

    /// Set the maximum message size
    pub fn max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Framing in use
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Read the next message
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match self.framing {
            Framing::Lines => self.next_line().await,
            Framing::Varint => self.next_varint().await,
        }
    }

    async fn next_line(&mut self) -> Result<Option<Bytes>> {
        // Room for the payload plus "\r\n"
        let limit = (self.max_message_size as u64).saturating_add(2);

        loop {
            self.buf.clear();
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Ok(None);
            }

            let terminated = self.buf.last() == Some(&b'\n');
            if terminated {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
            } else if n as u64 == limit {
                return Err(IngestError::MessageTooLarge {
                    len: n,
                    max: self.max_message_size,
                }
                .into());
            }

            if self.buf.len() > self.max_message_size {
                return Err(IngestError::MessageTooLarge {
                    len: self.buf.len(),
                    max: self.max_message_size,
                }
                .into());
            }

            if !self.buf.is_empty() {
                return Ok(Some(Bytes::copy_from_slice(&self.buf)));
            }
        }
    }

    async fn next_varint(&mut self) -> Result<Option<Bytes>> {
        let tag = match self.reader.read_u8().await {
            Ok(tag) => tag,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if tag != VARINT_MESSAGE_TAG {
            return Err(IngestError::InvalidMessageType(tag).into());
        }

        let len = self.read_varint().await? as usize;
        if len > self.max_message_size {
            return Err(IngestError::MessageTooLarge {
                len,
                max: self.max_message_size,
            }
            .into());
        }

        self.buf.clear();
        self.buf.resize(len, 0);
        let mut filled = 0;
        while filled < len {
            let n = self.reader.read(&mut self.buf[filled..]).await?;
            if n == 0 {
                return Err(IngestError::ShortRead {
                    expected: len,
                    actual: filled,
                }
                .into());
            }
            filled += n;
        }

        Ok(Some(Bytes::copy_from_slice(&self.buf)))
    }

    async fn read_varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;

        loop {
            let byte = self.reader.read_u8().await?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > MAX_VARINT_SHIFT {
                return Err(IngestError::InvalidVarint.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;

    fn reader(chunks: &[&[u8]], framing: Framing) -> FrameReader<BufReader<tokio_test::io::Mock>> {
        let mut builder = Builder::new();
        for chunk in chunks {
            builder.read(chunk);
        }
        FrameReader::new(BufReader::new(builder.build()), framing)
    }

    async fn collect<R: AsyncBufRead + Unpin>(reader: &mut FrameReader<R>) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("lines".parse::<Framing>(), Ok(Framing::Lines));
        assert_eq!("VARINT".parse::<Framing>(), Ok(Framing::Varint));
        assert!("chunked".parse::<Framing>().is_err());
        assert_eq!(Framing::default(), Framing::Lines);
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let mut r = reader(&[b"{\"hex\":\"a1\"}\n{\"he", b"x\":\"b2\"}\r\n\n"], Framing::Lines);

        let frames = collect(&mut r).await;
        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"{\"hex\":\"a1\"}"),
                Bytes::from_static(b"{\"hex\":\"b2\"}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_lines_unterminated_tail() {
        let mut r = reader(&[b"one\ntwo"], Framing::Lines);

        let frames = collect(&mut r).await;
        assert_eq!(frames, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    }

    #[tokio::test]
    async fn test_lines_too_large() {
        let mut r = reader(&[b"abcdefghij\n"], Framing::Lines).max_message_size(4);

        let err = r.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingest(IngestError::MessageTooLarge { max: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_lines_unbounded_limit() {
        let mut r = reader(&[b"hello\n"], Framing::Lines).max_message_size(usize::MAX);

        let frames = collect(&mut r).await;
        assert_eq!(frames, vec![Bytes::from_static(b"hello")]);
    }

    #[tokio::test]
    async fn test_varint_frames() {
        let mut long = vec![VARINT_MESSAGE_TAG, 0xac, 0x02];
        long.extend(std::iter::repeat(b'x').take(300));

        let mut r = reader(&[&[VARINT_MESSAGE_TAG, 3], b"abc", long.as_slice()], Framing::Varint);

        let frames = collect(&mut r).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Bytes::from_static(b"abc"));
        assert_eq!(frames[1].len(), 300);
    }

    #[tokio::test]
    async fn test_varint_invalid_tag() {
        let mut r = reader(&[&[0x12, 1, b'a']], Framing::Varint);

        let err = r.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingest(IngestError::InvalidMessageType(0x12))
        ));
    }

    #[tokio::test]
    async fn test_varint_length_too_long() {
        let mut r = reader(&[&[VARINT_MESSAGE_TAG, 0x80, 0x80, 0x80, 0x80, 0x01]], Framing::Varint);

        let err = r.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::Ingest(IngestError::InvalidVarint)));
    }

    #[tokio::test]
    async fn test_varint_short_read() {
        let mut r = reader(&[&[VARINT_MESSAGE_TAG, 5], b"ab"], Framing::Varint);

        let err = r.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingest(IngestError::ShortRead {
                expected: 5,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_varint_too_large() {
        let mut r = reader(&[&[VARINT_MESSAGE_TAG, 0x10]], Framing::Varint).max_message_size(8);

        let err = r.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingest(IngestError::MessageTooLarge { len: 16, max: 8 })
        ));
    }
}
