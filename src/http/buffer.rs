//! Per-connection byte accumulator.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Limits;
use crate::error::Result;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Growing receive buffer for one connection.
///
/// Bytes are appended at the tail as they arrive and split off the head as
/// they are consumed; consumed bytes are never revisited. Whatever remains
/// after a request has been consumed is the start of the next pipelined
/// request (or, after an upgrade, the first WebSocket bytes).
#[derive(Debug)]
pub struct ConnectionBuffer {
    buf: BytesMut,
    limits: Limits,
    read_size: usize,
}

impl ConnectionBuffer {
    /// Create an empty buffer enforcing `limits.max_header_size`.
    #[must_use]
    pub fn new(limits: Limits, read_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(read_size),
            limits,
            read_size: read_size.max(1),
        }
    }

    /// Append received bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Read once from `io` into the buffer. Returns 0 on end of stream.
    ///
    /// # Errors
    ///
    /// Propagates the I/O error from the underlying read.
    pub async fn read_from<R: AsyncRead + Unpin>(&mut self, io: &mut R) -> Result<usize> {
        self.buf.reserve(self.read_size);
        let n = io.read_buf(&mut self.buf).await?;
        Ok(n)
    }

    /// Offset of the first `\r\n\r\n`, if any.
    #[must_use]
    pub fn find_header_end(&self) -> Option<usize> {
        find(&self.buf, HEADER_TERMINATOR)
    }

    /// Length of the complete header block (terminator included), if buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderTooLarge`](crate::Error::HeaderTooLarge) if the
    /// block exceeds `max_header_size`, or once the buffer holds that many
    /// bytes without a terminator.
    pub fn complete_header_len(&self) -> Result<Option<usize>> {
        match self.find_header_end() {
            Some(end) => {
                let len = end + HEADER_TERMINATOR.len();
                self.limits.check_header_size(len)?;
                Ok(Some(len))
            }
            None => {
                // Still unterminated, so the block is at least one byte longer.
                self.limits.check_header_size(self.buf.len() + 1)?;
                Ok(None)
            }
        }
    }

    /// Split off and return the first `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n > self.len()`.
    pub fn consume(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    /// Unconsumed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access for incremental body decoders.
    pub(crate) fn bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether all received bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Give up the unconsumed bytes (used at the WebSocket handoff).
    #[must_use]
    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
