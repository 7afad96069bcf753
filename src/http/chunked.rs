//! Incremental decoder for `Transfer-Encoding: chunked` request bodies.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::http::buffer::find;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a `size[;ext]\r\n` line.
    Size,
    /// Inside chunk data; this many bytes remain.
    Data(usize),
    /// Waiting for the CRLF that ends a chunk.
    DataEnd,
    /// After the last chunk; trailer lines until an empty line.
    Trailer,
    Done,
}

/// Resumable chunked body decoder.
///
/// Bytes are consumed from the connection buffer as they arrive; the state
/// survives across reads so a body split at any byte boundary decodes the
/// same way. Trailer fields are read and discarded.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
    body: BytesMut,
    max_line: usize,
    max_body: Option<usize>,
}

impl ChunkedDecoder {
    /// Create a decoder. `max_line` bounds chunk-size and trailer lines.
    #[must_use]
    pub fn new(max_line: usize, max_body: Option<usize>) -> Self {
        Self {
            state: State::Size,
            body: BytesMut::new(),
            max_line,
            max_body,
        }
    }

    /// Decode as much of `src` as possible.
    ///
    /// Returns the complete body once the terminating chunk and trailer
    /// section have been consumed; bytes after it stay in `src`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidChunkedEncoding` on malformed framing
    /// - `Error::BodyTooLarge` if the decoded body exceeds `max_body`
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::Size => {
                    let Some(line) = self.take_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&line)?;
                    if let Some(max) = self.max_body {
                        let total = self.body.len().saturating_add(size);
                        if total > max {
                            return Err(Error::BodyTooLarge { size: total, max });
                        }
                    }
                    self.state = if size == 0 {
                        State::Trailer
                    } else {
                        State::Data(size)
                    };
                }
                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let n = remaining.min(src.len());
                    self.body.extend_from_slice(&src[..n]);
                    src.advance(n);
                    self.state = if n == remaining {
                        State::DataEnd
                    } else {
                        State::Data(remaining - n)
                    };
                }
                State::DataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(Error::InvalidChunkedEncoding(
                            "missing CRLF after chunk data".into(),
                        ));
                    }
                    src.advance(2);
                    self.state = State::Size;
                }
                State::Trailer => {
                    let Some(line) = self.take_line(src)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.state = State::Done;
                        return Ok(Some(self.body.split().freeze()));
                    }
                }
                State::Done => return Ok(Some(Bytes::new())),
            }
        }
    }

    /// Whether the terminating chunk has been consumed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    fn take_line(&self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match find(src, b"\r\n") {
            Some(pos) if pos <= self.max_line => {
                let line = src.split_to(pos).freeze();
                src.advance(2);
                Ok(Some(line))
            }
            Some(_) => Err(Error::InvalidChunkedEncoding("line too long".into())),
            None if src.len() > self.max_line => {
                Err(Error::InvalidChunkedEncoding("line too long".into()))
            }
            None => Ok(None),
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize> {
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = std::str::from_utf8(size)
        .map_err(|_| Error::InvalidChunkedEncoding("non-ASCII chunk size".into()))?
        .trim_matches(|c| c == ' ' || c == '\t');
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidChunkedEncoding(format!(
            "invalid chunk size: {size:?}"
        )));
    }
    usize::from_str_radix(size, 16)
        .map_err(|_| Error::InvalidChunkedEncoding(format!("chunk size overflow: {size}")))
}
