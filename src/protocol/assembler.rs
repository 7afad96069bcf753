//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Collects a Text or Binary frame and its continuations into one message.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame. Returns the message once its final fragment arrives.
    ///
    /// Control frames are ignored and may be interleaved freely.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a stray continuation, or a new data
    ///   frame while a message is still open
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` past the limits
    /// - `Error::InvalidUtf8` if a completed text message is not UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        let opcode = match (frame.opcode, self.opcode) {
            (OpCode::Continuation, Some(open)) => open,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame without a message in progress".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "new data frame while a fragmented message is in progress".into(),
                ));
            }
            (started, None) => started,
        };

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if frame.fin && self.buffer.is_empty() {
            // Unfragmented message: hand the payload through without copying.
            self.reset();
            return AssembledMessage::new(opcode, frame.into_payload()).map(Some);
        }

        self.opcode = Some(opcode);
        self.fragment_count += 1;
        self.buffer.extend_from_slice(frame.payload());

        if frame.fin {
            let payload = self.buffer.split().freeze();
            self.reset();
            AssembledMessage::new(opcode, payload).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledMessage {
    /// UTF-8 validated text.
    Text(String),
    /// Arbitrary bytes.
    Binary(Bytes),
}

impl AssembledMessage {
    fn new(opcode: OpCode, payload: Bytes) -> Result<Self> {
        if opcode == OpCode::Text {
            let text = String::from_utf8(payload.to_vec()).map_err(|_| Error::InvalidUtf8)?;
            Ok(Self::Text(text))
        } else {
            Ok(Self::Binary(payload))
        }
    }
}
