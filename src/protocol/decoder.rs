//! Incremental decoder for client-to-server frames.
//!
//! The decoder is a small state machine over a growing buffer. Each call to
//! [`FrameDecoder::decode`] consumes as much of the buffer as it can and
//! either yields one frame or reports that more bytes are needed; partial
//! headers survive between calls so input may arrive in any chunking.

use bytes::{Buf, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::mask::apply_mask;
use crate::protocol::{Frame, OpCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BaseHeader {
    fin: bool,
    opcode: OpCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for the two fixed header bytes.
    BaseHeader,
    /// Waiting for a 2- or 8-byte extended length.
    ExtendedLength { head: BaseHeader, width: usize },
    /// Waiting for the masking key and the whole payload.
    MaskAndPayload { head: BaseHeader, len: usize },
}

/// Decodes masked client frames.
///
/// Rejects unmasked frames, frames with any RSV bit set, reserved opcodes
/// and payloads longer than `Limits::max_frame_size`. Once an error has been
/// returned the stream is out of sync and the decoder must not be reused.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    limits: Limits,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl FrameDecoder {
    /// Create a decoder enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            state: DecodeState::BaseHeader,
            limits,
        }
    }

    /// Whether the decoder is between frames.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::BaseHeader
    }

    /// Decode the next frame from `src`, consuming its bytes.
    ///
    /// Returns `Ok(None)` when `src` does not yet hold a complete frame.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV1, RSV2 or RSV3 is set
    /// - `Error::ReservedOpcode` for opcodes 0x3-0x7 and 0xB-0xF
    /// - `Error::UnmaskedClientFrame` if the MASK bit is clear
    /// - `Error::FrameTooLarge` if the payload length exceeds the limit
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match self.state {
                DecodeState::BaseHeader => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    let (byte0, byte1) = (src[0], src[1]);
                    if byte0 & 0x70 != 0 {
                        return Err(Error::ReservedBitsSet);
                    }
                    let head = BaseHeader {
                        fin: byte0 & 0x80 != 0,
                        opcode: OpCode::from_u8(byte0)?,
                    };
                    if byte1 & 0x80 == 0 {
                        return Err(Error::UnmaskedClientFrame);
                    }
                    src.advance(2);

                    self.state = match byte1 & 0x7F {
                        126 => DecodeState::ExtendedLength { head, width: 2 },
                        127 => DecodeState::ExtendedLength { head, width: 8 },
                        len => self.payload_state(head, u64::from(len))?,
                    };
                }
                DecodeState::ExtendedLength { head, width } => {
                    if src.len() < width {
                        return Ok(None);
                    }
                    let len = if width == 2 {
                        u64::from(src.get_u16())
                    } else {
                        src.get_u64()
                    };
                    self.state = self.payload_state(head, len)?;
                }
                DecodeState::MaskAndPayload { head, len } => {
                    let needed = 4 + len;
                    if src.len() < needed {
                        src.reserve(needed - src.len());
                        return Ok(None);
                    }
                    let mut key = [0u8; 4];
                    src.copy_to_slice(&mut key);
                    let mut payload = src.split_to(len);
                    apply_mask(&mut payload, key);

                    self.state = DecodeState::BaseHeader;
                    return Ok(Some(Frame::new(head.fin, head.opcode, payload.freeze())));
                }
            }
        }
    }

    fn payload_state(&self, head: BaseHeader, len: u64) -> Result<DecodeState> {
        self.limits.check_frame_size(len)?;
        let len = usize::try_from(len).map_err(|_| Error::FrameTooLarge {
            size: len,
            max: self.limits.max_frame_size,
        })?;
        Ok(DecodeState::MaskAndPayload { head, len })
    }
}
