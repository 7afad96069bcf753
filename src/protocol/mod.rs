//! WebSocket protocol core (RFC 6455): framing, masking and the handshake.

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use decoder::FrameDecoder;
pub use frame::Frame;
pub use handshake::{WS_GUID, accept_upgrade, compute_accept_key, switching_protocols};
pub use mask::apply_mask;
pub use opcode::OpCode;
