//! WebSocket sessions on upgraded connections.

pub mod message;
#[allow(clippy::module_inception)]
pub mod session;
pub mod state;

pub use message::{CloseCode, Message, MessageKind};
pub use session::WsSession;
pub use state::SessionState;
