//! Lifecycle of a WebSocket session.

/// WebSocket session state.
///
/// States only move forward: `Open` then `Draining` then `Closed`, and
/// `Open` may jump straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Frames flow in both directions.
    #[default]
    Open = 0,
    /// The outbound side is finished (close frame sent or socket failed);
    /// messages received before that can still be drained.
    Draining = 1,
    /// Closed locally; nothing more is delivered.
    Closed = 2,
}

impl SessionState {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Open,
            1 => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }

    /// Whether frames may still be sent.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Whether queued messages may still be received.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, SessionState::Open | SessionState::Draining)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Open => write!(f, "Open"),
            SessionState::Draining => write!(f, "Draining"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}
