//! Phases of the HTTP connection loop.

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionPhase {
    /// Reading until a complete header block is buffered.
    #[default]
    AwaitingHeaders,
    /// Header parsed; reading the body.
    BodyPending,
    /// Request handed to the router.
    Dispatching,
    /// Writing the response.
    Responding,
    /// Socket handed to a protocol handler after a `101`.
    Upgraded,
    /// Socket closed.
    Closed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::AwaitingHeaders => write!(f, "AwaitingHeaders"),
            ConnectionPhase::BodyPending => write!(f, "BodyPending"),
            ConnectionPhase::Dispatching => write!(f, "Dispatching"),
            ConnectionPhase::Responding => write!(f, "Responding"),
            ConnectionPhase::Upgraded => write!(f, "Upgraded"),
            ConnectionPhase::Closed => write!(f, "Closed"),
        }
    }
}

/// How a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The socket was closed.
    Closed,
    /// The socket was handed off after a `101`.
    Upgraded,
}
