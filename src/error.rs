//! Error types for the HTTP connection loop and the WebSocket layer.
//!
//! Errors fall into four groups:
//!
//! - client framing errors (malformed request, oversized header, bad
//!   version, bad body framing), answered with a status code
//! - WebSocket protocol violations, always fatal for the connection
//! - I/O errors, always fatal for the connection
//! - handler errors surfaced by a router or WebSocket application

use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Header block exceeded the configured maximum before it was terminated.
    #[error("Header too large: {size} bytes (max: {max})")]
    HeaderTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Maximum allowed header size.
        max: usize,
    },

    /// Request line did not consist of exactly three tokens.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// Header line without a `:` separator.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// HTTP version other than `HTTP/1.0` or `HTTP/1.1`.
    #[error("HTTP version not supported: {0}")]
    HttpVersionNotSupported(String),

    /// `content-length` is not a non-negative integer.
    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    /// Chunked request body could not be decoded.
    #[error("Invalid chunked encoding: {0}")]
    InvalidChunkedEncoding(String),

    /// Transfer coding other than `chunked`.
    #[error("Unsupported transfer-encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// Request body exceeds the configured maximum.
    #[error("Body too large: {size} bytes (max: {max})")]
    BodyTooLarge {
        /// Declared or decoded body size.
        size: usize,
        /// Maximum allowed body size.
        max: usize,
    },

    /// Upgrade request without `sec-websocket-key`.
    #[error("Missing Sec-WebSocket-Key header")]
    MissingWebSocketKey,

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Fragment count so far.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Other protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Operation on a session that has already closed.
    #[error("WebSocket session is closed")]
    SessionClosed,

    /// A second `recv()` was issued while one is still pending.
    #[error("Another recv() is already pending on this session")]
    RecvInProgress,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Router or WebSocket application failure.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl Error {
    /// Status code for client framing errors, `None` for everything else.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Error::MalformedRequestLine(_)
            | Error::MalformedHeader(_)
            | Error::InvalidContentLength(_)
            | Error::InvalidChunkedEncoding(_) => Some(400),
            Error::HeaderTooLarge { .. } | Error::BodyTooLarge { .. } => Some(413),
            Error::UnsupportedTransferEncoding(_) => Some(501),
            Error::HttpVersionNotSupported(_) => Some(505),
            _ => None,
        }
    }

    /// Whether this error should be answered with an HTTP status response.
    #[must_use]
    pub const fn is_http_error(&self) -> bool {
        self.status_code().is_some()
    }

    /// Whether the request stream is still in sync after this error.
    ///
    /// Only errors confined to a fully delimited header block qualify; after
    /// any other framing error the position of the next request is unknown.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequestLine(_)
                | Error::MalformedHeader(_)
                | Error::HttpVersionNotSupported(_)
        )
    }

    /// Close code to send when this error terminates a WebSocket session.
    #[must_use]
    pub const fn close_code(&self) -> Option<u16> {
        match self {
            Error::InvalidUtf8 => Some(1007),
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => Some(1009),
            Error::UnmaskedClientFrame
            | Error::ReservedBitsSet
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::ProtocolViolation(_) => Some(1002),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
