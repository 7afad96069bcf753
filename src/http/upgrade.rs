//! Socket handoff from the HTTP connection loop to a protocol handler.
//!
//! The loop attaches an [`OnUpgrade`] to every request it dispatches. A
//! handler that answers with `101 Switching Protocols` takes it and awaits
//! it; once the `101` response is fully written, the loop stops reading
//! and resolves it with the raw socket plus every byte it had buffered
//! past the end of the upgrade request.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::server::registry::ConnectionGuard;

/// A bidirectional byte stream that can be moved between tasks.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Io for T {}

/// Socket taken over from the HTTP connection loop.
pub struct Upgraded {
    /// The raw stream.
    pub io: Box<dyn Io>,
    /// Bytes received after the upgrade request, not yet processed.
    pub read_buf: BytesMut,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
    /// Limits configured for the originating connection.
    pub limits: Limits,
    pub(crate) guard: Option<ConnectionGuard>,
}

impl std::fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgraded")
            .field("read_buf", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}

impl Upgraded {
    /// Wrap a stream that never went through the HTTP loop.
    pub fn new<T: Io>(io: T, read_buf: BytesMut) -> Self {
        Self {
            io: Box::new(io),
            read_buf,
            shutdown: CancellationToken::new(),
            limits: Limits::default(),
            guard: None,
        }
    }
}

/// Future half of a pending handoff.
#[derive(Debug)]
pub struct OnUpgrade {
    rx: oneshot::Receiver<Upgraded>,
}

impl OnUpgrade {
    /// Wait for the connection loop to hand over the socket.
    ///
    /// # Errors
    ///
    /// Returns `Error::Handler` if the loop did not perform the handoff
    /// (for example because the response was not a `101` or the write failed).
    pub async fn upgraded(self) -> Result<Upgraded> {
        self.rx
            .await
            .map_err(|_| Error::Handler("connection was not upgraded".into()))
    }
}

/// Loop-side half of a pending handoff.
#[derive(Debug)]
pub(crate) struct PendingUpgrade {
    tx: oneshot::Sender<Upgraded>,
}

impl PendingUpgrade {
    /// Hand over the socket. Gives it back if nobody is waiting.
    pub(crate) fn fulfill(self, upgraded: Upgraded) -> std::result::Result<(), Upgraded> {
        self.tx.send(upgraded)
    }
}

pub(crate) fn pending() -> (PendingUpgrade, OnUpgrade) {
    let (tx, rx) = oneshot::channel();
    (PendingUpgrade { tx }, OnUpgrade { rx })
}
