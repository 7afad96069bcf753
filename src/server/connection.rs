//! The per-connection HTTP/1.1 loop.
//!
//! One [`Connection`] owns one socket and processes requests strictly in
//! order: buffer bytes until a header block is complete, parse it, wait for
//! the body, dispatch to the router, write the response, repeat. Pipelined
//! requests already in the buffer are served before the socket is read
//! again. After a `101` response the socket and any bytes buffered past the
//! upgrade request are handed to whoever took the request's
//! [`OnUpgrade`](crate::http::OnUpgrade), and the loop ends.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Result;
use crate::handler::Router;
use crate::http::upgrade::{self, PendingUpgrade};
use crate::http::{
    BodyKind, ChunkedDecoder, ConnectionBuffer, HttpRequest, Io, RequestHead, Upgraded,
    parse_request_head, write_response,
};
use crate::server::registry::ConnectionGuard;
use crate::server::state::{ConnectionOutcome, ConnectionPhase};

enum PendingBody {
    Complete,
    Length(usize),
    Chunked(ChunkedDecoder),
}

struct PendingRequest {
    head: RequestHead,
    body: PendingBody,
}

/// HTTP/1.1 connection driver.
pub struct Connection<T, R> {
    io: T,
    buffer: ConnectionBuffer,
    router: Arc<R>,
    config: Arc<Config>,
    peer: Option<SocketAddr>,
    phase: watch::Sender<ConnectionPhase>,
    pending: Option<PendingRequest>,
    shutdown: CancellationToken,
    guard: Option<ConnectionGuard>,
}

impl<T: Io, R: Router> Connection<T, R> {
    /// Wrap an accepted stream.
    pub fn new(io: T, router: Arc<R>, config: Arc<Config>) -> Self {
        let buffer = ConnectionBuffer::new(config.limits.clone(), config.read_buffer_size);
        let (phase, _) = watch::channel(ConnectionPhase::AwaitingHeaders);
        Self {
            io,
            buffer,
            router,
            config,
            peer: None,
            phase,
            pending: None,
            shutdown: CancellationToken::new(),
            guard: None,
        }
    }

    /// Record the remote address, exposed on every request.
    #[must_use]
    pub fn with_peer_addr(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Tie the connection to a registry entry; the guard follows the socket
    /// through an upgrade.
    #[must_use]
    pub(crate) fn with_guard(mut self, guard: ConnectionGuard) -> Self {
        self.shutdown = guard.token().clone();
        self.guard = Some(guard);
        self
    }

    /// Follow the loop's phase, including after [`run`](Self::run) has
    /// taken the connection.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: ConnectionPhase) {
        trace!(peer = ?self.peer, %phase, "connection phase");
        self.phase.send_replace(phase);
    }

    /// Serve requests until the peer disconnects, a response asks to close,
    /// or the socket is upgraded.
    ///
    /// Client framing errors are answered through [`Router::handle_error`].
    ///
    /// # Errors
    ///
    /// I/O errors and router errors end the loop; the socket is closed when
    /// the connection is dropped.
    pub async fn run(mut self) -> Result<ConnectionOutcome> {
        loop {
            self.enter(ConnectionPhase::AwaitingHeaders);
            let request = match self.next_request().await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(self.close().await),
                Err(err) if err.is_http_error() => {
                    warn!(peer = ?self.peer, error = %err, "rejecting malformed request");
                    let mut response = self.router.handle_error(&err);
                    if !err.is_resumable() {
                        response.headers.insert("connection", "close");
                    }
                    self.enter(ConnectionPhase::Responding);
                    write_response(&mut self.io, &mut response).await?;
                    if response.is_close() {
                        return Ok(self.close().await);
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            self.enter(ConnectionPhase::Dispatching);
            let (pending_upgrade, on_upgrade) = upgrade::pending();
            let request = request.with_upgrade(on_upgrade);
            let wants_close = request.wants_close();
            debug!(
                peer = ?self.peer,
                method = request.method(),
                uri = request.uri(),
                "dispatching request"
            );

            let mut response = self.router.handle(request).await?;
            if response.status == 101 {
                self.enter(ConnectionPhase::Responding);
                write_response(&mut self.io, &mut response).await?;
                return Ok(self.hand_off(pending_upgrade));
            }
            drop(pending_upgrade);

            if wants_close {
                response.headers.insert("connection", "close");
            }
            self.enter(ConnectionPhase::Responding);
            write_response(&mut self.io, &mut response).await?;
            debug!(peer = ?self.peer, status = response.status, "response written");

            if response.is_close() {
                return Ok(self.close().await);
            }
        }
    }

    /// Next complete request, or `None` when the peer is gone.
    async fn next_request(&mut self) -> Result<Option<HttpRequest>> {
        loop {
            if let Some(request) = self.try_assemble()? {
                return Ok(Some(request));
            }

            let read = self.buffer.read_from(&mut self.io);
            let n = match self.config.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, read).await {
                    Ok(n) => n?,
                    Err(_) => {
                        debug!(peer = ?self.peer, "idle timeout");
                        return Ok(None);
                    }
                },
                None => read.await?,
            };
            if n == 0 {
                if !self.buffer.is_empty() || self.pending.is_some() {
                    debug!(peer = ?self.peer, "peer closed mid-request");
                }
                return Ok(None);
            }
        }
    }

    /// Build a request from buffered bytes if enough have arrived.
    fn try_assemble(&mut self) -> Result<Option<HttpRequest>> {
        if self.pending.is_none() {
            let Some(header_len) = self.buffer.complete_header_len()? else {
                return Ok(None);
            };
            let block = self.buffer.consume(header_len);
            let (head, _) = parse_request_head(&block)?;
            let limits = &self.config.limits;
            let body = match head.body_kind {
                BodyKind::Empty => PendingBody::Complete,
                BodyKind::ContentLength(n) => {
                    limits.check_body_size(n)?;
                    PendingBody::Length(n)
                }
                BodyKind::Chunked => PendingBody::Chunked(ChunkedDecoder::new(
                    limits.max_header_size,
                    limits.max_body_size,
                )),
            };
            self.pending = Some(PendingRequest { head, body });
            self.enter(ConnectionPhase::BodyPending);
        }

        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };
        let body = match &mut pending.body {
            PendingBody::Complete => Bytes::new(),
            PendingBody::Length(n) => {
                if self.buffer.len() < *n {
                    return Ok(None);
                }
                self.buffer.consume(*n)
            }
            PendingBody::Chunked(decoder) => match decoder.decode(self.buffer.bytes_mut())? {
                Some(body) => body,
                None => return Ok(None),
            },
        };

        let Some(PendingRequest { head, .. }) = self.pending.take() else {
            return Ok(None);
        };
        Ok(Some(HttpRequest::new(head, body).with_peer_addr(self.peer)))
    }

    fn hand_off(self, pending: PendingUpgrade) -> ConnectionOutcome {
        self.enter(ConnectionPhase::Upgraded);
        let upgraded = Upgraded {
            io: Box::new(self.io),
            read_buf: self.buffer.into_inner(),
            shutdown: self.shutdown,
            limits: self.config.limits.clone(),
            guard: self.guard,
        };
        match pending.fulfill(upgraded) {
            Ok(()) => {
                debug!(peer = ?self.peer, "connection upgraded");
                ConnectionOutcome::Upgraded
            }
            Err(_) => {
                warn!(peer = ?self.peer, "101 sent but nobody took the upgrade");
                self.phase.send_replace(ConnectionPhase::Closed);
                ConnectionOutcome::Closed
            }
        }
    }

    async fn close(&mut self) -> ConnectionOutcome {
        self.enter(ConnectionPhase::Closed);
        let _ = self.io.shutdown().await;
        ConnectionOutcome::Closed
    }
}
