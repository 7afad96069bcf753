//! Message-oriented WebSocket session over an upgraded socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::http::{Io, Upgraded};
use crate::protocol::{Frame, FrameDecoder, MessageAssembler, OpCode};
use crate::server::registry::ConnectionGuard;
use crate::session::message::{CloseCode, Message};
use crate::session::state::SessionState;

/// A server-side WebSocket session.
///
/// A background task owns the read half of the socket: it decodes frames,
/// answers pings and close frames, and queues complete data messages for
/// [`recv`](Self::recv). Sends are serialized through the write half, so
/// messages go out whole and in call order.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct WsSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

/// How long closing waits for pending writes and the close frame before
/// dropping the socket without one.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type Writer = WriteHalf<Box<dyn Io>>;

struct Inner {
    /// `None` once the write side is shut down or a frame was cut short.
    writer: Mutex<Option<Writer>>,
    incoming: Mutex<mpsc::UnboundedReceiver<Message>>,
    state: AtomicU8,
    stop: CancellationToken,
    /// Cancels whatever write holds the writer.
    abort: CancellationToken,
}

impl WsSession {
    /// Start a session on an upgraded socket.
    ///
    /// Bytes already buffered in `upgraded.read_buf` are decoded before
    /// anything is read from the socket. Must be called from within a
    /// Tokio runtime.
    #[must_use]
    pub fn from_upgraded(upgraded: Upgraded) -> Self {
        let Upgraded {
            io,
            read_buf,
            shutdown,
            limits,
            guard,
        } = upgraded;

        let (reader, writer) = tokio::io::split(io);
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            writer: Mutex::new(Some(writer)),
            incoming: Mutex::new(rx),
            state: AtomicU8::new(SessionState::Open as u8),
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
        });

        let task = ReadTask {
            inner: Arc::clone(&inner),
            io: reader,
            buf: read_buf,
            decoder: FrameDecoder::new(limits.clone()),
            assembler: MessageAssembler::new(limits),
            tx,
            shutdown,
            _guard: guard,
        };
        tokio::spawn(task.run());

        Self { inner }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Whether the session can no longer send.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.inner.state().can_send()
    }

    /// Send one message as a single final frame.
    ///
    /// Concurrent calls are written one after another, in call order.
    ///
    /// # Errors
    ///
    /// - `Error::SessionClosed` if the session has closed
    /// - `Error::Io` if the write fails; the session is then closed
    pub async fn send(&self, message: Message) -> Result<()> {
        self.inner.write_frame(&message.into_frame()).await
    }

    /// Shorthand for sending a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Message::text(text)).await
    }

    /// Wait for the next complete data message.
    ///
    /// Returns `Ok(None)` once the session has closed and every message
    /// received before the close has been delivered.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecvInProgress` if another `recv` is pending.
    pub async fn recv(&self) -> Result<Option<Message>> {
        let mut incoming = self
            .inner
            .incoming
            .try_lock()
            .map_err(|_| Error::RecvInProgress)?;
        if !self.inner.state().can_receive() {
            return Ok(None);
        }
        Ok(incoming.recv().await)
    }

    /// Close the session with an empty close frame.
    ///
    /// Idempotent. Wakes a pending [`recv`](Self::recv). If the peer has
    /// stopped reading, the socket is dropped without a close frame and
    /// sends still in flight fail with `Error::SessionClosed`.
    pub async fn close(&self) {
        self.inner
            .finish(Some(Frame::close(None, "")), SessionState::Closed)
            .await;
        self.inner.stop.cancel();
    }
}

impl Inner {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance to `next`, never backwards. Returns the previous state.
    fn advance(&self, next: SessionState) -> SessionState {
        SessionState::from_u8(self.state.fetch_max(next as u8, Ordering::AcqRel))
    }

    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        let slot = self.writer.lock().await;
        if !self.state().can_send() {
            return Err(Error::SessionClosed);
        }
        let mut pending = FrameWrite { slot, done: false };
        let Some(writer) = pending.slot.as_mut() else {
            return Err(Error::SessionClosed);
        };

        let mut buf = BytesMut::with_capacity(frame.wire_size(false));
        frame.encode(&mut buf);
        let written = tokio::select! {
            biased;
            written = async {
                writer.write_all(&buf).await?;
                writer.flush().await
            } => Some(written),
            () = self.abort.cancelled() => None,
        };

        match written {
            Some(Ok(())) => {
                pending.done = true;
                Ok(())
            }
            Some(Err(err)) => {
                self.advance(SessionState::Draining);
                self.stop.cancel();
                Err(err.into())
            }
            None => {
                trace!("write aborted by close");
                Err(Error::SessionClosed)
            }
        }
    }

    /// Move to `next`; if the session could still send, write `close` and
    /// shut down the write side.
    ///
    /// Gives up after [`CLOSE_GRACE`]: pending writes are aborted and the
    /// write half is dropped.
    async fn finish(&self, close: Option<Frame>, next: SessionState) {
        if !self.advance(next).can_send() {
            return;
        }

        let graceful = async {
            let Some(mut writer) = self.writer.lock().await.take() else {
                return;
            };
            if let Some(frame) = close {
                let mut buf = BytesMut::with_capacity(frame.wire_size(false));
                frame.encode(&mut buf);
                if let Err(err) = writer.write_all(&buf).await {
                    trace!(error = %err, "close frame not delivered");
                }
            }
            let _ = writer.shutdown().await;
        };
        if tokio::time::timeout(CLOSE_GRACE, graceful).await.is_err() {
            debug!("peer is not reading; dropping websocket without a close frame");
            self.abort.cancel();
            self.writer.lock().await.take();
        }
    }
}

/// The writer, checked out for one frame. Dropped before the frame is
/// complete, it discards the writer: the peer would see a torn frame.
struct FrameWrite<'a> {
    slot: MutexGuard<'a, Option<Writer>>,
    done: bool,
}

impl Drop for FrameWrite<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.slot.take();
        }
    }
}

enum Exit {
    PeerClosed(Option<u16>),
    Stopped,
    ServerShutdown,
    Eof,
}

struct ReadTask {
    inner: Arc<Inner>,
    io: ReadHalf<Box<dyn Io>>,
    buf: BytesMut,
    decoder: FrameDecoder,
    assembler: MessageAssembler,
    tx: mpsc::UnboundedSender<Message>,
    shutdown: CancellationToken,
    _guard: Option<ConnectionGuard>,
}

impl ReadTask {
    async fn run(mut self) {
        match self.read_loop().await {
            Ok(Exit::PeerClosed(code)) => {
                debug!(?code, "peer closed websocket");
                self.inner
                    .finish(Some(Frame::close(code, "")), SessionState::Draining)
                    .await;
            }
            Ok(Exit::Stopped) => {}
            Ok(Exit::ServerShutdown) => {
                debug!("closing websocket for server shutdown");
                let code = CloseCode::GoingAway.as_u16();
                self.inner
                    .finish(Some(Frame::close(Some(code), "")), SessionState::Draining)
                    .await;
            }
            Ok(Exit::Eof) => {
                debug!("websocket peer disconnected");
                self.inner.finish(None, SessionState::Draining).await;
            }
            Err(err) => match err.close_code() {
                Some(code) => {
                    warn!(error = %err, code, "websocket protocol violation");
                    self.inner
                        .finish(Some(Frame::close(Some(code), "")), SessionState::Draining)
                        .await;
                }
                None => {
                    debug!(error = %err, "websocket read failed");
                    self.inner.finish(None, SessionState::Draining).await;
                }
            },
        }
        self.inner.stop.cancel();
    }

    async fn read_loop(&mut self) -> Result<Exit> {
        loop {
            while let Some(frame) = self.decoder.decode(&mut self.buf)? {
                if let Some(exit) = self.on_frame(frame).await? {
                    return Ok(exit);
                }
            }

            let read = tokio::select! {
                biased;
                () = self.inner.stop.cancelled() => return Ok(Exit::Stopped),
                () = self.shutdown.cancelled() => return Ok(Exit::ServerShutdown),
                read = self.io.read_buf(&mut self.buf) => read?,
            };
            if read == 0 {
                return Ok(Exit::Eof);
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) -> Result<Option<Exit>> {
        frame.validate()?;
        trace!(opcode = %frame.opcode, len = frame.payload().len(), "frame received");

        match frame.opcode {
            OpCode::Ping => {
                let pong = Frame::pong(frame.into_payload());
                tokio::select! {
                    biased;
                    written = self.inner.write_frame(&pong) => match written {
                        Ok(()) | Err(Error::SessionClosed) => {}
                        Err(err) => debug!(error = %err, "pong not delivered"),
                    },
                    () = self.shutdown.cancelled() => return Ok(Some(Exit::ServerShutdown)),
                    () = self.inner.stop.cancelled() => return Ok(Some(Exit::Stopped)),
                }
                Ok(None)
            }
            OpCode::Pong => Ok(None),
            OpCode::Close => {
                if frame.payload().len() == 1 {
                    return Err(Error::ProtocolViolation(
                        "close frame with a one-byte payload".into(),
                    ));
                }
                Ok(Some(Exit::PeerClosed(frame.close_code())))
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if let Some(message) = self.assembler.push(frame)? {
                    if self.tx.send(message.into()).is_err() {
                        return Ok(Some(Exit::Stopped));
                    }
                }
                Ok(None)
            }
        }
    }
}
