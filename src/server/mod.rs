//! TCP listener, connection loop and connection registry.

pub mod connection;
pub mod registry;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::Router;

pub use connection::Connection;
pub use registry::{ConnectionGuard, ConnectionRegistry};
pub use state::{ConnectionOutcome, ConnectionPhase};

/// Accepts connections and runs one [`Connection`] task per socket.
pub struct Server<R> {
    listener: TcpListener,
    router: Arc<R>,
    config: Arc<Config>,
    registry: Arc<ConnectionRegistry>,
}

impl<R: Router> Server<R> {
    /// Bind the listener to `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the address cannot be bound.
    pub async fn bind(config: Config, router: R) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        Ok(Self {
            listener,
            router: Arc::new(router),
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.registry.token()
    }

    /// Registry of live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Serve until the shutdown token is cancelled.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `signal` completes or the shutdown token is cancelled,
    /// then force-close every live connection (WebSocket sessions included)
    /// and stop accepting.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept errors are logged and skipped.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let shutdown = self.registry.token();
        info!(addr = ?self.listener.local_addr().ok(), "listening");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(err) => error!(error = %err, "accept failed"),
                },
            }
        }

        info!(open = self.registry.len(), "shutting down, closing connections");
        self.registry.drain().await;
        drop(self.listener);
        info!("server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, error = %err, "set_nodelay failed");
        }
        let guard = self.registry.register(Some(peer));
        let token = guard.token().clone();
        let connection = Connection::new(stream, Arc::clone(&self.router), Arc::clone(&self.config))
            .with_peer_addr(peer)
            .with_guard(guard);
        debug!(%peer, "connection accepted");

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => debug!(%peer, "connection closed by shutdown"),
                outcome = connection.run() => match outcome {
                    Ok(outcome) => debug!(%peer, ?outcome, "connection finished"),
                    Err(Error::Io(err)) => debug!(%peer, error = %err, "connection I/O error"),
                    Err(err) => error!(%peer, error = %err, "connection failed"),
                },
            }
        });
    }
}
