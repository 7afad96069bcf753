//! Registry of live connections, used to force-close them on shutdown.
//!
//! Every accepted socket registers here and receives a [`ConnectionGuard`].
//! The guard travels with the socket, through the WebSocket handoff if
//! there is one, and deregisters the connection when dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Live connections keyed by id.
#[derive(Debug)]
pub struct ConnectionRegistry {
    entries: DashMap<u64, Option<SocketAddr>>,
    next_id: AtomicU64,
    root: CancellationToken,
    emptied: Notify,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
            emptied: Notify::new(),
        }
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a connection.
    ///
    /// The returned guard carries a token that is cancelled when the
    /// registry drains. Registering after a drain has started yields an
    /// already cancelled token.
    #[must_use]
    pub fn register(self: &Arc<Self>, peer: Option<SocketAddr>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(id, peer);
        ConnectionGuard {
            id,
            token: self.root.child_token(),
            registry: Arc::clone(self),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connection is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Token cancelled when the registry drains.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Whether a drain has started.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every connection and wait until all guards are dropped.
    pub async fn drain(&self) {
        self.root.cancel();
        loop {
            let emptied = self.emptied.notified();
            if self.entries.is_empty() {
                return;
            }
            debug!(remaining = self.entries.len(), "waiting for connections to close");
            emptied.await;
        }
    }

    fn remove(&self, id: u64) {
        self.entries.remove(&id);
        if self.entries.is_empty() {
            self.emptied.notify_waiters();
        }
    }
}

/// Keeps a connection registered while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: u64,
    token: CancellationToken,
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionGuard {
    /// Registry id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token cancelled when the server shuts down.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
