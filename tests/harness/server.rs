//! Echo server on a random port, serving a temporary public directory.

use std::net::SocketAddr;
use std::sync::Arc;

use handoff::service::EchoRouter;
use handoff::{Config, ConnectionRegistry, Server};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const INDEX_HTML: &str = "<!doctype html><title>handoff</title>";

pub struct TestServer {
    shutdown: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    handle: JoinHandle<handoff::Result<()>>,
    _public: TempDir,
}

impl TestServer {
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(Config::default()).await
    }

    pub async fn spawn_with(config: Config) -> (Self, SocketAddr) {
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("index.html"), INDEX_HTML).unwrap();
        std::fs::write(public.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(public.path().join("b.txt"), "bravo").unwrap();

        let config = config.with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)));
        let server = Server::bind(config, EchoRouter::new(public.path()))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_token();
        let registry = Arc::clone(server.registry());
        let handle = tokio::spawn(server.run());

        let server = Self {
            shutdown,
            registry,
            handle,
            _public: public,
        };
        (server, addr)
    }

    pub fn open_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}
