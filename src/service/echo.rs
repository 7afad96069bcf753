//! Echo router and WebSocket echo application.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::handler::{Router, WebSocketApp};
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::accept_upgrade;
use crate::service::StaticFiles;
use crate::session::WsSession;

/// Sends every received message straight back.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoApp;

impl WebSocketApp for EchoApp {
    async fn run(&self, session: WsSession) -> Result<()> {
        while let Some(message) = session.recv().await? {
            debug!(kind = ?message.kind(), len = message.len(), "echoing message");
            session.send(message).await?;
        }
        Ok(())
    }
}

/// Demo routes.
///
/// - WebSocket upgrade on any path: [`EchoApp`]
/// - `POST /echo`: the request body, then close
/// - `GET`: static files, `/` mapped to `/index.html`
/// - anything else: `404 Not Found`
#[derive(Debug, Clone)]
pub struct EchoRouter {
    files: StaticFiles,
    app: Arc<EchoApp>,
}

impl EchoRouter {
    /// Serve static files from `public_dir`.
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: StaticFiles::new(public_dir),
            app: Arc::new(EchoApp),
        }
    }
}

impl Router for EchoRouter {
    async fn handle(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.is_websocket_upgrade() {
            return accept_upgrade(&mut request, Arc::clone(&self.app));
        }

        match (request.method(), request.path()) {
            ("POST", "/echo") => {
                let content_type = request
                    .header("content-type")
                    .unwrap_or("application/octet-stream")
                    .to_string();
                Ok(HttpResponse::new(200)
                    .with_header("content-type", content_type)
                    .with_header("connection", "close")
                    .with_body(request.body().clone()))
            }
            ("GET", "/") => Ok(self.files.serve("/index.html").await),
            ("GET", path) => Ok(self.files.serve(path).await),
            _ => Ok(HttpResponse::not_found(request.uri())),
        }
    }
}
