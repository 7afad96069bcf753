//! Application seams: HTTP routing and WebSocket applications.

use std::future::Future;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::session::WsSession;

/// Maps a request to a response.
///
/// Called once per request, in order, from the connection's own task. A
/// router that wants to accept a WebSocket upgrade returns the `101`
/// produced by [`accept_upgrade`](crate::protocol::accept_upgrade).
pub trait Router: Send + Sync + 'static {
    /// Produce the response for `request`.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the connection: it is closed without a
    /// response.
    fn handle(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;

    /// Response sent when a request cannot be parsed.
    fn handle_error(&self, err: &Error) -> HttpResponse {
        HttpResponse::from_error(err)
    }
}

/// Drives a WebSocket session after an accepted upgrade.
///
/// The session is closed when `run` returns.
pub trait WebSocketApp: Send + Sync + 'static {
    /// Run the application.
    ///
    /// # Errors
    ///
    /// Errors are logged; the session is closed either way.
    fn run(&self, session: WsSession) -> impl Future<Output = Result<()>> + Send;
}
