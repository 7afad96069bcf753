//! Server side of the WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! The HTTP loop detects upgrade requests and hands them to the router; a
//! router that wants to speak WebSocket calls [`accept_upgrade`], returns
//! the `101` it produces, and the session starts once the loop has flushed
//! that response and released the socket.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handler::WebSocketApp;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::WsSession;

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a client key.
///
/// The accept key is Base64(SHA-1(key + GUID)).
///
/// # Example
///
/// ```
/// use handoff::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build the `101 Switching Protocols` response for an upgrade request.
///
/// # Errors
///
/// Returns `Error::MissingWebSocketKey` if the request carries no
/// `sec-websocket-key`.
pub fn switching_protocols(request: &HttpRequest) -> Result<HttpResponse> {
    let key = request
        .header("sec-websocket-key")
        .ok_or(Error::MissingWebSocketKey)?;

    Ok(HttpResponse::new(101)
        .with_header("upgrade", "websocket")
        .with_header("connection", "Upgrade")
        .with_header("sec-websocket-accept", compute_accept_key(key)))
}

/// Accept a WebSocket upgrade and run `app` on the resulting session.
///
/// Returns the `101` response the router must hand back to the connection
/// loop. A task is spawned that waits for the socket handoff, wraps it in a
/// [`WsSession`] and drives `app`; the session is closed when `app` returns.
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// - `Error::MissingWebSocketKey` if the request has no `sec-websocket-key`
/// - `Error::Handler` if the request did not come from a connection loop
pub fn accept_upgrade<A: WebSocketApp>(
    request: &mut HttpRequest,
    app: Arc<A>,
) -> Result<HttpResponse> {
    let response = switching_protocols(request)?;
    let on_upgrade = request
        .take_upgrade()
        .ok_or_else(|| Error::Handler("request cannot be upgraded".into()))?;
    let peer = request.peer_addr();

    tokio::spawn(async move {
        let upgraded = match on_upgrade.upgraded().await {
            Ok(upgraded) => upgraded,
            Err(err) => {
                debug!(?peer, error = %err, "upgrade abandoned");
                return;
            }
        };
        let session = WsSession::from_upgraded(upgraded);
        debug!(?peer, "websocket session started");

        if let Err(err) = app.run(session.clone()).await {
            warn!(?peer, error = %err, "websocket application failed");
        }
        session.close().await;
        debug!(?peer, "websocket session finished");
    });

    Ok(response)
}
