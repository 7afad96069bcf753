//! HTTP request head parsing and the request value handed to routers.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::http::buffer::find;
use crate::http::headers::HeaderMap;
use crate::http::upgrade::OnUpgrade;

/// Supported HTTP versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// `HTTP/1.0`
    Http10,
    /// `HTTP/1.1`
    Http11,
}

impl Version {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the request body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// No body.
    Empty,
    /// Exactly this many bytes follow the header block.
    ContentLength(usize),
    /// Body uses chunked transfer coding; length is open-ended.
    Chunked,
}

/// Parsed request line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Upper-cased method token.
    pub method: String,
    /// Raw request target, not decoded.
    pub uri: String,
    /// Protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Body delimitation derived from the headers.
    pub body_kind: BodyKind,
}

/// Parse one request head from the start of `buf`.
///
/// `buf` must contain a complete header block; the returned length covers
/// the block including the terminating `\r\n\r\n`.
///
/// # Errors
///
/// - `Error::MalformedRequestLine` if the request line is not three space-separated tokens
/// - `Error::MalformedHeader` if a header line has no `:`
/// - `Error::HttpVersionNotSupported` for versions other than HTTP/1.0 and HTTP/1.1
/// - `Error::InvalidContentLength` if `content-length` is not a non-negative integer
/// - `Error::UnsupportedTransferEncoding` if the final transfer coding is not `chunked`
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize)> {
    let end = find(buf, b"\r\n\r\n")
        .ok_or_else(|| Error::MalformedRequestLine("incomplete header block".into()))?;

    // Header bytes are ISO-8859-1; every byte maps to one char.
    let text: String = buf[..end].iter().map(|&b| b as char).collect();
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let (method, uri, version) = parse_request_line(request_line)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;
        headers.insert(name, value.trim());
    }

    let version = match version.as_str() {
        "HTTP/1.1" => Version::Http11,
        "HTTP/1.0" => Version::Http10,
        _ => return Err(Error::HttpVersionNotSupported(version)),
    };

    let body_kind = body_kind(&headers)?;

    Ok((
        RequestHead {
            method,
            uri,
            version,
            headers,
            body_kind,
        },
        end + 4,
    ))
}

fn parse_request_line(line: &str) -> Result<(String, String, String)> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(line.to_string()));
    }
    Ok((
        parts[0].to_ascii_uppercase(),
        parts[1].to_string(),
        parts[2].to_ascii_uppercase(),
    ))
}

fn body_kind(headers: &HeaderMap) -> Result<BodyKind> {
    if let Some(te) = headers.get("transfer-encoding") {
        let last = te.rsplit(',').next().unwrap_or_default().trim();
        if last.eq_ignore_ascii_case("chunked") {
            return Ok(BodyKind::Chunked);
        }
        return Err(Error::UnsupportedTransferEncoding(te.to_string()));
    }

    match headers.get("content-length") {
        Some(value) => {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidContentLength(value.to_string()));
            }
            let len: usize = value
                .parse()
                .map_err(|_| Error::InvalidContentLength(value.to_string()))?;
            Ok(if len == 0 {
                BodyKind::Empty
            } else {
                BodyKind::ContentLength(len)
            })
        }
        None => Ok(BodyKind::Empty),
    }
}

/// A fully received HTTP request.
///
/// Owned by the connection loop for one request/response cycle and passed
/// by value to the router.
#[derive(Debug)]
pub struct HttpRequest {
    method: String,
    uri: String,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    peer_addr: Option<SocketAddr>,
    upgrade: Option<OnUpgrade>,
}

impl HttpRequest {
    /// Build a request from a parsed head and its assembled body.
    #[must_use]
    pub fn new(head: RequestHead, body: Bytes) -> Self {
        Self {
            method: head.method,
            uri: head.uri,
            version: head.version,
            headers: head.headers,
            body,
            peer_addr: None,
            upgrade: None,
        }
    }

    pub(crate) fn with_peer_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.peer_addr = addr;
        self
    }

    pub(crate) fn with_upgrade(mut self, upgrade: OnUpgrade) -> Self {
        self.upgrade = Some(upgrade);
        self
    }

    /// Upper-cased method token.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw request target.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Path component of the request target (query stripped).
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }

    /// Protocol version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Single header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Take ownership of the body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Remote peer address, when known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Whether the request asks for a WebSocket upgrade.
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }

    /// Whether the client expects the connection to close after this exchange.
    #[must_use]
    pub fn wants_close(&self) -> bool {
        if self.headers.has_token("connection", "close") {
            return true;
        }
        self.version == Version::Http10 && !self.headers.has_token("connection", "keep-alive")
    }

    /// Take the pending socket handoff for this request.
    ///
    /// Resolves once the connection loop has written a `101` response.
    pub fn take_upgrade(&mut self) -> Option<OnUpgrade> {
        self.upgrade.take()
    }
}
