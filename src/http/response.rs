//! HTTP response value produced by routers and handlers.

use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Error;
use crate::http::headers::HeaderMap;

/// Response body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Body held in memory.
    Full(Bytes),
    /// Body streamed from a reader until end of stream.
    Reader(Pin<Box<dyn AsyncRead + Send>>),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Reader(_) => f.write_str("Reader"),
        }
    }
}

type Release = Box<dyn FnOnce() + Send>;

/// An HTTP response.
///
/// Consumed once by the response writer. The optional release action runs
/// after the body has been written, or when the write is abandoned.
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase; the standard phrase is used when empty.
    pub status_message: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Body,
    release: Option<Release>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl HttpResponse {
    /// Create an empty response with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_message: String::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            release: None,
        }
    }

    /// Set a custom reason phrase.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = message.into();
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set an in-memory body and its `content-length`.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers.insert("content-length", body.len().to_string());
        self.body = Body::Full(body);
        self
    }

    /// Stream the body from `reader`. The caller sets `content-length`.
    #[must_use]
    pub fn with_reader<R: AsyncRead + Send + 'static>(mut self, reader: R) -> Self {
        self.body = Body::Reader(Box::pin(reader));
        self
    }

    /// Register an action to run once the response has been written.
    #[must_use]
    pub fn on_release<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.release = Some(Box::new(f));
        self
    }

    /// Plain-text response carrying the standard reason phrase.
    #[must_use]
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(text)
    }

    /// `404 Not Found` that closes the connection.
    #[must_use]
    pub fn not_found(uri: &str) -> Self {
        Self::text(404, format!("404 Not Found: {uri}")).with_header("connection", "close")
    }

    /// Response for a client framing error; closes the connection.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        let status = err.status_code().unwrap_or(500);
        Self::text(status, format!("{} {}\n", status, reason_phrase(status)))
            .with_header("connection", "close")
    }

    /// Reason phrase that will be written on the status line.
    #[must_use]
    pub fn reason(&self) -> &str {
        if self.status_message.is_empty() {
            reason_phrase(self.status)
        } else {
            &self.status_message
        }
    }

    /// Whether the `connection` header asks to close after this response.
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.headers.has_token("connection", "close")
    }

    pub(crate) fn take_release(&mut self) -> Option<Release> {
        self.release.take()
    }
}

/// Standard reason phrase for a status code.
#[must_use]
pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        426 => "Upgrade Required",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "Unknown Status",
    }
}
