//! HTTP/1.1 request parsing and response writing.
//!
//! The pieces here are pure with respect to connection state: the
//! accumulator buffers bytes, the parser turns one header block into a
//! [`RequestHead`], the chunked decoder assembles bodies incrementally and
//! the writer serializes an [`HttpResponse`]. The connection loop in
//! [`crate::server`] strings them together.

pub mod buffer;
pub mod chunked;
pub mod headers;
pub mod request;
pub mod response;
pub mod upgrade;
pub mod writer;

pub use buffer::ConnectionBuffer;
pub use chunked::ChunkedDecoder;
pub use headers::HeaderMap;
pub use request::{BodyKind, HttpRequest, RequestHead, Version, parse_request_head};
pub use response::{Body, HttpResponse, reason_phrase};
pub use upgrade::{Io, OnUpgrade, Upgraded};
pub use writer::write_response;
