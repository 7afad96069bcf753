//! Test harness: a server on an ephemeral port and a raw TCP client that
//! speaks just enough HTTP/1.1 and WebSocket framing to drive it.

#![allow(dead_code, unused_imports)]

mod client;
mod server;

pub use client::{MASK, RawResponse, SAMPLE_KEY, TestClient};
pub use server::{INDEX_HTML, TestServer};
