//! # handoff - HTTP/1.1 server with in-band WebSocket upgrade
//!
//! `handoff` serves HTTP/1.1 with keep-alive and pipelining over plain TCP
//! and can switch any connection to the WebSocket protocol (RFC 6455) in
//! the middle of its byte stream.
//!
//! ## Features
//!
//! - **Incremental parsing**: requests may arrive split at any byte
//! - **Keep-alive and pipelining**: requests answered strictly in order
//! - **Chunked request bodies** and streamed response bodies
//! - **Socket handoff**: after a `101` the raw socket and every byte read
//!   past the upgrade request move to the WebSocket session
//! - **Message-oriented WebSocket sessions** with fragment reassembly,
//!   ping/pong and close handling
//! - **Forced shutdown** that closes every live connection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use handoff::{Config, Server};
//! use handoff::service::EchoRouter;
//!
//! let server = Server::bind(Config::default(), EchoRouter::new("public")).await?;
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod protocol;
pub mod server;
pub mod service;
pub mod session;

pub use config::{Config, Limits};
pub use error::{Error, Result};
pub use handler::{Router, WebSocketApp};
pub use http::{Body, HeaderMap, HttpRequest, HttpResponse, OnUpgrade, Upgraded};
pub use protocol::{OpCode, WS_GUID, accept_upgrade, compute_accept_key};
pub use server::{Connection, ConnectionOutcome, ConnectionPhase, ConnectionRegistry, Server};
pub use session::{CloseCode, Message, MessageKind, SessionState, WsSession};
