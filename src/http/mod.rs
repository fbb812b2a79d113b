//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 side of the static file server, with
//! support for keep-alive connections.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection session implementing the request-response state machine
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: HTTP request representation and parsing utilities
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes responses and streams file bodies to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Session State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← Wait for request bytes (idle timeout)
//!        └──────┬───────────┘
//!               │ Bytes received
//!               ▼
//!        ┌──────────────────┐
//!        │ ParsingHeaders   │ ← Accumulate until the head is complete
//!        └──────┬───────────┘
//!               │ Request parsed (malformed/oversized → 400, close)
//!               ▼
//!        ┌──────────────────┐
//!        │ ResolvingTarget  │ ← Map the target to a file under the root
//!        └──────┬───────────┘
//!               │ File, or 404
//!               ▼
//!        ┌──────────────────┐
//!        │StreamingResponse │ ← Head, then file body
//!        └──────┬───────────┘
//!               ├─ Keep-Alive → AwaitingRequest (same connection)
//!               └─ Close → Closing → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rootserve::http::connection::{Connection, SessionSettings};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let settings = Arc::new(SessionSettings {
//!         root: Arc::new(std::fs::canonicalize(".")?),
//!         idle_timeout: std::time::Duration::from_secs(30),
//!         max_header_bytes: 8192,
//!     });
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let settings = Arc::clone(&settings);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, settings);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
