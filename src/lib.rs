//! rootserve - concurrent static file server
//!
//! Serves the files under one root directory over HTTP/1.1 from a fixed-size
//! worker pool sharing a single event loop.

pub mod config;
pub mod files;
pub mod http;
pub mod server;
