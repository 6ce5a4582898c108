//! resp-cache-client: a RESP2/RESP3 client with client-side caching
//!
//! Features:
//! - Single-socket, cluster and master/replica connections
//! - RESP3 handshake, reconnects with connect-command replay, retry policy
//! - Cache proxy driven by `CLIENT TRACKING` invalidation pushes
//! - Pluggable cache storage with an in-memory implementation

pub mod cache;
pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod resp;

pub use cache::{CacheConfiguration, CacheStats, CacheStore, MemoryCache};
pub use client::Client;
pub use command::Command;
pub use connection::{CacheProxyConnection, Connection, ConnectionParameters, StreamConnection};
pub use error::{Error, Result};
pub use resp::Response;
