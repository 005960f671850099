//! Pooled, partitioned RPC transport
//!
//! Clients keep a fixed pool of supervised TCP connections per address:
//! an ordered bank where a partition key pins a connection (preserving
//! per-entity frame order) and an unordered round-robin bank. Requests
//! correlate replies through a sharded pending-call table; connection
//! establishment retries with exponential backoff, but calls never do.
//! Servers dispatch inbound frames through a route table fixed at
//! construction and evict connections silent past two heartbeats.

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod server;

pub use client::{Builder, Client, ConnState, Partition};
pub use config::{ClientConfig, ServerConfig};
pub use error::{Result, TransportError};
pub use pending::PendingCalls;
pub use server::{ConnHandle, Handler, Router, Server};
