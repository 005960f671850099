//! Transport configuration
//!
//! Runtime knobs for the client pool and the server connection manager.
//! The `config` crate maps TOML files onto these structs; defaults here
//! are the values used when no file overrides them.

use std::time::Duration;

use codec::constants::MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Client-side transport configuration shared by every pooled connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,
    /// Consecutive failed dials tolerated before the connection closes
    /// permanently and the pool evicts the address.
    pub retry_limit: u32,
    /// First retry backoff; doubles per attempt.
    pub backoff_floor: Duration,
    /// Backoff ceiling.
    pub backoff_cap: Duration,
    /// Interval between outbound heartbeat frames.
    pub heartbeat_interval: Duration,
    /// Handshake reply deadline after a successful dial.
    pub handshake_timeout: Duration,
    /// Connections reserved for partition-pinned traffic.
    pub ordered_connections: usize,
    /// Connections serving round-robin traffic.
    pub unordered_connections: usize,
    /// Bounded outbound queue depth per connection.
    pub write_queue_capacity: usize,
    /// Shard count of the pending-call table.
    pub pending_shards: usize,
    /// Inbound frame size ceiling.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(1),
            retry_limit: 8,
            backoff_floor: Duration::from_millis(5),
            backoff_cap: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            ordered_connections: 4,
            unordered_connections: 2,
            write_queue_capacity: 1024,
            pending_shards: 8,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ordered_connections == 0 {
            return Err(TransportError::configuration(
                "ordered connection count must be at least 1",
                Some("ordered_connections"),
            ));
        }
        if self.unordered_connections == 0 {
            return Err(TransportError::configuration(
                "unordered connection count must be at least 1",
                Some("unordered_connections"),
            ));
        }
        if self.write_queue_capacity == 0 {
            return Err(TransportError::configuration(
                "write queue capacity must be at least 1",
                Some("write_queue_capacity"),
            ));
        }
        if self.pending_shards == 0 {
            return Err(TransportError::configuration(
                "pending table needs at least one shard",
                Some("pending_shards"),
            ));
        }
        Ok(())
    }
}

/// Server-side transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Expected client heartbeat interval; connections silent for twice
    /// this long are force-closed.
    pub heartbeat_interval: Duration,
    /// Concurrent connection ceiling; excess accepts are dropped.
    pub max_connections: usize,
    /// Bounded outbound queue depth per connection.
    pub write_queue_capacity: usize,
    /// Inbound frame size ceiling.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            max_connections: 4096,
            write_queue_capacity: 1024,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}
