//! Instance configuration
//!
//! TOML-backed settings for a gate or node process. Every field has a
//! default, so a missing file or a partial file both work; durations are
//! written in milliseconds.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Whole-process configuration, one file per instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportSection,
    pub actor: ActorSection,
    pub server: ServerSection,
}

/// Client-pool tuning, mapped onto [`network::ClientConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub dial_timeout_ms: u64,
    pub retry_limit: u32,
    pub backoff_floor_ms: u64,
    pub backoff_cap_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub handshake_timeout_ms: u64,
    pub ordered_connections: usize,
    pub unordered_connections: usize,
    pub write_queue_capacity: usize,
    pub pending_shards: usize,
    pub max_frame_size: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        let defaults = network::ClientConfig::default();
        Self {
            dial_timeout_ms: defaults.dial_timeout.as_millis() as u64,
            retry_limit: defaults.retry_limit,
            backoff_floor_ms: defaults.backoff_floor.as_millis() as u64,
            backoff_cap_ms: defaults.backoff_cap.as_millis() as u64,
            heartbeat_interval_ms: defaults.heartbeat_interval.as_millis() as u64,
            handshake_timeout_ms: defaults.handshake_timeout.as_millis() as u64,
            ordered_connections: defaults.ordered_connections,
            unordered_connections: defaults.unordered_connections,
            write_queue_capacity: defaults.write_queue_capacity,
            pending_shards: defaults.pending_shards,
            max_frame_size: defaults.max_frame_size,
        }
    }
}

impl TransportSection {
    pub fn to_client_config(&self) -> network::ClientConfig {
        network::ClientConfig {
            dial_timeout: Duration::from_millis(self.dial_timeout_ms),
            retry_limit: self.retry_limit,
            backoff_floor: Duration::from_millis(self.backoff_floor_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            ordered_connections: self.ordered_connections,
            unordered_connections: self.unordered_connections,
            write_queue_capacity: self.write_queue_capacity,
            pending_shards: self.pending_shards,
            max_frame_size: self.max_frame_size,
        }
    }
}

/// Actor scheduler tuning, mapped onto [`actors::ActorConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSection {
    pub mailbox_capacity: usize,
}

impl Default for ActorSection {
    fn default() -> Self {
        Self {
            mailbox_capacity: actors::ActorConfig::default().mailbox_capacity,
        }
    }
}

impl ActorSection {
    pub fn to_actor_config(&self) -> actors::ActorConfig {
        actors::ActorConfig {
            mailbox_capacity: self.mailbox_capacity,
        }
    }
}

/// Listener tuning, mapped onto [`network::ServerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: SocketAddr,
    pub heartbeat_interval_ms: u64,
    pub max_connections: usize,
    pub write_queue_capacity: usize,
    pub max_frame_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = network::ServerConfig::default();
        Self {
            listen_addr: "0.0.0.0:7680".parse().expect("static addr"),
            heartbeat_interval_ms: defaults.heartbeat_interval.as_millis() as u64,
            max_connections: defaults.max_connections,
            write_queue_capacity: defaults.write_queue_capacity,
            max_frame_size: defaults.max_frame_size,
        }
    }
}

impl ServerSection {
    pub fn to_server_config(&self) -> network::ServerConfig {
        network::ServerConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            max_connections: self.max_connections,
            write_queue_capacity: self.write_queue_capacity,
            max_frame_size: self.max_frame_size,
        }
    }
}

impl AppConfig {
    /// Loads and parses `path`. Missing sections and fields fall back to
    /// their defaults; a missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file missing, using defaults");
            Ok(Self::default())
        }
    }
}
