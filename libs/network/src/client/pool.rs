//! Pooled client
//!
//! A fixed set of connections to one address, split into an ordered bank
//! (a partition key always pins the same connection, preserving per-entity
//! frame order) and an unordered bank served round-robin. All connections
//! share the client's buffer arena and identity.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codec::packet::HandshakeReq;
use codec::{Arena, Chain};
use tracing::info;

use crate::client::connection::Connection;
use crate::config::ClientConfig;
use crate::error::{Result, TransportError};

/// Partition selector for outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Pin to the ordered connection for this key. Frames sharing a key
    /// are delivered in send order.
    Key(u64),
    /// Any unordered connection, round-robin.
    Any,
}

pub struct Client {
    addr: SocketAddr,
    ordered: Vec<Arc<Connection>>,
    unordered: Vec<Arc<Connection>>,
    cursor: AtomicUsize,
    arena: Arena,
}

impl Client {
    /// Dials the full pool and blocks until every connection has completed
    /// its first handshake.
    pub async fn connect(
        addr: SocketAddr,
        identity: HandshakeReq,
        config: Arc<ClientConfig>,
    ) -> Result<Arc<Client>> {
        config.validate()?;
        let identity = Arc::new(identity);
        let arena = Arena::new();

        let spawn_bank = |count: usize| {
            (0..count)
                .map(|_| Connection::spawn(addr, identity.clone(), arena.clone(), config.clone()))
                .collect::<Vec<_>>()
        };
        let ordered = spawn_bank(config.ordered_connections);
        let unordered = spawn_bank(config.unordered_connections);

        for conn in ordered.iter().chain(unordered.iter()) {
            conn.wait_open().await?;
        }
        info!(%addr, ordered = ordered.len(), unordered = unordered.len(), "client pool connected");

        Ok(Arc::new(Client {
            addr,
            ordered,
            unordered,
            cursor: AtomicUsize::new(0),
            arena,
        }))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Encoders need the pool's arena so frame headers recycle through it.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// True once any connection has exhausted its retry budget. A dead
    /// ordered connection cannot be re-routed without breaking partition
    /// pinning, so the whole pool is retired.
    pub fn is_closed(&self) -> bool {
        self.ordered
            .iter()
            .chain(self.unordered.iter())
            .any(|conn| conn.is_closed())
    }

    /// In-flight call count across the pool.
    pub fn pending_calls(&self) -> usize {
        self.ordered
            .iter()
            .chain(self.unordered.iter())
            .map(|conn| conn.pending_len())
            .sum()
    }

    fn pick(&self, partition: Partition) -> Result<&Arc<Connection>> {
        let conn = match partition {
            Partition::Key(key) => &self.ordered[(key % self.ordered.len() as u64) as usize],
            Partition::Any => {
                let at = self.cursor.fetch_add(1, Ordering::Relaxed);
                &self.unordered[at % self.unordered.len()]
            }
        };
        if conn.is_closed() {
            return Err(TransportError::connection(
                "connection permanently closed",
                Some(self.addr),
            ));
        }
        Ok(conn)
    }

    /// Sends a request frame and blocks for the raw reply frame.
    pub async fn call(
        &self,
        seq: u64,
        chain: Chain,
        deadline: Duration,
        partition: Partition,
    ) -> Result<Bytes> {
        let conn = match self.pick(partition) {
            Ok(conn) => conn,
            Err(err) => {
                chain.release();
                return Err(err);
            }
        };
        conn.call(seq, chain, deadline).await
    }

    /// Fire-and-forget send. Delivery is not acknowledged.
    pub async fn send(&self, chain: Chain, partition: Partition) -> Result<()> {
        let conn = match self.pick(partition) {
            Ok(conn) => conn,
            Err(err) => {
                chain.release();
                return Err(err);
            }
        };
        conn.enqueue(chain).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.addr)
            .field("ordered", &self.ordered.len())
            .field("unordered", &self.unordered.len())
            .finish()
    }
}
