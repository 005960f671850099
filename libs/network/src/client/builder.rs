//! Client builder
//!
//! Address → pooled client map with single-flight dialing: concurrent
//! first uses of an address await one `Client::connect` instead of racing
//! their own. Pools that closed permanently are evicted so the next use
//! re-dials.

use std::net::SocketAddr;
use std::sync::Arc;

use codec::packet::HandshakeReq;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::client::pool::Client;
use crate::config::ClientConfig;
use crate::error::Result;

pub struct Builder {
    identity: HandshakeReq,
    config: Arc<ClientConfig>,
    clients: DashMap<SocketAddr, Arc<OnceCell<Arc<Client>>>>,
}

impl Builder {
    pub fn new(identity: HandshakeReq, config: ClientConfig) -> Self {
        Self {
            identity,
            config: Arc::new(config),
            clients: DashMap::new(),
        }
    }

    /// Returns the pooled client for `addr`, dialing it on first use.
    pub async fn get(&self, addr: SocketAddr) -> Result<Arc<Client>> {
        loop {
            let cell = self
                .clients
                .entry(addr)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();

            let dialed = cell
                .get_or_try_init(|| {
                    debug!(%addr, "dialing new client pool");
                    Client::connect(addr, self.identity.clone(), self.config.clone())
                })
                .await;

            match dialed {
                Ok(client) if client.is_closed() => {
                    warn!(%addr, "evicting permanently closed client pool");
                    self.remove_cell(addr, &cell);
                }
                Ok(client) => return Ok(client.clone()),
                Err(err) => {
                    // The cell stays uninitialized after a failed init;
                    // drop it so the next use starts a fresh dial.
                    self.remove_cell(addr, &cell);
                    return Err(err);
                }
            }
        }
    }

    /// Drops the cached pool for `addr`, if any.
    pub fn evict(&self, addr: SocketAddr) {
        self.clients.remove(&addr);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn remove_cell(&self, addr: SocketAddr, cell: &Arc<OnceCell<Arc<Client>>>) {
        self.clients
            .remove_if(&addr, |_, current| Arc::ptr_eq(current, cell));
    }
}
