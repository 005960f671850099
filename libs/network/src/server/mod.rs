//! Server side of the transport: accept loop, per-connection tasks, and
//! the fixed route table.
//!
//! Route handlers are registered once, before `bind`; the table never
//! changes afterwards, so dispatch is a lock-free map lookup. Handlers
//! receive the connection handle and the raw frame and are expected to
//! decode, act, and queue any reply themselves (spawning if the work
//! blocks).

mod connection;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use codec::{Arena, Route};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::Result;

pub use connection::ConnHandle;

/// Handler invoked for every data frame on its route.
pub type Handler = Arc<dyn Fn(ConnHandle, Bytes) + Send + Sync>;

/// Route table built before the server starts.
///
/// The handshake route is served by the connection layer itself and
/// cannot be overridden here.
#[derive(Default, Clone)]
pub struct Router {
    handlers: HashMap<Route, Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, route: Route, handler: F) -> Self
    where
        F: Fn(ConnHandle, Bytes) + Send + Sync + 'static,
    {
        if route == Route::Handshake {
            warn!("handshake route is built in; ignoring custom handler");
            return self;
        }
        self.handlers.insert(route, Arc::new(handler));
        self
    }

    pub fn routes(&self) -> usize {
        self.handlers.len()
    }
}

pub(crate) struct Shared {
    pub(crate) config: ServerConfig,
    pub(crate) routes: HashMap<Route, Handler>,
    pub(crate) arena: Arena,
    pub(crate) active: AtomicUsize,
}

pub struct Server {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Binds the listener and starts accepting. Returns once the socket
    /// is live; connections are served on background tasks.
    pub async fn bind(addr: SocketAddr, config: ServerConfig, router: Router) -> Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            config,
            routes: router.handlers,
            arena: Arena::new(),
            active: AtomicUsize::new(0),
        });
        info!(%local_addr, routes = shared.routes.len(), "server listening");

        let accept_shared = shared.clone();
        let accept_task = tokio::spawn(accept_loop(listener, accept_shared));

        Ok(Server {
            local_addr,
            shared,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Currently served connection count.
    pub fn connections(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    let mut next_id: u64 = 1;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        let active = shared.active.load(Ordering::Relaxed);
        if active >= shared.config.max_connections {
            warn!(%peer, active, max = shared.config.max_connections,
                "connection limit reached, dropping accept");
            continue;
        }
        let id = next_id;
        next_id += 1;
        shared.active.fetch_add(1, Ordering::Relaxed);

        let conn_shared = shared.clone();
        tokio::spawn(async move {
            connection::serve(conn_shared.clone(), stream, peer, id).await;
            conn_shared.active.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
