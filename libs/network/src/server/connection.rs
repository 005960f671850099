//! Server-side connection handling
//!
//! Each accepted socket gets a reader loop and a writer task. The reader
//! answers handshakes, echoes heartbeats, stamps a last-seen timestamp,
//! and dispatches data frames to the registered route handler. An idle
//! check force-closes connections silent for two heartbeat intervals.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use codec::packet::{self, HandshakeReq};
use codec::{frame, Chain, Code, FrameKind, Route};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::server::Shared;

/// Cloneable handle to one accepted connection, passed to route handlers
/// so they can queue replies.
#[derive(Clone)]
pub struct ConnHandle {
    inner: Arc<ConnInner>,
}

struct ConnInner {
    id: u64,
    peer: SocketAddr,
    tx: mpsc::Sender<Chain>,
    identity: RwLock<Option<HandshakeReq>>,
}

impl ConnHandle {
    fn new(id: u64, peer: SocketAddr, tx: mpsc::Sender<Chain>) -> Self {
        Self {
            inner: Arc::new(ConnInner {
                id,
                peer,
                tx,
                identity: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Identity declared by the peer's handshake, once accepted.
    pub fn identity(&self) -> Option<HandshakeReq> {
        self.inner.identity.read().clone()
    }

    fn set_identity(&self, identity: HandshakeReq) {
        *self.inner.identity.write() = Some(identity);
    }

    fn handshaken(&self) -> bool {
        self.inner.identity.read().is_some()
    }

    /// Queues a frame for the writer task. Backpressure: try first, then
    /// await queue capacity.
    pub async fn send(&self, chain: Chain) -> Result<()> {
        match self.inner.tx.try_send(chain) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(chain)) => {
                warn!(conn = self.inner.id, peer = %self.inner.peer, "write queue full, awaiting capacity");
                self.inner.tx.send(chain).await.map_err(|rejected| {
                    rejected.0.release();
                    TransportError::connection("connection closed", Some(self.inner.peer))
                })
            }
            Err(mpsc::error::TrySendError::Closed(chain)) => {
                chain.release();
                Err(TransportError::connection(
                    "connection closed",
                    Some(self.inner.peer),
                ))
            }
        }
    }
}

impl std::fmt::Debug for ConnHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnHandle")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .finish()
    }
}

pub(crate) async fn serve(shared: Arc<Shared>, stream: TcpStream, peer: SocketAddr, id: u64) {
    if let Err(err) = stream.set_nodelay(true) {
        warn!(conn = id, %peer, error = %err, "failed to set nodelay");
    }
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Chain>(shared.config.write_queue_capacity);
    let handle = ConnHandle::new(id, peer, tx);

    let writer = tokio::spawn(async move {
        while let Some(chain) = rx.recv().await {
            let written = frame::write_chain(&mut write_half, &chain).await;
            chain.release();
            if written.is_err() {
                return;
            }
        }
    });

    let idle_limit = shared.config.heartbeat_interval * 2;
    let mut idle_check = tokio::time::interval(shared.config.heartbeat_interval);
    idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    // The read future must survive idle ticks: dropping it mid-frame
    // would lose consumed bytes and desync the stream.
    'conn: loop {
        let read = codec::read_frame(&mut read_half, shared.config.max_frame_size);
        tokio::pin!(read);
        let frame = loop {
            tokio::select! {
                _ = idle_check.tick() => {
                    if last_seen.elapsed() > idle_limit {
                        warn!(conn = id, %peer, "closing idle connection");
                        break 'conn;
                    }
                }
                read = &mut read => match read {
                    Ok(frame) => break frame,
                    Err(err) => {
                        debug!(conn = id, %peer, error = %err, "connection read ended");
                        break 'conn;
                    }
                },
            }
        };
        last_seen = Instant::now();
        match codec::split_frame(&frame) {
            Ok(FrameKind::Heartbeat) => {
                let echo = Chain::with_node(codec::heartbeat_frame());
                if handle.send(echo).await.is_err() {
                    break;
                }
            }
            Ok(FrameKind::Data { route, seq, .. }) => {
                if route == Route::Handshake.as_u8() {
                    if !accept_handshake(&shared, &handle, &frame).await {
                        break;
                    }
                    continue;
                }
                if !handle.handshaken() {
                    warn!(conn = id, %peer, route, "dropping frame before handshake");
                    continue;
                }
                match Route::from_u8(route).and_then(|route| shared.routes.get(&route)) {
                    Some(handler) => handler(handle.clone(), frame),
                    // Protocol skew tolerance: peers may speak routes
                    // this server does not serve.
                    None => debug!(conn = id, %peer, route, seq, "ignoring unhandled route"),
                }
            }
            Err(err) => {
                warn!(conn = id, %peer, error = %err, "skipping malformed frame");
            }
        }
    }

    writer.abort();
    info!(conn = id, %peer, "connection closed");
}

/// Decodes and acknowledges the handshake. Returns false when the frame
/// is malformed enough to warrant closing the connection.
async fn accept_handshake(shared: &Shared, handle: &ConnHandle, frame: &[u8]) -> bool {
    match packet::decode_handshake_req(frame) {
        Ok((seq, identity)) => {
            info!(conn = handle.id(), peer = %handle.peer(), kind = ?identity.kind,
                instance = %identity.id, "handshake accepted");
            handle.set_identity(identity);
            let reply = packet::encode_handshake_res(&shared.arena, seq, Code::Ok);
            handle.send(reply).await.is_ok()
        }
        Err(err) => {
            warn!(conn = handle.id(), peer = %handle.peer(), error = %err,
                "rejecting malformed handshake");
            false
        }
    }
}
