//! Client connection state machine
//!
//! One supervised TCP connection: dial with a per-attempt timeout,
//! handshake before the write path opens, then a reader task fulfilling
//! pending calls while the writer loop drains the bounded outbound queue
//! and ticks heartbeats. Dial failures back off exponentially up to the
//! retry ceiling; exhausting it closes the connection permanently and
//! fails every waiter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codec::packet::{self, HandshakeReq};
use codec::{frame, Arena, Chain, FrameKind};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, TransportError};
use crate::pending::PendingCalls;

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Initial dial in progress.
    Connecting,
    /// Handshake accepted; write path open.
    Opened,
    /// Session lost or dial failed; re-dial scheduled.
    Retrying,
    /// Retry budget exhausted. Terminal.
    Closed,
}

/// The handshake is always the first call on a fresh session.
const HANDSHAKE_SEQ: u64 = 1;

pub(crate) struct Connection {
    addr: SocketAddr,
    tx: mpsc::Sender<Chain>,
    pending: Arc<PendingCalls>,
    state: watch::Receiver<ConnState>,
}

impl Connection {
    /// Spawns the supervisor task and returns immediately; use
    /// [`Connection::wait_open`] to block until the first handshake.
    pub(crate) fn spawn(
        addr: SocketAddr,
        identity: Arc<HandshakeReq>,
        arena: Arena,
        config: Arc<ClientConfig>,
    ) -> Arc<Connection> {
        let (tx, rx) = mpsc::channel(config.write_queue_capacity);
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        let pending = Arc::new(PendingCalls::new(config.pending_shards));

        tokio::spawn(supervise(
            addr,
            identity,
            arena,
            config,
            rx,
            state_tx,
            pending.clone(),
        ));

        Arc::new(Connection {
            addr,
            tx,
            pending,
            state: state_rx,
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.state.borrow() == ConnState::Closed
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Blocks until the connection first reaches `Opened`, or fails when
    /// it closes permanently before that.
    pub(crate) async fn wait_open(&self) -> Result<()> {
        let mut state = self.state.clone();
        loop {
            match *state.borrow_and_update() {
                ConnState::Opened => return Ok(()),
                ConnState::Closed => {
                    return Err(TransportError::connection(
                        "connection closed before handshake completed",
                        Some(self.addr),
                    ))
                }
                ConnState::Connecting | ConnState::Retrying => {}
            }
            if state.changed().await.is_err() {
                return Err(TransportError::connection(
                    "connection supervisor exited",
                    Some(self.addr),
                ));
            }
        }
    }

    /// Queues a frame for the writer loop. Backpressure: try first, then
    /// await queue capacity.
    pub(crate) async fn enqueue(&self, chain: Chain) -> Result<()> {
        match self.tx.try_send(chain) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(chain)) => {
                warn!(addr = %self.addr, "write queue full, awaiting capacity");
                self.tx.send(chain).await.map_err(|rejected| {
                    rejected.0.release();
                    TransportError::connection("connection permanently closed", Some(self.addr))
                })
            }
            Err(mpsc::error::TrySendError::Closed(chain)) => {
                chain.release();
                Err(TransportError::connection(
                    "connection permanently closed",
                    Some(self.addr),
                ))
            }
        }
    }

    /// Sends a request frame and blocks for its reply. Every non-reply
    /// exit evicts the pending entry.
    pub(crate) async fn call(&self, seq: u64, chain: Chain, deadline: Duration) -> Result<Bytes> {
        if seq == 0 {
            chain.release();
            return Err(TransportError::protocol(
                "sequence 0 is reserved for fire-and-forget frames",
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.register(seq, reply_tx);
        if let Err(err) = self.enqueue(chain).await {
            self.pending.evict(seq);
            return Err(err);
        }
        match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => {
                self.pending.evict(seq);
                Err(TransportError::connection(
                    "connection closed while awaiting reply",
                    Some(self.addr),
                ))
            }
            Err(_) => {
                self.pending.evict(seq);
                Err(TransportError::timeout("call", deadline.as_millis() as u64))
            }
        }
    }
}

fn backoff_for(attempt: u32, config: &ClientConfig) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(20);
    config
        .backoff_floor
        .saturating_mul(factor)
        .min(config.backoff_cap)
}

async fn supervise(
    addr: SocketAddr,
    identity: Arc<HandshakeReq>,
    arena: Arena,
    config: Arc<ClientConfig>,
    mut rx: mpsc::Receiver<Chain>,
    state_tx: watch::Sender<ConnState>,
    pending: Arc<PendingCalls>,
) {
    let mut attempts = 0u32;
    loop {
        match open_session(addr, &identity, &arena, &config).await {
            Ok(stream) => {
                attempts = 0;
                let _ = state_tx.send(ConnState::Opened);
                info!(%addr, "connection opened");
                match run_session(stream, &mut rx, &pending, &config).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost(err) => {
                        warn!(%addr, error = %err, "connection lost");
                        let _ = state_tx.send(ConnState::Retrying);
                    }
                }
            }
            Err(err) => {
                attempts += 1;
                if attempts > config.retry_limit {
                    error!(%addr, attempts, error = %err, "retry budget exhausted, closing");
                    break;
                }
                let backoff = backoff_for(attempts, &config);
                debug!(%addr, attempts, backoff_ms = backoff.as_millis() as u64, error = %err,
                    "dial failed, backing off");
                let _ = state_tx.send(ConnState::Retrying);
                tokio::time::sleep(backoff).await;
            }
        }
    }

    let _ = state_tx.send(ConnState::Closed);
    rx.close();
    while let Ok(chain) = rx.try_recv() {
        chain.release();
    }
    let dropped = pending.drain();
    if dropped > 0 {
        warn!(%addr, dropped, "failing in-flight calls on permanent close");
    }
}

/// Dial plus handshake. The write path stays disabled until the peer
/// accepts the declared identity.
async fn open_session(
    addr: SocketAddr,
    identity: &HandshakeReq,
    arena: &Arena,
    config: &ClientConfig,
) -> Result<TcpStream> {
    let dial = tokio::time::timeout(config.dial_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::timeout("dial", config.dial_timeout.as_millis() as u64))?;
    let mut stream = dial
        .map_err(|err| TransportError::connection_with_source("dial failed", Some(addr), err))?;
    stream.set_nodelay(true)?;

    let chain = packet::encode_handshake_req(arena, HANDSHAKE_SEQ, identity);
    frame::write_chain(&mut stream, &chain).await?;
    chain.release();

    let reply = tokio::time::timeout(config.handshake_timeout, async {
        loop {
            let frame = codec::read_frame(&mut stream, config.max_frame_size).await?;
            match codec::split_frame(&frame)? {
                FrameKind::Heartbeat => continue,
                FrameKind::Data { route, seq, .. }
                    if route == codec::Route::Handshake.as_u8() && seq == HANDSHAKE_SEQ =>
                {
                    let (_, code) = packet::decode_handshake_res(&frame)?;
                    return Ok::<_, TransportError>(code);
                }
                FrameKind::Data { route, seq, .. } => {
                    // Replies to calls from a previous session may still
                    // be in flight; they are stale now.
                    debug!(%addr, route, seq, "ignoring stray frame during handshake");
                }
            }
        }
    })
    .await
    .map_err(|_| {
        TransportError::timeout("handshake", config.handshake_timeout.as_millis() as u64)
    })??;

    if !reply.is_ok() {
        return Err(TransportError::handshake(
            format!("peer rejected handshake with code {reply:?}"),
            Some(addr),
        ));
    }
    Ok(stream)
}

enum SessionEnd {
    /// All senders dropped; the client is shutting down.
    Shutdown,
    /// IO failure; the supervisor re-dials.
    Lost(TransportError),
}

async fn run_session(
    stream: TcpStream,
    rx: &mut mpsc::Receiver<Chain>,
    pending: &Arc<PendingCalls>,
    config: &ClientConfig,
) -> SessionEnd {
    let (read_half, mut write_half) = stream.into_split();
    let (done_tx, mut done_rx) = oneshot::channel();
    let reader = tokio::spawn(read_loop(
        read_half,
        pending.clone(),
        config.max_frame_size,
        done_tx,
    ));

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so queued frames go out first.
    heartbeat.tick().await;

    let end = loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(chain) => {
                    let written = frame::write_chain(&mut write_half, &chain).await;
                    chain.release();
                    if let Err(err) = written {
                        break SessionEnd::Lost(err.into());
                    }
                }
                None => break SessionEnd::Shutdown,
            },
            _ = heartbeat.tick() => {
                if let Err(err) = frame::write_bytes(&mut write_half, &codec::heartbeat_frame()).await {
                    break SessionEnd::Lost(err.into());
                }
            }
            read_err = &mut done_rx => {
                break SessionEnd::Lost(match read_err {
                    Ok(err) => err,
                    Err(_) => TransportError::connection("reader task aborted", None),
                });
            }
        }
    };
    reader.abort();
    end
}

/// Decodes inbound frames: heartbeats are swallowed, replies fulfill the
/// pending table, unmatched frames are dropped. A malformed frame is
/// fatal only to itself; IO errors end the session.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    pending: Arc<PendingCalls>,
    max_frame_size: usize,
    done: oneshot::Sender<TransportError>,
) {
    loop {
        match codec::read_frame(&mut read_half, max_frame_size).await {
            Ok(frame) => match codec::split_frame(&frame) {
                Ok(FrameKind::Heartbeat) => {}
                Ok(FrameKind::Data { route, seq, .. }) => {
                    if seq == 0 || !pending.complete(seq, frame.clone()) {
                        debug!(route, seq, "dropping unmatched inbound frame");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "skipping malformed inbound frame");
                }
            },
            Err(err) => {
                let _ = done.send(err.into());
                return;
            }
        }
    }
}
