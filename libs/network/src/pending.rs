//! Pending-call table
//!
//! Correlates in-flight request sequence numbers with reply waiters.
//! Sharded by `seq % shard_count` so the reader task and many callers
//! contend on separate locks. Completion and eviction race freely: a
//! timeout firing while the reply is in flight means both sides call in,
//! and whichever wins removes the entry while the loser finds nothing.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

pub struct PendingCalls {
    shards: Vec<Mutex<HashMap<u64, oneshot::Sender<Bytes>>>>,
}

impl PendingCalls {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, seq: u64) -> &Mutex<HashMap<u64, oneshot::Sender<Bytes>>> {
        &self.shards[(seq % self.shards.len() as u64) as usize]
    }

    /// Registers a reply waiter for `seq`, replacing any stale entry.
    pub fn register(&self, seq: u64, reply: oneshot::Sender<Bytes>) {
        if self.shard(seq).lock().insert(seq, reply).is_some() {
            debug!(seq, "pending call replaced a stale entry");
        }
    }

    /// Fulfills the waiter for `seq` with the reply frame. Returns false
    /// when the entry was already evicted or never registered.
    pub fn complete(&self, seq: u64, frame: Bytes) -> bool {
        match self.shard(seq).lock().remove(&seq) {
            // A dropped receiver means the caller gave up after we took
            // the entry; the frame is discarded either way.
            Some(reply) => reply.send(frame).is_ok(),
            None => false,
        }
    }

    /// Drops the waiter for `seq` without a reply. Safe to call after the
    /// reply won the race.
    pub fn evict(&self, seq: u64) -> bool {
        self.shard(seq).lock().remove(&seq).is_some()
    }

    /// Drops every waiter, closing their reply channels. Called when a
    /// connection closes permanently.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        for shard in &self.shards {
            dropped += shard.lock().drain().count();
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_fulfills_waiter() {
        let pending = PendingCalls::new(4);
        let (tx, mut rx) = oneshot::channel();
        pending.register(7, tx);
        assert!(pending.complete(7, Bytes::from_static(b"reply")));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"reply"));
        assert!(pending.is_empty());
    }

    #[test]
    fn complete_after_evict_is_a_noop() {
        let pending = PendingCalls::new(4);
        let (tx, _rx) = oneshot::channel();
        pending.register(7, tx);
        assert!(pending.evict(7));
        assert!(!pending.complete(7, Bytes::new()));
        assert!(!pending.evict(7));
    }

    #[test]
    fn drain_closes_waiters() {
        let pending = PendingCalls::new(2);
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        pending.register(1, tx_a);
        pending.register(2, tx_b);
        assert_eq!(pending.drain(), 2);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn sequences_spread_across_shards() {
        let pending = PendingCalls::new(4);
        for seq in 0..16 {
            let (tx, _rx) = oneshot::channel();
            pending.register(seq, tx);
        }
        assert_eq!(pending.len(), 16);
    }
}
