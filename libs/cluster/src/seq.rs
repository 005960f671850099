//! Call sequence counter
//!
//! Process-local source of request sequence numbers. Zero is reserved
//! for fire-and-forget frames and one for the transport handshake, so
//! the counter starts at two and skips both on wrap.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct SeqCounter {
    next: AtomicU64,
}

impl SeqCounter {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(2),
        }
    }

    pub fn next(&self) -> u64 {
        loop {
            let seq = self.next.fetch_add(1, Ordering::Relaxed);
            if seq > 1 {
                return seq;
            }
        }
    }
}

impl Default for SeqCounter {
    fn default() -> Self {
        Self::new()
    }
}
