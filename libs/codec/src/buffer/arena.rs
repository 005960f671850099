//! Size-classed buffer arena
//!
//! Pooled writable blocks for hot-path frame construction. The gate and
//! node processes push thousands of small frames per second; reusing
//! writer blocks keeps the encode path allocation-free after warmup.
//!
//! Ownership is explicit in the type system: [`Arena::alloc`] hands out a
//! move-only [`Writer`] whose backing block returns to its size-class pool
//! when the writer is released or dropped. Double release is impossible by
//! construction because `release` consumes the handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Smallest size class in bytes.
const MIN_CLASS: usize = 64;

/// Number of power-of-two size classes (64 B .. 64 KB).
const CLASS_COUNT: usize = 11;

/// Maximum idle blocks retained per class. Excess blocks are freed rather
/// than pooled so a burst does not pin memory forever.
const MAX_IDLE_PER_CLASS: usize = 64;

/// Pooled allocator handing out [`Writer`] blocks by size class.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

struct ArenaInner {
    classes: Vec<Mutex<Vec<Vec<u8>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Snapshot of arena reuse counters.
#[derive(Debug, Clone, Copy)]
pub struct ArenaStats {
    pub hits: u64,
    pub misses: u64,
}

impl Arena {
    pub fn new() -> Self {
        let classes = (0..CLASS_COUNT).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            inner: Arc::new(ArenaInner {
                classes,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a pooled writable block sized to the smallest class that can
    /// hold `n` bytes. Requests beyond the largest class get a one-shot
    /// unpooled block.
    pub fn alloc(&self, n: usize) -> Writer {
        match class_for(n) {
            Some(class) => {
                let capacity = MIN_CLASS << class;
                let buf = {
                    let mut pool = self.inner.classes[class].lock();
                    pool.pop()
                };
                let buf = match buf {
                    Some(buf) => {
                        self.inner.hits.fetch_add(1, Ordering::Relaxed);
                        buf
                    }
                    None => {
                        self.inner.misses.fetch_add(1, Ordering::Relaxed);
                        Vec::with_capacity(capacity)
                    }
                };
                Writer {
                    buf,
                    class: Some(class),
                    arena: Some(self.clone()),
                }
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                Writer {
                    buf: Vec::with_capacity(n),
                    class: None,
                    arena: None,
                }
            }
        }
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of idle blocks currently pooled across all classes.
    pub fn idle_blocks(&self) -> usize {
        self.inner
            .classes
            .iter()
            .map(|pool| pool.lock().len())
            .sum()
    }

    fn recycle(&self, mut buf: Vec<u8>, class: usize) {
        buf.clear();
        let mut pool = self.inner.classes[class].lock();
        if pool.len() < MAX_IDLE_PER_CLASS {
            pool.push(buf);
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

fn class_for(n: usize) -> Option<usize> {
    let mut capacity = MIN_CLASS;
    for class in 0..CLASS_COUNT {
        if n <= capacity {
            return Some(class);
        }
        capacity <<= 1;
    }
    None
}

/// Move-only handle to a pooled writable block.
///
/// All integer writes are big-endian, matching the wire format. Dropping
/// the writer returns the block to its pool.
pub struct Writer {
    buf: Vec<u8>,
    class: Option<usize>,
    arena: Option<Arena>,
}

impl Writer {
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Overwrites 4 bytes at `offset` with a big-endian `u32`. Used to
    /// patch the size prefix after variable-length fields are written.
    ///
    /// Panics if the range is out of bounds; writing a size field the
    /// frame never reserved is a programmer error.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Returns the block to its pool. Equivalent to dropping the writer;
    /// provided so release points read explicitly at call sites.
    pub fn release(self) {}
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let (Some(class), Some(arena)) = (self.class, self.arena.take()) {
            let buf = std::mem::take(&mut self.buf);
            arena.recycle(buf, class);
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .field("class", &self.class)
            .finish()
    }
}
