//! Nocopy buffer chain
//!
//! An ordered sequence of owned memory nodes composed without copying.
//! A frame header written into a pooled [`Writer`] and an application
//! payload held as [`Bytes`] can be spliced into one logical buffer and
//! handed to the socket writer as a list of slices, skipping the
//! concatenation copy on the send path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};

use super::arena::Writer;

/// Where to splice a node or chain relative to the existing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    Head,
    Tail,
}

/// One owned block inside a [`Chain`].
pub enum Node {
    /// Immutable shared bytes (application payloads).
    Slice(Bytes),
    /// A pooled writer block (frame headers, encoded fields).
    Pooled(Writer),
    /// A nested chain spliced in wholesale.
    Nested(Chain),
}

impl Node {
    fn len(&self) -> usize {
        match self {
            Node::Slice(bytes) => bytes.len(),
            Node::Pooled(writer) => writer.len(),
            Node::Nested(chain) => chain.len(),
        }
    }
}

impl From<Bytes> for Node {
    fn from(bytes: Bytes) -> Self {
        Node::Slice(bytes)
    }
}

impl From<Writer> for Node {
    fn from(writer: Writer) -> Self {
        Node::Pooled(writer)
    }
}

impl From<Chain> for Node {
    fn from(chain: Chain) -> Self {
        Node::Nested(chain)
    }
}

/// "Length not computed yet"; a real chain can never reach this total.
const LEN_UNSET: usize = usize::MAX;

/// Ordered chain of owned nodes with a lazily memoized total length.
///
/// Mounting transfers node ownership, never content. The memoized length
/// is invalidated on every mutation. The memo is atomic so a chain can be
/// shared by reference with the socket writer tasks.
pub struct Chain {
    nodes: VecDeque<Node>,
    len: AtomicUsize,
}

impl Chain {
    pub fn new() -> Self {
        Self {
            nodes: VecDeque::new(),
            len: AtomicUsize::new(0),
        }
    }

    pub fn with_node(node: impl Into<Node>) -> Self {
        let mut chain = Self::new();
        chain.mount(node, Mount::Tail);
        chain
    }

    /// Splices an owned node at the head or tail without copying.
    pub fn mount(&mut self, node: impl Into<Node>, position: Mount) {
        *self.len.get_mut() = LEN_UNSET;
        match position {
            Mount::Head => self.nodes.push_front(node.into()),
            Mount::Tail => self.nodes.push_back(node.into()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total byte length, memoized until the next mutation.
    pub fn len(&self) -> usize {
        let memo = self.len.load(Ordering::Relaxed);
        if memo != LEN_UNSET {
            return memo;
        }
        let len = self.nodes.iter().map(Node::len).sum();
        self.len.store(len, Ordering::Relaxed);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the chain as one contiguous buffer.
    ///
    /// Single-node fast path: a lone `Slice` node is returned by reference
    /// count with zero allocation. Multi-node chains copy once into a
    /// fresh buffer.
    pub fn bytes(&self) -> Bytes {
        if self.nodes.len() == 1 {
            if let Some(Node::Slice(bytes)) = self.nodes.front() {
                return bytes.clone();
            }
        }
        let mut out = BytesMut::with_capacity(self.len());
        self.copy_into(&mut out);
        out.freeze()
    }

    fn copy_into(&self, out: &mut BytesMut) {
        for node in &self.nodes {
            match node {
                Node::Slice(bytes) => out.extend_from_slice(bytes),
                Node::Pooled(writer) => out.extend_from_slice(writer.as_slice()),
                Node::Nested(chain) => chain.copy_into(out),
            }
        }
    }

    /// Collects the chain's flattened slice list for a vectored write.
    pub fn slices(&self) -> Vec<&[u8]> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_slices(&mut out);
        out
    }

    fn collect_slices<'a>(&'a self, out: &mut Vec<&'a [u8]>) {
        for node in &self.nodes {
            match node {
                Node::Slice(bytes) => out.push(&bytes[..]),
                Node::Pooled(writer) => out.push(writer.as_slice()),
                Node::Nested(chain) => chain.collect_slices(out),
            }
        }
    }

    /// Walks the node chain returning every pooled block to its arena and
    /// dropping internal links. Consuming `self` makes a second release
    /// unrepresentable.
    pub fn release(mut self) {
        while let Some(node) = self.nodes.pop_front() {
            match node {
                Node::Pooled(writer) => writer.release(),
                Node::Nested(chain) => chain.release(),
                Node::Slice(_) => {}
            }
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("nodes", &self.nodes.len())
            .field("len", &self.len())
            .finish()
    }
}
