//! Pooled writers and the nocopy buffer chain.

mod arena;
mod chain;

pub use arena::{Arena, ArenaStats, Writer};
pub use chain::{Chain, Mount, Node};
