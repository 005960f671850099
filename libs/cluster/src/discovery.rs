//! Instance registration and discovery
//!
//! `Registry` is the write side: an instance announces itself on startup
//! and withdraws on shutdown. `Discovery` is the read side: watchers get
//! a snapshot stream of the live instances of one kind, re-emitted on
//! every membership change.

use async_trait::async_trait;
use codec::InstanceKind;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::instance::Instance;

#[async_trait]
pub trait Registry: Send + Sync {
    async fn register(&self, instance: &Instance) -> Result<()>;

    async fn deregister(&self, instance: &Instance) -> Result<()>;
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Current live instances of `kind`.
    async fn instances(&self, kind: InstanceKind) -> Result<Vec<Instance>>;

    /// Stream of full membership snapshots for `kind`; the first item is
    /// the current membership.
    async fn watch(&self, kind: InstanceKind) -> Result<BoxStream<'static, Vec<Instance>>>;
}
