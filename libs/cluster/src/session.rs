//! Gate-local session operations
//!
//! The gate's connection registry implements this trait; node-originated
//! frames (push, multicast, subscribe management) terminate here. Targets
//! are addressed by connection id or user id via [`SessionKind`].

use async_trait::async_trait;
use bytes::Bytes;
use codec::SessionKind;

use crate::error::Result;

#[async_trait]
pub trait Session: Send + Sync {
    /// Delivers `message` to one target.
    async fn push(&self, kind: SessionKind, target: u64, message: Bytes) -> Result<()>;

    /// Delivers `message` to each target; returns how many were reached.
    async fn multicast(&self, kind: SessionKind, targets: &[u64], message: Bytes) -> Result<u64>;

    /// Delivers `message` to every session; returns how many were reached.
    async fn broadcast(&self, kind: SessionKind, message: Bytes) -> Result<u64>;

    /// Publishes `message` to a channel's subscribers; returns the count.
    async fn publish(&self, channel: &str, message: Bytes) -> Result<u64>;

    async fn subscribe(&self, kind: SessionKind, targets: &[u64], channel: &str) -> Result<()>;

    async fn unsubscribe(&self, kind: SessionKind, targets: &[u64], channel: &str) -> Result<()>;

    /// Remote address of the target, if connected.
    async fn ip(&self, kind: SessionKind, target: u64) -> Result<String>;

    /// Live session count for the addressing kind.
    async fn count(&self, kind: SessionKind) -> Result<u64>;

    async fn online(&self, kind: SessionKind, target: u64) -> Result<bool>;

    /// Closes the target's connection; `force` skips graceful teardown.
    async fn close(&self, kind: SessionKind, target: u64, force: bool) -> Result<()>;
}
