//! User location
//!
//! Maps a user id to the gate instance holding its connection and the
//! node instance serving its requests. Backed by an external store in
//! production; tests plug in an in-memory implementation.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Locator: Send + Sync {
    /// Records `uid` as connected through gate `insid`.
    async fn bind_gate(&self, uid: u64, insid: &str) -> Result<()>;

    async fn unbind_gate(&self, uid: u64) -> Result<()>;

    /// Records `uid` as served by node `insid`.
    async fn bind_node(&self, uid: u64, insid: &str) -> Result<()>;

    async fn unbind_node(&self, uid: u64) -> Result<()>;

    /// Gate instance currently holding `uid`'s connection, if any.
    async fn locate_gate(&self, uid: u64) -> Result<Option<String>>;

    /// Node instance currently serving `uid`, if any.
    async fn locate_node(&self, uid: u64) -> Result<Option<String>>;
}
