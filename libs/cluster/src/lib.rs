//! Cluster façade
//!
//! Collaborator traits (user location, instance registry/discovery,
//! gate-local sessions) and the typed proxies gates and nodes use to
//! call each other over the pooled transport.

pub mod discovery;
pub mod error;
pub mod instance;
pub mod locator;
pub mod proxy;
pub mod seq;
pub mod session;

pub use discovery::{Discovery, Registry};
pub use error::{ClusterError, Result};
pub use instance::Instance;
pub use locator::Locator;
pub use proxy::{GateProxy, NodeProxy};
pub use seq::SeqCounter;
pub use session::Session;
