//! Client side of the transport: supervised connections, the partitioned
//! pool, and the single-flight builder.

mod builder;
mod connection;
mod pool;

pub use builder::Builder;
pub use connection::ConnState;
pub use pool::{Client, Partition};
