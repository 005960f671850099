//! Wire Protocol Codec
//!
//! Length-prefixed binary frames for the cluster transport, plus the
//! pooled buffer infrastructure the encode path rides on. A frame is
//! `size:u32 | header:u8 | route:u8 | seq:u64 | fields | payload`, all
//! big-endian; heartbeats collapse to a single header byte.
//!
//! The codec deliberately knows nothing about sockets or routing: the
//! `network` crate feeds it complete frames and writes out the chains it
//! produces.

pub mod buffer;
pub mod constants;
pub mod error;
pub mod frame;
pub mod packet;

pub use buffer::{Arena, Chain, Mount, Node, Writer};
pub use constants::{
    Code, EventKind, InstanceKind, Route, ServiceState, SessionKind, DATA_PRELUDE_BYTES,
    MAX_FRAME_SIZE, MAX_TARGETS,
};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{heartbeat_frame, is_heartbeat, read_frame, split_frame, write_chain, FrameKind};
