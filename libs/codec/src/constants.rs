//! Wire protocol constants
//!
//! Field widths, header bits, and the route/code enumerations shared by
//! every frame on the wire. All multi-byte fields are big-endian.

use serde::{Deserialize, Serialize};

/// Width of the size prefix (`u32`). The size counts every byte after it.
pub const SIZE_BYTES: usize = 4;

/// Width of the header byte.
pub const HEADER_BYTES: usize = 1;

/// Width of the route byte.
pub const ROUTE_BYTES: usize = 1;

/// Width of the sequence number (`u64`). `seq == 0` means fire-and-forget.
pub const SEQ_BYTES: usize = 8;

/// Width of the response code (`u16`).
pub const CODE_BYTES: usize = 2;

/// Fixed prefix shared by every data frame: size, header, route, seq.
pub const DATA_PRELUDE_BYTES: usize = SIZE_BYTES + HEADER_BYTES + ROUTE_BYTES + SEQ_BYTES;

/// Header bit marking an ordinary data frame.
pub const DATA_BIT: u8 = 1 << 0;

/// Header bit marking a heartbeat frame. Heartbeats carry no route, seq,
/// or payload.
pub const HEARTBEAT_BIT: u8 = 1 << 7;

/// Maximum declared frame size accepted by the framing layer (16MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of targets in one multicast/subscribe batch. Target
/// lists are prefixed with a `u16` count.
pub const MAX_TARGETS: usize = u16::MAX as usize;

/// Route byte identifying the logical operation of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Route {
    Handshake = 1,
    Bind = 2,
    Unbind = 3,
    GetIp = 4,
    Stat = 5,
    IsOnline = 6,
    Disconnect = 7,
    Push = 8,
    Multicast = 9,
    Broadcast = 10,
    Publish = 11,
    Subscribe = 12,
    Unsubscribe = 13,
    Trigger = 14,
    Deliver = 15,
    GetState = 16,
    SetState = 17,
}

impl Route {
    /// Creates a route from its wire byte. Unknown bytes return `None` so
    /// servers can tolerate protocol skew between rolling-upgraded peers.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Handshake),
            2 => Some(Self::Bind),
            3 => Some(Self::Unbind),
            4 => Some(Self::GetIp),
            5 => Some(Self::Stat),
            6 => Some(Self::IsOnline),
            7 => Some(Self::Disconnect),
            8 => Some(Self::Push),
            9 => Some(Self::Multicast),
            10 => Some(Self::Broadcast),
            11 => Some(Self::Publish),
            12 => Some(Self::Subscribe),
            13 => Some(Self::Unsubscribe),
            14 => Some(Self::Trigger),
            15 => Some(Self::Deliver),
            16 => Some(Self::GetState),
            17 => Some(Self::SetState),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Numeric response code carried by every reply frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Code {
    Ok = 0,
    Failed = 1,
    NotFoundSession = 2,
    InternalError = 3,
    InvalidArgument = 4,
}

impl Code {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Failed),
            2 => Some(Self::NotFoundSession),
            3 => Some(Self::InternalError),
            4 => Some(Self::InvalidArgument),
            _ => None,
        }
    }

    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Kind of a cluster instance, declared during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InstanceKind {
    Gate = 1,
    Node = 2,
}

impl InstanceKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Gate),
            2 => Some(Self::Node),
            _ => None,
        }
    }
}

/// How a session target is addressed: by connection id or by user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionKind {
    Conn = 1,
    User = 2,
}

impl SessionKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Conn),
            2 => Some(Self::User),
            _ => None,
        }
    }
}

/// Connection lifecycle event carried by a Trigger frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Connect = 1,
    Reconnect = 2,
    Disconnect = 3,
}

impl EventKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Connect),
            2 => Some(Self::Reconnect),
            3 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// Reported serving state of an instance (Get/SetState frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceState {
    Work = 1,
    Busy = 2,
    Hang = 3,
    Shut = 4,
}

impl ServiceState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Work),
            2 => Some(Self::Busy),
            3 => Some(Self::Hang),
            4 => Some(Self::Shut),
            _ => None,
        }
    }
}
