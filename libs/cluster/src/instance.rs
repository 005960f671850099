//! Cluster instance records

use std::net::SocketAddr;

use codec::{InstanceKind, ServiceState};
use serde::{Deserialize, Serialize};

/// One registered gate or node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub kind: InstanceKind,
    /// Registry-unique instance id, e.g. `gate-1`.
    pub id: String,
    /// Address other instances dial.
    pub addr: SocketAddr,
    pub state: ServiceState,
}

impl Instance {
    pub fn new(kind: InstanceKind, id: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            kind,
            id: id.into(),
            addr,
            state: ServiceState::Work,
        }
    }
}
