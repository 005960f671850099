//! Actor Runtime Error Types

use codec::Route;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActorError {
    /// An actor with this kind/id already runs in the process.
    #[error("Actor {kind}/{id} already exists")]
    DuplicatePid { kind: String, id: u64 },

    /// No live actor under this kind/id.
    #[error("Actor {kind}/{id} not found")]
    NotFound { kind: String, id: u64 },

    /// A request addressed a uid with no bound actor of the needed kind.
    #[error("User {uid} has no bound {kind} actor")]
    NotBound { uid: u64, kind: String },

    /// No actor kind registered the requested route.
    #[error("Route {route} has no registered actor kind")]
    UnhandledRoute { route: Route },

    /// Two actor kinds both claimed a route at spawn time.
    #[error("Route {route} already registered by kind {existing}, rejected for {requested}")]
    RouteConflict {
        route: Route,
        existing: String,
        requested: String,
    },

    /// The target actor's mailbox is gone (actor killed or task exited).
    #[error("Mailbox closed for actor {kind}/{id}")]
    MailboxClosed { kind: String, id: u64 },
}

pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    pub fn duplicate_pid(kind: impl Into<String>, id: u64) -> Self {
        Self::DuplicatePid {
            kind: kind.into(),
            id,
        }
    }

    pub fn not_found(kind: impl Into<String>, id: u64) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id,
        }
    }

    pub fn not_bound(uid: u64, kind: impl Into<String>) -> Self {
        Self::NotBound {
            uid,
            kind: kind.into(),
        }
    }

    pub fn mailbox_closed(kind: impl Into<String>, id: u64) -> Self {
        Self::MailboxClosed {
            kind: kind.into(),
            id,
        }
    }
}
