//! Per-process actor scheduler
//!
//! Actors pair an application `Processor` with a bounded FIFO mailbox
//! drained by a dedicated task. The `Scheduler` maps routes to actor
//! kinds, binds user ids to actor instances (at most one per uid and
//! kind), and dispatches: lifecycle events broadcast to every actor,
//! requests go to exactly the bound actor or fail fast.

mod actor;
mod context;
mod error;
mod middleware;
mod processor;
mod scheduler;

pub use actor::Pid;
pub use context::{Context, ContextKind};
pub use error::{ActorError, Result};
pub use middleware::Middleware;
pub use processor::{Processor, Routes};
pub use scheduler::{ActorConfig, Scheduler};
