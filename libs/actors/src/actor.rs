//! Actor dispatch task
//!
//! Each spawned actor owns a bounded mailbox drained strictly FIFO by a
//! dedicated task, plus a separate channel for invoke closures that run
//! inside the actor's thread of control. Killing an actor closes both
//! channels; the task finishes the mail already queued, then calls
//! `destroy`.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::context::{Context, ContextKind};
use crate::error::{ActorError, Result};
use crate::middleware;
use crate::processor::{Processor, Routes};

/// Process-unique actor identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    pub kind: String,
    pub id: u64,
}

impl Pid {
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

pub(crate) enum Mail {
    Deliver(Context),
    Stop,
}

pub(crate) type Invoke = Box<dyn FnOnce() + Send>;

/// Cloneable handle held by the scheduler's live map.
#[derive(Clone)]
pub(crate) struct ActorHandle {
    pid: Pid,
    mail_tx: mpsc::Sender<Mail>,
    invoke_tx: mpsc::Sender<Invoke>,
}

impl ActorHandle {
    pub(crate) fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Queues a context, awaiting mailbox capacity when full.
    pub(crate) async fn deliver(&self, ctx: Context) -> Result<()> {
        match self.mail_tx.try_send(Mail::Deliver(ctx)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(mail)) => {
                warn!(pid = %self.pid, "mailbox full, awaiting capacity");
                self.mail_tx
                    .send(mail)
                    .await
                    .map_err(|_| ActorError::mailbox_closed(self.pid.kind.clone(), self.pid.id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ActorError::mailbox_closed(
                self.pid.kind.clone(),
                self.pid.id,
            )),
        }
    }

    /// Runs a closure on the actor's dispatch task.
    pub(crate) async fn invoke(&self, f: Invoke) -> Result<()> {
        self.invoke_tx
            .send(f)
            .await
            .map_err(|_| ActorError::mailbox_closed(self.pid.kind.clone(), self.pid.id))
    }

    pub(crate) async fn stop(&self) {
        // A closed channel means the task already exited; nothing to do.
        let _ = self.mail_tx.send(Mail::Stop).await;
    }
}

/// Spawns the dispatch task. `init` must already have filled `routes`.
pub(crate) fn spawn(
    pid: Pid,
    processor: Box<dyn Processor>,
    routes: Routes,
    mailbox_capacity: usize,
) -> ActorHandle {
    let (mail_tx, mail_rx) = mpsc::channel(mailbox_capacity);
    let (invoke_tx, invoke_rx) = mpsc::channel(mailbox_capacity);
    let handle = ActorHandle {
        pid: pid.clone(),
        mail_tx,
        invoke_tx,
    };
    tokio::spawn(run(pid, processor, routes, mail_rx, invoke_rx));
    handle
}

async fn run(
    pid: Pid,
    mut processor: Box<dyn Processor>,
    mut routes: Routes,
    mut mail_rx: mpsc::Receiver<Mail>,
    mut invoke_rx: mpsc::Receiver<Invoke>,
) {
    processor.start();
    debug!(%pid, "actor started");

    loop {
        tokio::select! {
            mail = mail_rx.recv() => match mail {
                Some(Mail::Deliver(mut ctx)) => dispatch_one(&pid, &mut routes, &mut ctx),
                Some(Mail::Stop) | None => break,
            },
            invoke = invoke_rx.recv() => match invoke {
                Some(f) => f(),
                // All handles dropped; the mail side is gone too.
                None => break,
            },
        }
    }

    processor.destroy();
    debug!(%pid, "actor destroyed");
}

fn dispatch_one(pid: &Pid, routes: &mut Routes, ctx: &mut Context) {
    match ctx.kind {
        ContextKind::Event(event) => match routes.events.get_mut(&event) {
            Some(handler) => {
                handler(ctx);
                ctx.run_defers();
            }
            None => debug!(%pid, ?event, "no event handler"),
        },
        ContextKind::Request => {
            let Routes {
                routes: handlers,
                middleware: steps,
                ..
            } = routes;
            match handlers.get_mut(&ctx.route) {
                Some(handler) => middleware::run_chain(steps, handler, ctx),
                // The scheduler routed here by kind, so a missing handler
                // is a registration bug worth surfacing.
                None => warn!(%pid, route = %ctx.route, "no handler for routed request"),
            }
        }
    }
}
