//! Dispatch context
//!
//! One `Context` travels with each piece of work delivered to an actor:
//! either a connection lifecycle event or a routed request. It carries a
//! version counter and a defer stack. Deferred cleanups are recorded
//! under the version current at registration; `next`, `task`, and
//! `cancel` each bump the version, so cleanups staged before a control
//! transfer are discarded instead of running against stale state.

use bytes::Bytes;
use codec::{EventKind, Route};

type DeferFn = Box<dyn FnOnce() + Send>;

/// What kind of work this context carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Connection lifecycle event, broadcast to every actor.
    Event(EventKind),
    /// Routed request for one bound actor.
    Request,
}

pub struct Context {
    pub kind: ContextKind,
    /// Originating gate instance id.
    pub gid: String,
    /// Target node instance id.
    pub nid: String,
    /// Connection id at the gate.
    pub cid: u64,
    /// Bound user id, 0 when anonymous.
    pub uid: u64,
    /// Request sequence, 0 for fire-and-forget.
    pub seq: u64,
    pub route: Route,
    pub payload: Bytes,
    version: u64,
    defers: Vec<(u64, DeferFn)>,
}

impl Context {
    pub fn event(event: EventKind, cid: u64, uid: u64) -> Self {
        Self {
            kind: ContextKind::Event(event),
            gid: String::new(),
            nid: String::new(),
            cid,
            uid,
            seq: 0,
            route: Route::Trigger,
            payload: Bytes::new(),
            version: 0,
            defers: Vec::new(),
        }
    }

    pub fn request(route: Route, cid: u64, uid: u64, seq: u64, payload: Bytes) -> Self {
        Self {
            kind: ContextKind::Request,
            gid: String::new(),
            nid: String::new(),
            cid,
            uid,
            seq,
            route,
            payload,
            version: 0,
            defers: Vec::new(),
        }
    }

    pub fn with_origin(mut self, gid: impl Into<String>, nid: impl Into<String>) -> Self {
        self.gid = gid.into();
        self.nid = nid.into();
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Yields control forward. Defers staged before this point no longer
    /// run.
    pub fn next(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Marks a hand-off to background work, invalidating staged defers.
    pub fn task(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Abandons the in-flight work, invalidating staged defers.
    pub fn cancel(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Stages a cleanup to run when the current dispatch completes,
    /// unless the version moves on first.
    pub fn defer(&mut self, cleanup: impl FnOnce() + Send + 'static) {
        self.defers.push((self.version, Box::new(cleanup)));
    }

    /// Runs staged cleanups in reverse order. Entries recorded under an
    /// older version are dropped unexecuted.
    pub(crate) fn run_defers(&mut self) {
        while let Some((staged_at, cleanup)) = self.defers.pop() {
            if staged_at == self.version {
                cleanup();
            }
        }
    }

    /// Fresh context with the same event metadata, for fan-out to
    /// multiple actors. Defers and version do not travel.
    pub(crate) fn fanout_copy(&self) -> Self {
        Self {
            kind: self.kind,
            gid: self.gid.clone(),
            nid: self.nid.clone(),
            cid: self.cid,
            uid: self.uid,
            seq: self.seq,
            route: self.route,
            payload: self.payload.clone(),
            version: 0,
            defers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("cid", &self.cid)
            .field("uid", &self.uid)
            .field("seq", &self.seq)
            .field("route", &self.route)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn defers_run_in_reverse_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut ctx = Context::request(Route::Deliver, 1, 2, 3, Bytes::new());
        for tag in 0..3 {
            let order = order.clone();
            ctx.defer(move || order.lock().unwrap().push(tag));
        }
        ctx.run_defers();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn stale_defers_are_discarded() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut ctx = Context::request(Route::Deliver, 1, 2, 3, Bytes::new());

        let counter = ran.clone();
        ctx.defer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ctx.next();
        let counter = ran.clone();
        ctx.defer(move || {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        ctx.run_defers();
        // Only the post-bump defer executes.
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn cancel_discards_everything_staged() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut ctx = Context::event(EventKind::Disconnect, 1, 2);
        let counter = ran.clone();
        ctx.defer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ctx.cancel();
        ctx.run_defers();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
