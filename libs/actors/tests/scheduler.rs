//! Scheduler behavior tests: spawn/kill, bindings, and dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{ActorError, Context, Processor, Routes, Scheduler};
use bytes::Bytes;
use codec::{EventKind, Route};

/// Records every payload its route handler sees.
struct Recorder {
    kind: &'static str,
    route: Route,
    seen: Arc<Mutex<Vec<Bytes>>>,
    events: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

impl Processor for Recorder {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn init(&mut self, routes: &mut Routes) {
        let seen = self.seen.clone();
        routes.route(self.route, move |ctx| {
            seen.lock().unwrap().push(ctx.payload.clone());
        });
        let events = self.events.clone();
        routes.event(EventKind::Disconnect, move |_ctx| {
            events.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn destroy(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn recorder_on(
    kind: &'static str,
    route: Route,
) -> (Recorder, Arc<Mutex<Vec<Bytes>>>, Arc<AtomicUsize>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(AtomicUsize::new(0));
    let processor = Recorder {
        kind,
        route,
        seen: seen.clone(),
        events: events.clone(),
        destroyed: Arc::new(AtomicUsize::new(0)),
    };
    (processor, seen, events)
}

fn recorder(kind: &'static str) -> (Recorder, Arc<Mutex<Vec<Bytes>>>, Arc<AtomicUsize>) {
    recorder_on(kind, Route::Deliver)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn duplicate_pid_is_rejected() {
    let scheduler = Scheduler::default();
    let (a, _, _) = recorder("room");
    let (b, _, _) = recorder("room");
    scheduler.spawn(1, Box::new(a)).unwrap();
    let err = scheduler.spawn(1, Box::new(b)).unwrap_err();
    assert!(matches!(err, ActorError::DuplicatePid { .. }));
    assert_eq!(scheduler.actor_count(), 1);
}

#[tokio::test]
async fn request_requires_a_binding() {
    let scheduler = Scheduler::default();
    let (processor, seen, _) = recorder("room");
    scheduler.spawn(1, Box::new(processor)).unwrap();

    let ctx = Context::request(Route::Deliver, 10, 42, 1, Bytes::from_static(b"hello"));
    let err = scheduler.dispatch(ctx).await.unwrap_err();
    assert!(matches!(err, ActorError::NotBound { uid: 42, .. }));

    scheduler.bind_actor(42, "room", 1).unwrap();
    let ctx = Context::request(Route::Deliver, 10, 42, 2, Bytes::from_static(b"hello"));
    scheduler.dispatch(ctx).await.unwrap();
    settle().await;
    assert_eq!(seen.lock().unwrap().as_slice(), &[Bytes::from_static(b"hello")]);
}

#[tokio::test]
async fn last_bind_wins() {
    let scheduler = Scheduler::default();
    let (a, seen_a, _) = recorder("room");
    let (b, seen_b, _) = recorder("room");
    scheduler.spawn(1, Box::new(a)).unwrap();
    scheduler.spawn(2, Box::new(b)).unwrap();

    scheduler.bind_actor(42, "room", 1).unwrap();
    scheduler.bind_actor(42, "room", 2).unwrap();
    assert_eq!(scheduler.bound(42, "room"), Some(2));

    let ctx = Context::request(Route::Deliver, 10, 42, 1, Bytes::from_static(b"m"));
    scheduler.dispatch(ctx).await.unwrap();
    settle().await;
    assert!(seen_a.lock().unwrap().is_empty());
    assert_eq!(seen_b.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn binding_requires_a_live_actor() {
    let scheduler = Scheduler::default();
    let err = scheduler.bind_actor(42, "room", 9).unwrap_err();
    assert!(matches!(err, ActorError::NotFound { .. }));
}

#[tokio::test]
async fn unbind_then_dispatch_fails_fast() {
    let scheduler = Scheduler::default();
    let (processor, _, _) = recorder("room");
    scheduler.spawn(1, Box::new(processor)).unwrap();
    scheduler.bind_actor(42, "room", 1).unwrap();
    scheduler.unbind_actor(42, "room");

    let ctx = Context::request(Route::Deliver, 10, 42, 1, Bytes::new());
    let err = scheduler.dispatch(ctx).await.unwrap_err();
    assert!(matches!(err, ActorError::NotBound { .. }));
}

#[tokio::test]
async fn events_broadcast_to_every_actor() {
    let scheduler = Scheduler::default();
    let (a, _, events_a) = recorder("room");
    let (b, _, events_b) = recorder_on("lobby", Route::Push);
    scheduler.spawn(1, Box::new(a)).unwrap();
    scheduler.spawn(1, Box::new(b)).unwrap();

    let ctx = Context::event(EventKind::Disconnect, 10, 42);
    scheduler.dispatch(ctx).await.unwrap();
    settle().await;
    assert_eq!(events_a.load(Ordering::SeqCst), 1);
    assert_eq!(events_b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn kill_sweeps_bindings_and_destroys() {
    let scheduler = Scheduler::default();
    let destroyed = Arc::new(AtomicUsize::new(0));
    let processor = Recorder {
        kind: "room",
        route: Route::Deliver,
        seen: Arc::new(Mutex::new(Vec::new())),
        events: Arc::new(AtomicUsize::new(0)),
        destroyed: destroyed.clone(),
    };
    scheduler.spawn(1, Box::new(processor)).unwrap();
    scheduler.bind_actor(42, "room", 1).unwrap();

    scheduler.kill("room", 1).await.unwrap();
    settle().await;
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.bound(42, "room"), None);
    assert_eq!(scheduler.actor_count(), 0);

    let err = scheduler.kill("room", 1).await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound { .. }));
}

#[tokio::test]
async fn route_conflict_across_kinds_is_rejected() {
    let scheduler = Scheduler::default();
    let (a, _, _) = recorder("room");
    let (b, _, _) = recorder("lobby");
    scheduler.spawn(1, Box::new(a)).unwrap();
    let err = scheduler.spawn(1, Box::new(b)).unwrap_err();
    assert!(matches!(err, ActorError::RouteConflict { .. }));
}

/// Registers one handler per route in `routes`.
struct MultiRoute {
    kind: &'static str,
    routes: Vec<Route>,
}

impl Processor for MultiRoute {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn init(&mut self, routes: &mut Routes) {
        for route in &self.routes {
            routes.route(*route, |_ctx| {});
        }
    }
}

#[tokio::test]
async fn failed_spawn_releases_its_route_claims() {
    let scheduler = Scheduler::default();
    let (a, _, _) = recorder("room");
    scheduler.spawn(1, Box::new(a)).unwrap();

    // Deliver conflicts with "room"; Push is fresh and must not stay
    // claimed by the failed spawn.
    let err = scheduler
        .spawn(
            1,
            Box::new(MultiRoute {
                kind: "lobby",
                routes: vec![Route::Push, Route::Deliver],
            }),
        )
        .unwrap_err();
    assert!(matches!(err, ActorError::RouteConflict { .. }));
    assert_eq!(scheduler.actor_count(), 1);

    let (b, _, _) = recorder_on("desk", Route::Push);
    scheduler.spawn(1, Box::new(b)).unwrap();
}

/// Reads the scheduler from inside its own `init`.
struct Introspector {
    scheduler: Arc<Scheduler>,
    observed: Arc<AtomicUsize>,
}

impl Processor for Introspector {
    fn kind(&self) -> &'static str {
        "auditor"
    }

    fn init(&mut self, _routes: &mut Routes) {
        self.observed
            .store(self.scheduler.actor_count(), Ordering::SeqCst);
    }
}

#[tokio::test]
async fn init_may_call_back_into_the_scheduler() {
    let scheduler = Arc::new(Scheduler::default());
    let (a, _, _) = recorder("room");
    scheduler.spawn(1, Box::new(a)).unwrap();

    let observed = Arc::new(AtomicUsize::new(usize::MAX));
    let processor = Introspector {
        scheduler: scheduler.clone(),
        observed: observed.clone(),
    };
    scheduler.spawn(1, Box::new(processor)).unwrap();
    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.actor_count(), 2);
}

#[tokio::test]
async fn mailbox_preserves_fifo_order() {
    let scheduler = Scheduler::default();
    let (processor, seen, _) = recorder("room");
    scheduler.spawn(1, Box::new(processor)).unwrap();
    scheduler.bind_actor(42, "room", 1).unwrap();

    for i in 0..100u8 {
        let ctx = Context::request(Route::Deliver, 10, 42, i as u64 + 1, Bytes::from(vec![i]));
        scheduler.dispatch(ctx).await.unwrap();
    }
    settle().await;
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 100);
    for (i, payload) in seen.iter().enumerate() {
        assert_eq!(payload.as_ref(), &[i as u8]);
    }
}

#[tokio::test]
async fn invoke_runs_on_the_actor_task() {
    let scheduler = Scheduler::default();
    let (processor, _, _) = recorder("room");
    scheduler.spawn(1, Box::new(processor)).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    scheduler
        .invoke("room", 1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}
