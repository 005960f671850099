//! Per-process actor scheduler
//!
//! Owns the live actor map, the route → kind table built from spawn-time
//! registrations, and the uid → actor bindings that pin a user's requests
//! to one actor per kind. Dispatch fans events out to every actor and
//! routes requests through `route → kind → uid binding → actor`.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::actor::{self, ActorHandle, Pid};
use crate::context::{Context, ContextKind};
use crate::error::{ActorError, Result};
use crate::processor::{Processor, Routes};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Bounded mailbox depth per actor.
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
        }
    }
}

pub struct Scheduler {
    actors: DashMap<Pid, ActorHandle>,
    route_kinds: DashMap<codec::Route, String>,
    /// uid → kind → actor id. At most one actor per uid and kind.
    bindings: DashMap<u64, HashMap<String, u64>>,
    config: ActorConfig,
}

impl Scheduler {
    pub fn new(config: ActorConfig) -> Self {
        Self {
            actors: DashMap::new(),
            route_kinds: DashMap::new(),
            bindings: DashMap::new(),
            config,
        }
    }

    /// Spawns an actor for `processor` under instance id `id`. Fails on a
    /// duplicate PID or when the processor claims a route another kind
    /// already serves.
    pub fn spawn(&self, id: u64, mut processor: Box<dyn Processor>) -> Result<Pid> {
        let pid = Pid::new(processor.kind(), id);
        if self.actors.contains_key(&pid) {
            return Err(ActorError::duplicate_pid(pid.kind, pid.id));
        }

        // No shard guard is held here, so init may call back into the
        // scheduler.
        let mut routes = Routes::new();
        processor.init(&mut routes);

        let claimed = self.claim_routes(&pid.kind, routes.route_keys())?;

        let handle = actor::spawn(pid.clone(), processor, routes, self.config.mailbox_capacity);
        match self.actors.entry(pid.clone()) {
            Entry::Occupied(_) => {
                // Lost a race for the PID. Dropping the only handle closes
                // the mailbox; the fresh task drains and destroys itself.
                self.release_routes(&pid.kind, &claimed);
                drop(handle);
                Err(ActorError::duplicate_pid(pid.kind, pid.id))
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
                info!(%pid, "actor spawned");
                Ok(pid)
            }
        }
    }

    /// Registers `kind` for every route, returning the routes newly claimed
    /// by this call. A conflict rolls those claims back so a failed spawn
    /// leaves the table untouched.
    fn claim_routes(&self, kind: &str, route_keys: Vec<codec::Route>) -> Result<Vec<codec::Route>> {
        let mut claimed = Vec::new();
        for route in route_keys {
            match self.route_kinds.entry(route) {
                Entry::Occupied(existing) if existing.get() != kind => {
                    let conflict = ActorError::RouteConflict {
                        route,
                        existing: existing.get().clone(),
                        requested: kind.to_string(),
                    };
                    drop(existing);
                    self.release_routes(kind, &claimed);
                    return Err(conflict);
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(vacant) => {
                    vacant.insert(kind.to_string());
                    claimed.push(route);
                }
            }
        }
        Ok(claimed)
    }

    fn release_routes(&self, kind: &str, claimed: &[codec::Route]) {
        for route in claimed {
            self.route_kinds.remove_if(route, |_, owner| owner == kind);
        }
    }

    /// Removes the actor from the live map first, so no new mail lands,
    /// then delivers Stop and sweeps its uid bindings.
    pub async fn kill(&self, kind: &str, id: u64) -> Result<()> {
        let pid = Pid::new(kind, id);
        let (_, handle) = self
            .actors
            .remove(&pid)
            .ok_or_else(|| ActorError::not_found(kind, id))?;

        self.bindings.retain(|_, kinds| {
            if kinds.get(kind) == Some(&id) {
                kinds.remove(kind);
            }
            !kinds.is_empty()
        });

        handle.stop().await;
        info!(%pid, "actor killed");
        Ok(())
    }

    /// Binds `uid` to the actor `kind/id`. Last bind wins.
    pub fn bind_actor(&self, uid: u64, kind: &str, id: u64) -> Result<()> {
        let pid = Pid::new(kind, id);
        if !self.actors.contains_key(&pid) {
            return Err(ActorError::not_found(kind, id));
        }
        let mut kinds = self.bindings.entry(uid).or_default();
        if let Some(previous) = kinds.insert(kind.to_string(), id) {
            if previous != id {
                debug!(uid, kind, previous, id, "rebinding user to a different actor");
            }
        }
        Ok(())
    }

    pub fn unbind_actor(&self, uid: u64, kind: &str) {
        // The guard must drop before remove_if re-locks the shard.
        let emptied = match self.bindings.get_mut(&uid) {
            Some(mut kinds) => {
                kinds.remove(kind);
                kinds.is_empty()
            }
            None => false,
        };
        if emptied {
            self.bindings.remove_if(&uid, |_, kinds| kinds.is_empty());
        }
    }

    /// Actor id bound to `uid` for `kind`, if any.
    pub fn bound(&self, uid: u64, kind: &str) -> Option<u64> {
        self.bindings
            .get(&uid)
            .and_then(|kinds| kinds.get(kind).copied())
    }

    /// Delivers a context: events broadcast to every actor, requests go
    /// to the single actor bound for the route's kind and the context's
    /// uid.
    pub async fn dispatch(&self, ctx: Context) -> Result<()> {
        match ctx.kind {
            ContextKind::Event(_) => {
                // Snapshot the handles; delivering while holding map refs
                // would block spawns for the duration.
                let handles: Vec<ActorHandle> =
                    self.actors.iter().map(|entry| entry.value().clone()).collect();
                for handle in handles {
                    if let Err(err) = handle.deliver(ctx.fanout_copy()).await {
                        warn!(pid = %handle.pid(), error = %err, "event delivery failed");
                    }
                }
                Ok(())
            }
            ContextKind::Request => {
                let kind = self
                    .route_kinds
                    .get(&ctx.route)
                    .map(|entry| entry.value().clone())
                    .ok_or(ActorError::UnhandledRoute { route: ctx.route })?;
                let id = self
                    .bound(ctx.uid, &kind)
                    .ok_or_else(|| ActorError::not_bound(ctx.uid, kind.clone()))?;
                let handle = self
                    .actors
                    .get(&Pid::new(kind.clone(), id))
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| ActorError::not_found(kind, id))?;
                handle.deliver(ctx).await
            }
        }
    }

    /// Runs a closure on the target actor's dispatch task.
    pub async fn invoke(
        &self,
        kind: &str,
        id: u64,
        f: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        let handle = self
            .actors
            .get(&Pid::new(kind, id))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ActorError::not_found(kind, id))?;
        handle.invoke(Box::new(f)).await
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Stops every actor. Used on process shutdown.
    pub async fn shutdown(&self) {
        let pids: Vec<Pid> = self.actors.iter().map(|entry| entry.key().clone()).collect();
        for pid in pids {
            let _ = self.kill(&pid.kind, pid.id).await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(ActorConfig::default())
    }
}
