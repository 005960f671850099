//! Processor trait and route registration
//!
//! A `Processor` is the application half of an actor: it declares which
//! routes and lifecycle events it serves during `init`, then handles the
//! contexts the scheduler delivers. Registration happens exactly once,
//! before the actor's dispatch task starts; the tables never change at
//! runtime.

use std::collections::HashMap;

use codec::{EventKind, Route};
use tracing::warn;

use crate::context::Context;
use crate::middleware::{HandlerFn, Middleware, MiddlewareFn};

/// Route and event tables collected from a processor's `init`.
#[derive(Default)]
pub struct Routes {
    pub(crate) routes: HashMap<Route, HandlerFn>,
    pub(crate) events: HashMap<EventKind, HandlerFn>,
    pub(crate) middleware: Vec<MiddlewareFn>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for a request route. Re-registering a route
    /// keeps the last handler.
    pub fn route(
        &mut self,
        route: Route,
        handler: impl FnMut(&mut Context) + Send + 'static,
    ) -> &mut Self {
        if self.routes.insert(route, Box::new(handler)).is_some() {
            warn!(%route, "route handler replaced");
        }
        self
    }

    /// Registers the handler for a connection lifecycle event.
    pub fn event(
        &mut self,
        event: EventKind,
        handler: impl FnMut(&mut Context) + Send + 'static,
    ) -> &mut Self {
        if self.events.insert(event, Box::new(handler)).is_some() {
            warn!(?event, "event handler replaced");
        }
        self
    }

    /// Appends a middleware; requests pass through in registration order.
    pub fn middleware(
        &mut self,
        middleware: impl FnMut(&mut Context, &mut Middleware) + Send + 'static,
    ) -> &mut Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Routes this table serves, for the scheduler's route → kind map.
    pub(crate) fn route_keys(&self) -> Vec<Route> {
        self.routes.keys().copied().collect()
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes")
            .field("routes", &self.routes.len())
            .field("events", &self.events.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Application logic hosted by one actor.
pub trait Processor: Send + 'static {
    /// Actor kind; with the instance id it forms the process-unique PID.
    fn kind(&self) -> &'static str;

    /// Declare served routes, events, and middleware. Called once before
    /// the dispatch task starts.
    fn init(&mut self, routes: &mut Routes);

    /// Called on the dispatch task before the first delivery.
    fn start(&mut self) {}

    /// Called on the dispatch task after the last delivery.
    fn destroy(&mut self) {}
}
