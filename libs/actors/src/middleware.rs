//! Middleware chain
//!
//! Requests pass through middleware in registration order before the
//! route handler runs. Each middleware is handed a cursor and must call
//! `next` (or `skip`) to keep the chain moving; returning without
//! advancing halts the chain, and `cancel` halts it explicitly.

use tracing::debug;

use crate::context::Context;

pub type MiddlewareFn = Box<dyn FnMut(&mut Context, &mut Middleware) + Send>;
pub type HandlerFn = Box<dyn FnMut(&mut Context) + Send>;

/// Cursor over the middleware chain, advanced explicitly.
pub struct Middleware {
    cursor: usize,
    canceled: bool,
}

impl Middleware {
    pub(crate) fn new() -> Self {
        Self {
            cursor: 0,
            canceled: false,
        }
    }

    /// Advances to the next middleware (or the route handler).
    pub fn next(&mut self) {
        self.cursor += 1;
    }

    /// Jumps over the following `n` middleware.
    pub fn skip(&mut self, n: usize) {
        self.cursor += n + 1;
    }

    /// Halts the chain; the route handler does not run.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}

/// Drives `ctx` through the chain and into `handler`. The chain stops
/// early when a middleware cancels or fails to advance the cursor.
pub(crate) fn run_chain(
    steps: &mut [MiddlewareFn],
    handler: &mut HandlerFn,
    ctx: &mut Context,
) {
    let mut cursor = Middleware::new();
    loop {
        if cursor.canceled {
            debug!(route = %ctx.route, "middleware canceled the chain");
            break;
        }
        let at = cursor.cursor;
        match steps.get_mut(at) {
            Some(step) => {
                step(ctx, &mut cursor);
                if cursor.cursor == at {
                    // Did not advance: the middleware took ownership of
                    // the request's fate.
                    break;
                }
            }
            None => {
                handler(ctx);
                break;
            }
        }
    }
    ctx.run_defers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use codec::Route;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx() -> Context {
        Context::request(Route::Deliver, 1, 2, 3, Bytes::new())
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let trace = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut steps: Vec<MiddlewareFn> = Vec::new();
        for tag in 0..3 {
            let trace = trace.clone();
            steps.push(Box::new(move |_ctx, mw| {
                trace.lock().unwrap().push(tag);
                mw.next();
            }));
        }
        let trace_h = trace.clone();
        let mut handler: HandlerFn = Box::new(move |_ctx| trace_h.lock().unwrap().push(99));

        run_chain(&mut steps, &mut handler, &mut ctx());
        assert_eq!(*trace.lock().unwrap(), vec![0, 1, 2, 99]);
    }

    #[test]
    fn skip_jumps_over_middleware() {
        let trace = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut steps: Vec<MiddlewareFn> = Vec::new();
        let t = trace.clone();
        steps.push(Box::new(move |_ctx, mw| {
            t.lock().unwrap().push(0);
            mw.skip(1);
        }));
        let t = trace.clone();
        steps.push(Box::new(move |_ctx, mw| {
            t.lock().unwrap().push(1);
            mw.next();
        }));
        let t = trace.clone();
        steps.push(Box::new(move |_ctx, mw| {
            t.lock().unwrap().push(2);
            mw.next();
        }));
        let t = trace.clone();
        let mut handler: HandlerFn = Box::new(move |_ctx| t.lock().unwrap().push(99));

        run_chain(&mut steps, &mut handler, &mut ctx());
        assert_eq!(*trace.lock().unwrap(), vec![0, 2, 99]);
    }

    #[test]
    fn cancel_stops_before_the_handler() {
        let handled = Arc::new(AtomicUsize::new(0));
        let mut steps: Vec<MiddlewareFn> = vec![Box::new(|_ctx, mw| mw.cancel())];
        let counter = handled.clone();
        let mut handler: HandlerFn = Box::new(move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        run_chain(&mut steps, &mut handler, &mut ctx());
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stalled_cursor_halts_the_chain() {
        let handled = Arc::new(AtomicUsize::new(0));
        let mut steps: Vec<MiddlewareFn> = vec![Box::new(|_ctx, _mw| {})];
        let counter = handled.clone();
        let mut handler: HandlerFn = Box::new(move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        run_chain(&mut steps, &mut handler, &mut ctx());
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }
}
