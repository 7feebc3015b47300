//! # `throttle` layer.
//!
//! Starts the wrapped call at most once per `window`. A call inside the window does not
//! invoke the handler; it shares the in-flight call, or receives the last result.
//!
//! The shared call runs on a context owned by the layer. A caller that is cancelled
//! only stops waiting; the call itself is cancelled once every sharer has gone before
//! it settled, and the next caller then starts a fresh one even inside the window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable};

/// Throttle layer.
#[derive(Clone, Copy, Debug)]
pub struct Throttle {
    window: Duration,
}

pub fn throttle(window: Duration) -> Throttle {
    Throttle { window }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Throttle {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(ThrottleHandler {
            next,
            window: self.window,
            last: Arc::new(Mutex::new(None)),
        })
    }
}

type Slot<T> = Arc<Mutex<Option<Window<T>>>>;

#[derive(Clone)]
struct Window<T> {
    started: Instant,
    call: Shared<BoxHandlerFuture<T>>,
    token: CancellationToken,
    sharers: Arc<AtomicUsize>,
}

/// One caller's stake in a window's call.
struct Sharer<T: Shareable> {
    slot: Slot<T>,
    window: Window<T>,
}

impl<T: Shareable> Drop for Sharer<T> {
    fn drop(&mut self) {
        // Under the slot lock so a joining caller never sees a half-abandoned call.
        let _slot = self.slot.lock();
        let last = self.window.sharers.fetch_sub(1, Ordering::AcqRel) == 1;
        if last && self.window.call.peek().is_none() {
            self.window.token.cancel();
        }
    }
}

struct ThrottleHandler<A, T> {
    next: HandlerRef<A, T>,
    window: Duration,
    last: Slot<T>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for ThrottleHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let now = Instant::now();
        let window = {
            let mut last = self.last.lock();
            let reusable = last.as_ref().filter(|w| {
                now.duration_since(w.started) < self.window && !w.token.is_cancelled()
            });
            let window = match reusable {
                Some(w) => w.clone(),
                None => {
                    let token = CancellationToken::new();
                    let w = Window {
                        started: now,
                        call: self.next.call(args, Ctx::new(token.clone())).shared(),
                        token,
                        sharers: Arc::new(AtomicUsize::new(0)),
                    };
                    *last = Some(w.clone());
                    w
                }
            };
            window.sharers.fetch_add(1, Ordering::AcqRel);
            window
        };
        let sharer = Sharer {
            slot: self.last.clone(),
            window,
        };

        Box::pin(async move {
            let call = sharer.window.call.clone();
            let res = select! {
                biased;
                _ = ctx.cancelled() => Err(ActionError::Canceled),
                r = call => r,
            };
            drop(sharer);
            res
        })
    }
}
