//! # `timeout` layer.
//!
//! Races the wrapped call against a timer. The call runs on a child context; when the
//! timer wins the child is cancelled and the caller gets [`ActionError::Timeout`],
//! distinguishable from whatever the wrapped call itself fails with. Cancelling the
//! outer context drops the timer and rejects with [`ActionError::Canceled`].

use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::events::EventKind;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable, Telemetry};

/// Timeout layer.
#[derive(Clone, Debug)]
pub struct Timeout {
    after: Duration,
    message: Arc<str>,
    telemetry: Telemetry,
}

/// Fails with `message` if the wrapped call has not settled after `after`.
pub fn timeout(after: Duration, message: impl Into<Arc<str>>) -> Timeout {
    Timeout {
        after,
        message: message.into(),
        telemetry: Telemetry::default(),
    }
}

impl Timeout {
    /// Publishes `TimeoutHit` under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: crate::Bus) -> Self {
        self.telemetry = Telemetry::new(name, bus);
        self
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Timeout {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(TimeoutHandler {
            next,
            cfg: self.clone(),
        })
    }
}

struct TimeoutHandler<A, T> {
    next: HandlerRef<A, T>,
    cfg: Timeout,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for TimeoutHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let child = ctx.child();
        let fut = self.next.call(args, child.clone());
        let cfg = self.cfg.clone();

        Box::pin(async move {
            select! {
                biased;
                _ = ctx.cancelled() => Err(ActionError::Canceled),
                res = fut => res,
                _ = time::sleep(cfg.after) => {
                    child.token().cancel();
                    cfg.telemetry.publish(EventKind::TimeoutHit, |ev| ev.with_timeout(cfg.after));
                    Err(ActionError::Timeout {
                        timeout: cfg.after,
                        message: cfg.message.to_string(),
                    })
                }
            }
        })
    }
}
