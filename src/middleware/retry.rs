//! # `retry` layer.
//!
//! Re-invokes the wrapped handler on failure, up to `attempts` total invocations,
//! pausing per [`DelayStrategy`](crate::DelayStrategy) in between. An abort is never
//! retried and interrupts a pending delay immediately.
//!
//! ```rust
//! use actionvisor::{handler, middleware::retry, ActionError, Ctx, DelayStrategy, HandlerExt, RetryPolicy};
//!
//! let h = handler(|_: (), _ctx: Ctx| async { Err::<u32, _>(ActionError::fail("down")) });
//! let three = h.clone().with(retry(3));
//! let linear = h.clone().with(retry(DelayStrategy::Linear));
//! let custom = h.with(retry(RetryPolicy::attempts(5).with_delay(DelayStrategy::Immediate)));
//! ```

use std::sync::Arc;

use crate::cancel::Ctx;
use crate::events::EventKind;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable, Telemetry};
use crate::policies::retry::run_attempts;
use crate::policies::RetryPolicy;

/// Retry layer configuration.
#[derive(Clone, Debug)]
pub struct Retry {
    policy: RetryPolicy,
    telemetry: Telemetry,
}

/// Retry with a count, a strategy (3 attempts), or a full [`RetryPolicy`].
pub fn retry(policy: impl Into<RetryPolicy>) -> Retry {
    Retry {
        policy: policy.into(),
        telemetry: Telemetry::default(),
    }
}

impl Retry {
    /// Publishes `AttemptFailed` / `RetryScheduled` under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: crate::Bus) -> Self {
        self.telemetry = Telemetry::new(name, bus);
        self
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Retry {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(RetryHandler {
            next,
            policy: self.policy.clone(),
            telemetry: self.telemetry.clone(),
        })
    }
}

struct RetryHandler<A, T> {
    next: HandlerRef<A, T>,
    policy: RetryPolicy,
    telemetry: Telemetry,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for RetryHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let next = self.next.clone();
        let policy = self.policy.clone();
        let telemetry = self.telemetry.clone();

        Box::pin(async move {
            let mut on_retry = |n: u32, err: &crate::ActionError, delay| {
                let reason = err.to_string();
                telemetry.publish(EventKind::RetryScheduled, |ev| {
                    let ev = ev.with_attempt(n).with_reason(reason);
                    match delay {
                        Some(d) => ev.with_delay(d),
                        None => ev,
                    }
                });
            };
            run_attempts(
                &policy,
                ctx.token(),
                |_| next.call(args.clone(), ctx.clone()),
                &mut on_retry,
            )
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::handlers::handler;
    use crate::middleware::HandlerExt;
    use crate::policies::DelayStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn always_failing(calls: Arc<AtomicU32>) -> HandlerRef<(), u32> {
        handler(move |_: (), _ctx: Ctx| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(ActionError::fail(format!("boom #{n}"))) }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_three_invokes_three_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = always_failing(calls.clone()).with(retry(3));

        let res = h.call((), Ctx::default()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res, Err(ActionError::fail("boom #3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategy_form_defaults_to_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = always_failing(calls.clone()).with(retry(DelayStrategy::Immediate));
        let _ = h.call((), Ctx::default()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let ctx = Ctx::default();
        let token = ctx.token().clone();
        let h = handler(move |_: (), _ctx: Ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            token.cancel();
            async { Err::<u32, _>(ActionError::fail("aborted mid-flight")) }
        })
        .with(retry(5));

        assert_eq!(h.call((), ctx).await, Err(ActionError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_strategy_awaits_the_returned_future() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let rx = Arc::new(rx);
        let policy = RetryPolicy::attempts(2).with_delay(DelayStrategy::wait(move |_, _| {
            let mut rx = (*rx).clone();
            Box::pin(async move {
                let _ = rx.wait_for(|online| *online).await;
            })
        }));

        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let h = handler(move |_: (), _ctx: Ctx| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ActionError::fail("offline"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .with(retry(policy));

        let run = tokio::spawn(async move { h.call((), Ctx::default()).await });
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "still waiting for the network");

        tx.send_replace(true);
        assert_eq!(run.await.expect("join"), Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
