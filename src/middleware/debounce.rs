//! # `debounce` layer.
//!
//! Defers execution until `quiet` has passed without another call. Calls made during
//! the burst are collapsed: the handler runs once, with the arguments of the latest
//! caller still waiting, and every waiting caller receives that single result.
//!
//! The burst timer and the call run on a task owned by the layer, not by any caller:
//! - a cancelled or dropped caller only withdraws itself (it rejects with
//!   [`ActionError::Canceled`]); the rest of the burst still runs;
//! - if every caller withdraws before the timer fires, the handler is not called;
//! - if every caller withdraws while the call runs, its context is cancelled.
//!
//! ```text
//! call(1) ─┐
//! call(2) ─┼── quiet ──► next(3) ──► Ok(v) to all waiters
//! call(3) ─┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable};

/// Debounce layer.
#[derive(Clone, Copy, Debug)]
pub struct Debounce {
    quiet: Duration,
}

pub fn debounce(quiet: Duration) -> Debounce {
    Debounce { quiet }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Debounce {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(DebounceHandler {
            next,
            quiet: self.quiet,
            burst: Arc::new(Mutex::new(Burst {
                generation: 0,
                waiters: Vec::new(),
            })),
        })
    }
}

struct Waiter<A, T> {
    args: A,
    tx: oneshot::Sender<Result<T, ActionError>>,
}

struct Burst<A, T> {
    generation: u64,
    waiters: Vec<Waiter<A, T>>,
}

struct DebounceHandler<A, T> {
    next: HandlerRef<A, T>,
    quiet: Duration,
    burst: Arc<Mutex<Burst<A, T>>>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for DebounceHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let next = self.next.clone();
        let burst = self.burst.clone();
        let quiet = self.quiet;

        // Joins the burst on first poll; a future dropped unpolled never counts.
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            {
                let mut b = burst.lock();
                b.generation += 1;
                b.waiters.push(Waiter { args, tx });
                tokio::spawn(fire(next, burst.clone(), b.generation, quiet));
            }

            select! {
                biased;
                _ = ctx.cancelled() => Err(ActionError::Canceled),
                r = rx => r.unwrap_or(Err(ActionError::Canceled)),
            }
        })
    }
}

/// Timer of one call: runs the burst if no later call arrived during `quiet`.
async fn fire<A: Shareable, T: Shareable>(
    next: HandlerRef<A, T>,
    burst: Arc<Mutex<Burst<A, T>>>,
    generation: u64,
    quiet: Duration,
) {
    time::sleep(quiet).await;

    let mut waiters = {
        let mut b = burst.lock();
        if b.generation != generation {
            return;
        }
        std::mem::take(&mut b.waiters)
    };
    waiters.retain(|w| !w.tx.is_closed());
    let Some(args) = waiters.last().map(|w| w.args.clone()) else {
        tracing::debug!("debounced burst abandoned by every caller");
        return;
    };
    let mut txs: Vec<_> = waiters.into_iter().map(|w| w.tx).collect();

    let token = CancellationToken::new();
    let res = {
        let all_gone = future::join_all(txs.iter_mut().map(|tx| tx.closed()));
        select! {
            biased;
            r = next.call(args, Ctx::new(token.clone())) => r,
            _ = all_gone => {
                token.cancel();
                Err(ActionError::Canceled)
            }
        }
    };

    for tx in txs {
        let _ = tx.send(res.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionConfig};
    use crate::handlers::handler;
    use crate::middleware::HandlerExt;
    use crate::state::{fresh, Accessor, AccessorRef, StateCell};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counted(calls: &Arc<AtomicU32>) -> HandlerRef<u32, u32> {
        let c = calls.clone();
        handler(move |n: u32, _ctx: Ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ActionError>(n * 10) }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_last_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let h = handler(move |q: &'static str, _ctx: Ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ActionError>(q.len()) }
        })
        .with(debounce(Duration::from_millis(300)));

        let a = tokio::spawn({
            let h = h.clone();
            async move { h.call("r", Ctx::default()).await }
        });
        time::sleep(Duration::from_millis(100)).await;
        let b = tokio::spawn({
            let h = h.clone();
            async move { h.call("ru", Ctx::default()).await }
        });
        time::sleep(Duration::from_millis(100)).await;
        let c = h.call("rust", Ctx::default()).await;

        assert_eq!(c, Ok(4));
        assert_eq!(a.await.unwrap(), Ok(4));
        assert_eq!(b.await.unwrap(), Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = counted(&calls).with(debounce(Duration::from_millis(50)));

        assert_eq!(h.call(1, Ctx::default()).await, Ok(10));
        assert_eq!(h.call(2, Ctx::default()).await, Ok(20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_last_caller_leaves_burst_to_the_others() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = counted(&calls).with(debounce(Duration::from_millis(50)));

        let first = tokio::spawn({
            let h = h.clone();
            async move { h.call(1, Ctx::default()).await }
        });
        time::sleep(Duration::from_millis(10)).await;

        let last_ctx = Ctx::default();
        let last = tokio::spawn({
            let (h, ctx) = (h.clone(), last_ctx.clone());
            async move { h.call(2, ctx).await }
        });
        time::sleep(Duration::from_millis(10)).await;
        last_ctx.token().cancel();

        assert_eq!(last.await.unwrap(), Err(ActionError::Canceled));
        let first = time::timeout(Duration::from_secs(5), first).await;
        assert_eq!(first.expect("burst must settle").unwrap(), Ok(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_last_caller_does_not_strand_earlier_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = counted(&calls).with(debounce(Duration::from_millis(50)));

        let first = tokio::spawn({
            let h = h.clone();
            async move { h.call(1, Ctx::default()).await }
        });
        time::sleep(Duration::from_millis(10)).await;
        let last = tokio::spawn({
            let h = h.clone();
            async move { h.call(2, Ctx::default()).await }
        });
        time::sleep(Duration::from_millis(10)).await;
        last.abort();

        let first = time::timeout(Duration::from_secs(5), first).await;
        assert_eq!(first.expect("burst must settle").unwrap(), Ok(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_abandoned_by_everyone_never_calls_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = counted(&calls).with(debounce(Duration::from_millis(50)));

        let ctx = Ctx::default();
        let only = tokio::spawn({
            let (h, ctx) = (h.clone(), ctx.clone());
            async move { h.call(1, ctx).await }
        });
        time::sleep(Duration::from_millis(10)).await;
        ctx.token().cancel();

        assert_eq!(only.await.unwrap(), Err(ActionError::Canceled));
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_latest_dispatch_settles_the_other_action() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = counted(&calls).with(debounce(Duration::from_millis(50)));

        let x = StateCell::arc(fresh::<u32>());
        let y = StateCell::arc(fresh::<u32>());
        let (xa, ya): (AccessorRef<u32>, AccessorRef<u32>) = (x.clone(), y.clone());
        let ax = Action::new(xa, h.clone(), ActionConfig::default()).unwrap();
        let ay = Action::new(ya, h, ActionConfig::default()).unwrap();

        let dx = ax.dispatch(1);
        time::sleep(Duration::from_millis(10)).await;
        let dy = ay.dispatch(2);
        time::sleep(Duration::from_millis(10)).await;
        ay.cancel();

        assert_eq!(dy.await, Err(ActionError::Canceled));
        let dx = time::timeout(Duration::from_secs(5), dx).await;
        assert_eq!(dx.expect("dispatch must settle"), Ok(10));
        assert_eq!(x.get().data(), Some(&10));
    }
}
