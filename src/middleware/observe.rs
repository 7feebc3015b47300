//! # Observation layers: `observe` and `catch_error`.
//!
//! Side-effect hooks that never alter the result. `observe` runs before each call;
//! `catch_error` runs after a failed call and re-raises the error. Cancellation is not
//! reported to `catch_error`.

use std::sync::Arc;

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable};

type OnStart<A> = Arc<dyn Fn(&A) + Send + Sync>;
type OnError<A> = Arc<dyn Fn(&A, &ActionError) + Send + Sync>;

/// Layer calling a hook with the arguments of every call.
pub struct Observe<A> {
    on_start: OnStart<A>,
}

pub fn observe<A, F>(on_start: F) -> Observe<A>
where
    F: Fn(&A) + Send + Sync + 'static,
{
    Observe {
        on_start: Arc::new(on_start),
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Observe<A> {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        let on_start = self.on_start.clone();
        Arc::new(ObserveHandler { next, on_start })
    }
}

struct ObserveHandler<A, T> {
    next: HandlerRef<A, T>,
    on_start: OnStart<A>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for ObserveHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        (self.on_start)(&args);
        self.next.call(args, ctx)
    }
}

/// Layer reporting failures without handling them.
pub struct CatchError<A> {
    on_error: OnError<A>,
}

pub fn catch_error<A, F>(on_error: F) -> CatchError<A>
where
    F: Fn(&A, &ActionError) + Send + Sync + 'static,
{
    CatchError {
        on_error: Arc::new(on_error),
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for CatchError<A> {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        let on_error = self.on_error.clone();
        Arc::new(CatchErrorHandler { next, on_error })
    }
}

struct CatchErrorHandler<A, T> {
    next: HandlerRef<A, T>,
    on_error: OnError<A>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for CatchErrorHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let fut = self.next.call(args.clone(), ctx);
        let on_error = self.on_error.clone();
        Box::pin(async move {
            let res = fut.await;
            if let Err(e) = &res {
                if !e.is_canceled() {
                    on_error(&args, e);
                }
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::handler;
    use crate::middleware::HandlerExt;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_observe_sees_arguments_before_the_call() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let h = handler(|n: u32, _ctx: Ctx| async move { Ok::<_, ActionError>(n) })
            .with(observe(move |n: &u32| s.lock().push(*n)));

        h.call(7, Ctx::default()).await.unwrap();
        h.call(8, Ctx::default()).await.unwrap();
        assert_eq!(*seen.lock(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_catch_error_reports_and_reraises() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let h = handler(|n: u32, _ctx: Ctx| async move {
            match n {
                0 => Err(ActionError::Canceled),
                1 => Err(ActionError::fail("odd")),
                n => Ok(n),
            }
        })
        .with(catch_error(move |n: &u32, e: &ActionError| {
            s.lock().push((*n, e.as_label()))
        }));

        assert_eq!(h.call(1, Ctx::default()).await, Err(ActionError::fail("odd")));
        assert_eq!(h.call(0, Ctx::default()).await, Err(ActionError::Canceled));
        assert_eq!(h.call(2, Ctx::default()).await, Ok(2));
        assert_eq!(*seen.lock(), vec![(1, "action_failed")]);
    }
}
