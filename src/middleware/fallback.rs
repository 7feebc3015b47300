//! # `fallback` layer.
//!
//! Replaces a failed result with a substitute value. Cancellation is never masked: a
//! cancelled call still rejects with [`ActionError::Canceled`].

use std::sync::Arc;

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable};

type Recover<T> = Arc<dyn Fn(&ActionError) -> T + Send + Sync>;

/// Fallback layer.
pub struct Fallback<T> {
    recover: Recover<T>,
}

impl<T> Clone for Fallback<T> {
    fn clone(&self) -> Self {
        Self {
            recover: self.recover.clone(),
        }
    }
}

/// On failure, resolves with a clone of `value`.
pub fn fallback<T: Shareable>(value: T) -> Fallback<T> {
    fallback_with(move |_| value.clone())
}

/// On failure, resolves with whatever `recover` computes from the error.
pub fn fallback_with<T, F>(recover: F) -> Fallback<T>
where
    F: Fn(&ActionError) -> T + Send + Sync + 'static,
{
    Fallback {
        recover: Arc::new(recover),
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Fallback<T> {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(FallbackHandler {
            next,
            recover: self.recover.clone(),
        })
    }
}

struct FallbackHandler<A, T> {
    next: HandlerRef<A, T>,
    recover: Recover<T>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for FallbackHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let fut = self.next.call(args, ctx);
        let recover = self.recover.clone();
        Box::pin(async move {
            match fut.await {
                Err(e) if !e.is_canceled() => Ok(recover(&e)),
                other => other,
            }
        })
    }
}
