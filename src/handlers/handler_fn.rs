//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(A, Ctx) -> Fut`, producing a fresh future per
//! call. There is no hidden state between calls; share state explicitly through `Arc`.
//!
//! ## Example
//! ```rust
//! use actionvisor::{handler, ActionError, Ctx, HandlerRef};
//!
//! let double: HandlerRef<u32, u32> = handler(|n: u32, _ctx: Ctx| async move {
//!     Ok::<_, ActionError>(n * 2)
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::cancel::Ctx;
use crate::error::ActionError;
use crate::handlers::handler::{BoxHandlerFuture, Handler, HandlerRef};

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it behind an `Arc`.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<A, T, F, Fut> Handler<A, T> for HandlerFn<F>
where
    F: Fn(A, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
{
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        Box::pin((self.f)(args, ctx))
    }
}

/// Builds a [`HandlerRef`] from a closure.
pub fn handler<A, T, F, Fut>(f: F) -> HandlerRef<A, T>
where
    A: 'static,
    T: 'static,
    F: Fn(A, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
{
    HandlerFn::arc(f)
}
