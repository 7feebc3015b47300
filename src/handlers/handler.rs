//! # Cancellation-aware function.
//!
//! A [`Handler`] turns arguments and a [`Ctx`] into a boxed future of
//! `Result<T, ActionError>`. It is the unit the action engine dispatches and the unit
//! every middleware layer wraps. The shared handle type is [`HandlerRef`].
//!
//! # Example
//! ```
//! use actionvisor::{ActionError, BoxHandlerFuture, Ctx, Handler};
//!
//! struct Lookup;
//!
//! impl Handler<u32, String> for Lookup {
//!     fn call(&self, id: u32, ctx: Ctx) -> BoxHandlerFuture<String> {
//!         Box::pin(async move {
//!             if ctx.is_cancelled() {
//!                 return Err(ActionError::Canceled);
//!             }
//!             Ok(format!("user-{id}"))
//!         })
//!     }
//! }
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cancel::Ctx;
use crate::error::ActionError;

/// Boxed future returned by [`Handler::call`].
pub type BoxHandlerFuture<T> = BoxFuture<'static, Result<T, ActionError>>;

/// Shared handler handle.
pub type HandlerRef<A, T> = Arc<dyn Handler<A, T>>;

/// # Asynchronous, cancelable function of `A` producing `T`.
///
/// Each call produces a **new** future owning its state. Implementations should check
/// `ctx` or route nested awaits through [`Ctx::safe`].
pub trait Handler<A, T>: Send + Sync + 'static {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T>;
}
