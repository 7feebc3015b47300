//! # Handler abstractions.
//!
//! - [`Handler`] trait for cancellation-aware async functions
//! - [`HandlerFn`] / [`handler`] closure-backed implementation
//! - [`HandlerRef`] shared handle (`Arc<dyn Handler<A, T>>`)

mod handler;
mod handler_fn;

pub use handler::{BoxHandlerFuture, Handler, HandlerRef};
pub use handler_fn::{handler, HandlerFn};
