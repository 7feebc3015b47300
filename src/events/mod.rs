//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Action` (dispatch/reset), middleware layers built `with_bus`,
//!   `DisposalGroup`.
//! - **Consumers**: [`SubscriberSet::listen`](crate::SubscriberSet::listen) and tests.

mod bus;
mod event;

pub(crate) use bus::emit;
pub use bus::Bus;
pub use event::{Event, EventKind};
