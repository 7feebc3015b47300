//! Asynchronous state model and the accessor interface.
//!
//! ## Contents
//! - [`AsyncState`], [`Mode`], [`Status`], [`Transition`] the frozen state value
//! - [`fresh`], [`stale`] state constructors for new accessors
//! - [`RequestId`], [`AccessorKey`] opaque identities
//! - [`Accessor`], [`StateCell`], [`FieldAccessor`] where the engine writes state
//!
//! Serialization of [`AsyncState`] lives in `snapshot`.

mod accessor;
mod async_state;
mod request;
mod snapshot;

pub use accessor::{Accessor, AccessorRef, FieldAccessor, StateCell};
pub use async_state::{
    fresh, stale, AsyncState, ErrorState, IdleState, Mode, PendingState, Status, SuccessState,
    Transition,
};
pub use request::{AccessorKey, RequestId};
