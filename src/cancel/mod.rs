//! Cancellation context and the safe-execution primitive.
//!
//! - [`Ctx`]  per-call context (token + helpers) passed to every handler
//! - [`Safe`] futures that never settle after cancellation, callbacks that no-op

mod ctx;
mod safe;

pub use ctx::Ctx;
pub use safe::Safe;
