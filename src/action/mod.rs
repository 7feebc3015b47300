//! Action engine: dispatch state machine, pending registry and derivations.
//!
//! ## Contents
//! - [`Action`], [`Dispatch`], [`LastInvocation`] a handler bound to an accessor
//! - [`ActionConfig`], [`ActionConfigBuilder`] per-action settings
//! - [`PendingRegistry`], [`PendingHandle`] in-flight dispatches by accessor
//! - [`derive`], [`Wait`], [`WaitCx`], [`Derived`] async state computed from other async states

mod config;
mod derive;
mod dispatch;
mod engine;
mod registry;

pub use config::{ActionConfig, ActionConfigBuilder, ErrorCallback};
pub use derive::{derive, Blocked, Derived, Wait, WaitCx};
pub use dispatch::Dispatch;
pub use engine::{Action, LastInvocation};
pub use registry::{InFlight, PendingHandle, PendingRegistry};
