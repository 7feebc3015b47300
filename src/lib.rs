//! # actionvisor
//!
//! **Actionvisor** turns fallible, cancellable async work into observable state.
//!
//! An [`Action`] binds a handler to one async-state field (an [`Accessor`]). Each
//! dispatch writes `pending`, runs the handler (retried per policy), and writes
//! `success` or `error`, unless a newer request has taken the field over, in which
//! case the write is dropped and only the caller sees the result.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   handler(|args, ctx| async { .. })
//!        │
//!        │ .with(retry(3)).with(timeout(..)).with(cache(..))   middleware
//!        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Action (per accessor)                                           │
//! │  - auto-cancel previous dispatch (CancellationToken)             │
//! │  - RequestId per dispatch / reset                                │
//! │  - retry loop (RetryPolicy)                                      │
//! │  - PendingRegistry (in-flight result per accessor)               │
//! └──────┬──────────────────────────────┬────────────────────────────┘
//!        │ get / set / batch            │ publish
//!        ▼                              ▼
//! ┌──────────────┐               ┌──────────────┐
//! │   Accessor   │               │     Bus      │──► SubscriberSet ──► LogWriter, ..
//! │ AsyncState<T>│               └──────────────┘
//! └──────┬───────┘
//!        │ wait()
//!        ▼
//!   derive(target, registry, compute)
//! ```
//!
//! ### Dispatch lifecycle
//! ```text
//! dispatch(args)
//!   ├─► cancel previous (auto_cancel)
//!   ├─► mint token + RequestId, set(pending, data retained in stale mode)
//!   ├─► run_attempts(handler)          each attempt raced against the token
//!   │       ├─ cancelled ──► reject Canceled, no write
//!   │       ├─ Ok(v)     ──► set(success) if RequestId still current
//!   │       └─ Err(e)    ──► set(error)   if RequestId still current, on_error(e)
//!   └─► caller's Dispatch settles with the result either way
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **State**         | Idle/pending/success/error crossed with fresh/stale modes.   | [`AsyncState`], [`fresh`], [`stale`]        |
//! | **Actions**       | Dispatch / refresh / cancel / reset per accessor.            | [`Action`], [`Dispatch`], [`ActionConfig`]  |
//! | **Handlers**      | Cancellation-aware async functions.                          | [`Handler`], [`handler`], [`Ctx`], [`Safe`] |
//! | **Middleware**    | Retry, circuit breaker, rate limit, cache, timeout, ...      | [`middleware`], [`HandlerExt`]              |
//! | **Derivations**   | Async state computed from other async states.                | [`derive`], [`Wait`]                        |
//! | **Disposal**      | Deferred teardown that survives moves between collections.   | [`DisposalGroup`], [`DisposalList`]         |
//! | **Events**        | Lifecycle events and subscribers.                            | [`Bus`], [`Event`], [`Subscribe`]           |
//! | **Errors**        | Typed errors for execution and configuration.                | [`ActionError`], [`ConfigError`]            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use actionvisor::middleware::{retry, timeout};
//! use actionvisor::{
//!     fresh, handler, Accessor, AccessorRef, Action, ActionConfig, ActionError, Ctx, DelayStrategy,
//!     HandlerExt, StateCell,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user = StateCell::arc(fresh::<String>());
//!     let accessor: AccessorRef<String> = user.clone();
//!
//!     let load = handler(|id: u32, ctx: Ctx| async move {
//!         ctx.safe(tokio::time::sleep(Duration::from_millis(10))).await;
//!         Ok::<_, ActionError>(format!("user #{id}"))
//!     })
//!     .with(retry(DelayStrategy::Immediate))
//!     .with(timeout(Duration::from_secs(1), "user lookup timed out"));
//!
//!     let action = Action::new(accessor, load, ActionConfig::builder("load-user").build())?;
//!     let name = action.dispatch(7).await?;
//!
//!     assert_eq!(name, "user #7");
//!     assert!(user.get().is_success());
//!     Ok(())
//! }
//! ```

mod action;
mod cancel;
mod disposal;
mod error;
mod events;
mod handlers;
mod policies;
mod state;
mod subscribers;

pub mod middleware;

// ---- Public re-exports ----

pub use action::{
    derive, Action, ActionConfig, ActionConfigBuilder, Blocked, Derived, Dispatch, ErrorCallback,
    InFlight, LastInvocation, PendingHandle, PendingRegistry, Wait, WaitCx,
};
pub use cancel::{Ctx, Safe};
pub use disposal::{Disposable, DisposalGroup, DisposalList};
pub use error::{ActionError, ConfigError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{handler, BoxHandlerFuture, Handler, HandlerFn, HandlerRef};
pub use middleware::{HandlerExt, Layer};
pub use policies::{
    BackoffPolicy, DelayFn, DelayStrategy, JitterPolicy, Pause, RetryPolicy, WaitFn,
};
pub use state::{
    fresh, stale, Accessor, AccessorKey, AccessorRef, AsyncState, ErrorState, FieldAccessor,
    IdleState, Mode, PendingState, RequestId, StateCell, Status, SuccessState, Transition,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
