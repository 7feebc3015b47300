//! Retry policies.
//!
//! This module groups the knobs that control **how many times** a handler is invoked
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]   total attempts + delay strategy
//! - [`DelayStrategy`] backoff / linear / fixed / fibonacci / immediate / custom
//! - [`BackoffPolicy`] exponential delays (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! ActionConfig { retry: RetryPolicy, .. }   ─► Action::dispatch retry loop
//! middleware::retry(RetryPolicy)            ─► wrapped handler retry loop
//!      └─► both drive policies::retry::run_attempts
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 1 attempt (no retries).
//! - `DelayStrategy::default()` → `Backoff`, `min(1000·2^n, 30000)` ms.

mod backoff;
mod delay;
mod jitter;
pub(crate) mod retry;

pub use backoff::BackoffPolicy;
pub use delay::{DelayFn, DelayStrategy, Pause, WaitFn};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
