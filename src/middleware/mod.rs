//! # Handler middleware.
//!
//! Composable wrappers around a [`HandlerRef`](crate::HandlerRef). Each constructor
//! returns a [`Layer`]; apply it with [`HandlerExt::with`]. The last `with` wraps
//! outermost.
//!
//! | Layer | Effect |
//! |---|---|
//! | [`retry`] | re-invokes on failure per [`RetryPolicy`](crate::RetryPolicy) |
//! | [`circuit_breaker`] | fails fast after consecutive failures |
//! | [`rate_limit`] | at most N starts per sliding window, excess is queued |
//! | [`cache`] / [`cache_by`] | memoizes successes per argument key for a TTL |
//! | [`timeout`] | fails with a distinct error after a deadline |
//! | [`debounce`] | runs once per burst with the latest waiting caller's arguments |
//! | [`throttle`] | starts at most once per window |
//! | [`fallback`] / [`fallback_with`] | substitutes a value on failure |
//! | [`observe`] / [`catch_error`] | side-effect hooks |
//! | [`logging`] | `tracing` records per call |
//!
//! Built-in layers are cancellation-aware: an abort of the caller's [`Ctx`](crate::Ctx)
//! is propagated, never retried, cached or recorded as a failure.

mod cache;
mod circuit_breaker;
mod debounce;
mod fallback;
mod layer;
mod logging;
mod observe;
mod rate_limit;
mod retry;
mod throttle;
mod timeout;

pub use cache::{cache, cache_by, Cache};
pub use circuit_breaker::{circuit_breaker, CircuitBreaker, CircuitBreakerPolicy};
pub use debounce::{debounce, Debounce};
pub use fallback::{fallback, fallback_with, Fallback};
pub use layer::{layer_fn, HandlerExt, Layer, LayerFn, Shareable};
pub use logging::{logging, Logging};
pub use observe::{catch_error, observe, CatchError, Observe};
pub use rate_limit::{rate_limit, RateLimit};
pub use retry::{retry, Retry};
pub use throttle::{throttle, Throttle};
pub use timeout::{timeout, Timeout};
