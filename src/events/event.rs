//! # Lifecycle events emitted by actions, middleware and disposal groups.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Dispatch events**: one dispatch's flow (started, attempt failed, retry, settled)
//! - **State events**: suppressed writes and resets
//! - **Middleware events**: timeouts, circuit transitions, queued calls, cache hits
//! - **Disposal events**: teardown scheduled, cancelled, performed
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use actionvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_action("load-user")
//!     .with_reason("boom")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.action.as_deref(), Some("load-user"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Dispatch events ===
    /// A dispatch wrote `pending` and started its first attempt.
    ///
    /// Sets: `action`, `attempt` (invocation count)
    DispatchStarted,

    /// One attempt failed.
    ///
    /// Sets: `action`, `attempt`, `reason`
    AttemptFailed,

    /// Next attempt scheduled after a failure.
    ///
    /// Sets: `action`, `attempt` (failed attempt), `delay_ms` (absent for wait-based delays), `reason`
    RetryScheduled,

    /// Dispatch settled with a value.
    ///
    /// Sets: `action`
    DispatchSucceeded,

    /// Dispatch settled with an error after exhausting its attempts.
    ///
    /// Sets: `action`, `reason`
    DispatchFailed,

    /// Dispatch was cancelled (explicitly, by auto-cancel, or by reset).
    ///
    /// Sets: `action`
    DispatchCanceled,

    // === State events ===
    /// A settlement was not written: the accessor carries another request identity.
    ///
    /// Sets: `action`, `reason` (`"success"` or `"error"`)
    WriteSuppressed,

    /// Accessor reset to `idle`.
    ///
    /// Sets: `action`
    StateReset,

    // === Middleware events ===
    /// A `timeout` layer fired.
    ///
    /// Sets: `action`, `timeout_ms`
    TimeoutHit,

    /// Circuit breaker opened.
    ///
    /// Sets: `action`, `reason` (last failure)
    CircuitOpened,

    /// Circuit breaker let a trial call through.
    ///
    /// Sets: `action`
    CircuitHalfOpen,

    /// Circuit breaker closed after a successful trial.
    ///
    /// Sets: `action`
    CircuitClosed,

    /// Rate limiter queued a call.
    ///
    /// Sets: `action`
    CallQueued,

    /// Cache returned a stored value.
    ///
    /// Sets: `action`, `reason` (cache key)
    CacheHit,

    // === Disposal events ===
    /// Items marked for teardown.
    ///
    /// Sets: `attempt` (number of items), `delay_ms` (grace period)
    DisposalScheduled,

    /// Pending teardown withdrawn (item re-inserted).
    ///
    /// Sets: `attempt` (number of items)
    DisposalCanceled,

    /// Items torn down.
    ///
    /// Sets: `attempt` (number of items)
    Disposed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the action (or middleware label), if applicable.
    pub action: Option<Arc<str>>,
    /// Attempt number (starting from 1) or item count.
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, keys, etc.).
    pub reason: Option<Arc<str>>,
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            action: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
