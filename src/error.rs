//! Error types used by actions, handlers and middleware.
//!
//! This module defines two main error enums:
//!
//! - [`ActionError`]: errors raised while running a handler (and what a dispatch rejects with).
//! - [`ConfigError`]: errors raised synchronously while building actions or middleware.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics
//! and additional utilities such as [`ActionError::is_retryable`].

use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by handler execution.
///
/// A dispatch rejects with exactly one of these. `Canceled` always wins over any other
/// outcome: it is never retried, never cached and never written to state.
///
/// Errors are cheap to clone so one settlement can be handed to every awaiter of an
/// in-flight call (pending registry, throttle, debounce).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The owning operation was cancelled (explicit `cancel`, auto-cancel, or reset).
    #[error("action cancelled")]
    Canceled,

    /// Handler failed; may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The `timeout` middleware fired before the wrapped call settled.
    #[error("{message} (after {timeout:?})")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
        /// Caller-supplied message.
        message: String,
    },

    /// The circuit breaker is open; the wrapped handler was not invoked.
    #[error("circuit open; retry in {remaining:?}")]
    CircuitOpen {
        /// Time left until the breaker lets a trial call through.
        remaining: Duration,
    },
}

impl ActionError {
    /// Shorthand for [`ActionError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use actionvisor::ActionError;
    ///
    /// let err = ActionError::fail("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        ActionError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use actionvisor::ActionError;
    /// use std::time::Duration;
    ///
    /// let err = ActionError::CircuitOpen { remaining: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "action_circuit_open");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Canceled => "action_canceled",
            ActionError::Fail { .. } => "action_failed",
            ActionError::Timeout { .. } => "action_timeout",
            ActionError::CircuitOpen { .. } => "action_circuit_open",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ActionError::Canceled => "action cancelled".to_string(),
            ActionError::Fail { error } => format!("error: {error}"),
            ActionError::Timeout { timeout, message } => format!("timeout: {message} ({timeout:?})"),
            ActionError::CircuitOpen { remaining } => format!("circuit open: {remaining:?} left"),
        }
    }

    /// True for [`ActionError::Canceled`].
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, ActionError::Canceled)
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `false` only for [`ActionError::Canceled`]: an abort propagates immediately.
    ///
    /// # Example
    /// ```
    /// use actionvisor::ActionError;
    ///
    /// assert!(ActionError::fail("boom").is_retryable());
    /// assert!(!ActionError::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !self.is_canceled()
    }
}

/// # Errors produced while configuring actions and middleware.
///
/// These are fatal, returned synchronously at setup time and never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An action was built outside of a Tokio runtime.
    #[error("actions must be created inside a tokio runtime")]
    NoRuntime,

    /// A disposal group was built on a runtime that can run its teardowns in parallel
    /// with the caller.
    #[error("disposal groups need a current-thread tokio runtime")]
    MultiThreadRuntime,

    /// Rate limit of zero calls per window.
    #[error("rate limit must allow at least one call per window")]
    InvalidLimit,

    /// Zero-length rate limit window.
    #[error("rate limit window must be non-zero")]
    InvalidWindow,

    /// Circuit breaker that would open before any failure.
    #[error("circuit breaker threshold must be at least 1")]
    InvalidThreshold,

    /// Retry policy with no attempts at all.
    #[error("retry policy needs at least one attempt")]
    InvalidAttempts,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoRuntime => "config_no_runtime",
            ConfigError::MultiThreadRuntime => "config_multi_thread_runtime",
            ConfigError::InvalidLimit => "config_invalid_limit",
            ConfigError::InvalidWindow => "config_invalid_window",
            ConfigError::InvalidThreshold => "config_invalid_threshold",
            ConfigError::InvalidAttempts => "config_invalid_attempts",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancellation_is_not_retryable() {
        assert!(!ActionError::Canceled.is_retryable());
        assert!(ActionError::fail("x").is_retryable());
        assert!(ActionError::Timeout {
            timeout: Duration::from_millis(5),
            message: "slow".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_timeout_is_distinguishable_from_failure() {
        let t = ActionError::Timeout {
            timeout: Duration::from_millis(50),
            message: "too slow".into(),
        };
        assert_eq!(t.as_label(), "action_timeout");
        assert_ne!(t.as_label(), ActionError::fail("too slow").as_label());
        assert!(t.to_string().starts_with("too slow"));
    }
}
