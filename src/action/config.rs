//! # Per-action configuration.
//!
//! [`ActionConfig`] controls how a bound [`Action`](crate::Action) dispatches: its name
//! in events and logs, whether a new dispatch cancels the previous one, the retry loop,
//! the event bus, the error callback and the pending registry it publishes into.
//!
//! # Example
//! ```
//! use actionvisor::{ActionConfig, DelayStrategy, RetryPolicy};
//!
//! let mut cfg = ActionConfig::default();
//! cfg.auto_cancel = false;
//! cfg.retry = RetryPolicy::attempts(3).with_delay(DelayStrategy::Fixed);
//!
//! let same = ActionConfig::builder("load-user")
//!     .auto_cancel(false)
//!     .retry(RetryPolicy::attempts(3).with_delay(DelayStrategy::Fixed))
//!     .build();
//! assert_eq!(same.auto_cancel, cfg.auto_cancel);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::action::registry::PendingRegistry;
use crate::error::ActionError;
use crate::events::Bus;
use crate::policies::RetryPolicy;

/// Called with the terminal error of every failed (not cancelled) dispatch.
pub type ErrorCallback = Arc<dyn Fn(&ActionError) + Send + Sync>;

/// Configuration of one bound action.
#[derive(Clone)]
pub struct ActionConfig {
    /// Name used in events and `tracing` records.
    pub name: Arc<str>,
    /// Cancel the in-flight dispatch when a new one starts.
    pub auto_cancel: bool,
    /// Retry loop around the handler.
    pub retry: RetryPolicy,
    /// Lifecycle event sink.
    pub bus: Option<Bus>,
    /// Terminal error hook.
    pub on_error: Option<ErrorCallback>,
    /// Where in-flight dispatches are published for awaiting.
    pub registry: PendingRegistry,
}

impl Default for ActionConfig {
    /// Provides a default configuration:
    /// - `name = "action"`
    /// - `auto_cancel = true`
    /// - `retry = RetryPolicy::default()` (single attempt)
    /// - no bus, no error callback
    /// - the process-wide [`PendingRegistry::global`]
    fn default() -> Self {
        Self {
            name: Arc::from("action"),
            auto_cancel: true,
            retry: RetryPolicy::default(),
            bus: None,
            on_error: None,
            registry: PendingRegistry::global(),
        }
    }
}

impl ActionConfig {
    /// Starts a builder for an action called `name`.
    pub fn builder(name: impl Into<Arc<str>>) -> ActionConfigBuilder {
        ActionConfigBuilder {
            cfg: ActionConfig {
                name: name.into(),
                ..ActionConfig::default()
            },
        }
    }
}

impl fmt::Debug for ActionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionConfig")
            .field("name", &self.name)
            .field("auto_cancel", &self.auto_cancel)
            .field("retry", &self.retry)
            .field("bus", &self.bus.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Fluent builder for [`ActionConfig`].
#[must_use]
pub struct ActionConfigBuilder {
    cfg: ActionConfig,
}

impl ActionConfigBuilder {
    pub fn auto_cancel(mut self, on: bool) -> Self {
        self.cfg.auto_cancel = on;
        self
    }

    pub fn retry(mut self, policy: impl Into<RetryPolicy>) -> Self {
        self.cfg.retry = policy.into();
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.cfg.bus = Some(bus);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionError) + Send + Sync + 'static,
    {
        self.cfg.on_error = Some(Arc::new(f));
        self
    }

    pub fn registry(mut self, registry: PendingRegistry) -> Self {
        self.cfg.registry = registry;
        self
    }

    pub fn build(self) -> ActionConfig {
        self.cfg
    }
}
