//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into an
//! action's [`Bus`](crate::Bus). Each subscriber is driven by a dedicated worker loop
//! fed by a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block dispatches
//!   nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are **dropped**.
//! - [`interested`](Subscribe::interested) and [`action`](Subscribe::action) filter
//!   events before they are queued; a filtered-out event costs the subscriber nothing.
//!
//! ## Example
//! ```rust
//! use actionvisor::{Event, EventKind, Subscribe};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!     fn interested(&self, kind: EventKind) -> bool {
//!         kind == EventKind::DispatchFailed
//!     }
//!     fn action(&self) -> Option<&str> { Some("load-user") }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

use crate::events::{Event, EventKind};
use async_trait::async_trait;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event that passed [`accepts`](Subscribe::accepts).
    async fn on_event(&self, event: &Event);

    /// Event kinds this subscriber wants. Defaults to all of them.
    fn interested(&self, _kind: EventKind) -> bool {
        true
    }

    /// Restricts delivery to events published under one action (or layer) name.
    fn action(&self) -> Option<&str> {
        None
    }

    /// Whether `event` should be queued for this subscriber.
    fn accepts(&self, event: &Event) -> bool {
        self.interested(event.kind)
            && self
                .action()
                .map_or(true, |name| event.action.as_deref() == Some(name))
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
