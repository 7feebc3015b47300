//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to several subscribers **without
//! awaiting** their processing.
//!
//! - `emit(&Event)` returns immediately.
//! - Events a subscriber does not [`accept`](Subscribe::accepts) never enter its queue.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - No global ordering across subscribers; overflowing queues drop events.
//!
//! ```text
//!   Bus ─► listen() ─► emit(&Event)
//!                        ├──► [queue S1] ─► worker S1 ─► on_event()
//!                        └──► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};

use super::Subscribe;

struct SubscriberChannel {
    sub: Arc<dyn Subscribe>,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker = sub.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = worker.on_event(ev.as_ref());
                    if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                        tracing::error!(subscriber = worker.name(), "subscriber panicked");
                    }
                }
            });

            channels.push(SubscriberChannel { sub, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in self.channels.iter().filter(|c| c.sub.accepts(event)) {
            let name = channel.sub.name();
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = name, "dropped event: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(subscriber = name, "dropped event: worker closed");
                }
            }
        }
    }

    /// Forwards every event published on `bus` until the bus is dropped.
    pub fn listen(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => self.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.kind);
        }
    }

    #[derive(Default)]
    struct FailuresOf(Mutex<Vec<Option<Arc<str>>>>);

    #[async_trait]
    impl Subscribe for FailuresOf {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.action.clone());
        }

        fn interested(&self, kind: EventKind) -> bool {
            kind == EventKind::DispatchFailed
        }

        fn action(&self) -> Option<&str> {
            Some("save")
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber bug");
        }
    }

    #[tokio::test]
    async fn test_fan_out_survives_a_panicking_subscriber() {
        let rec = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Panicker), rec.clone()];
        let set = SubscriberSet::new(subs);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::DispatchStarted));
        set.emit(&Event::new(EventKind::DispatchSucceeded));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock(),
            vec![EventKind::DispatchStarted, EventKind::DispatchSucceeded]
        );
    }

    #[tokio::test]
    async fn test_filters_apply_before_queueing() {
        let failures = Arc::new(FailuresOf::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![failures.clone()];
        let set = SubscriberSet::new(subs);

        set.emit(&Event::new(EventKind::DispatchFailed).with_action("save"));
        set.emit(&Event::new(EventKind::DispatchFailed).with_action("load"));
        set.emit(&Event::new(EventKind::DispatchSucceeded).with_action("save"));
        set.shutdown().await;

        assert_eq!(*failures.0.lock(), vec![Some(Arc::<str>::from("save"))]);
    }
}
