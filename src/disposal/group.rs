//! # Disposal group: deferred teardown that survives a move.
//!
//! [`DisposalGroup`] tracks items scheduled for teardown. A scheduled item is torn down
//! after its grace period unless [`cancel_disposal`](DisposalGroup::cancel_disposal)
//! removes it first. Collections that share one group can therefore move an item
//! between them (remove, then insert) without ever disposing it.
//!
//! ```text
//! list A: remove(x) ──► schedule_disposal(x, grace)
//! list B: insert(x) ──► cancel_disposal(x)          ──► x survives
//!
//! list A: remove(y) ──► schedule_disposal(y, grace) ──► grace elapses ──► y.dispose()
//! ```
//!
//! ## Rules
//! - Items are keyed by identity (`Arc` pointer), not by value.
//! - An item is pending in at most one group process-wide; scheduling an item that is
//!   already pending anywhere is a no-op.
//! - A zero grace period defers the teardown to the next scheduler turn instead of a
//!   timer, so a remove-then-insert in the same turn still cancels it.
//! - A group lives on a current-thread runtime and is driven from that runtime's
//!   tasks. On a multi-thread runtime another worker could run a zero-grace teardown
//!   in the middle of the caller's turn, so construction fails there.
//! - [`flush`](DisposalGroup::flush) tears down everything pending immediately.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::{select, task, time};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::events::{emit, Bus, Event, EventKind};

/// Something with a teardown step.
pub trait Disposable: Send + Sync + 'static {
    fn dispose(&self);
}

type ItemKey = usize;

fn key_of<D: ?Sized>(item: &Arc<D>) -> ItemKey {
    Arc::as_ptr(item) as *const () as usize
}

static GROUP_SEQ: AtomicU64 = AtomicU64::new(1);

/// Which group each pending item belongs to.
fn owners() -> &'static Mutex<HashMap<ItemKey, u64>> {
    static OWNERS: OnceLock<Mutex<HashMap<ItemKey, u64>>> = OnceLock::new();
    OWNERS.get_or_init(|| Mutex::new(HashMap::new()))
}

struct Pending {
    item: Arc<dyn Disposable>,
    timer: CancellationToken,
}

struct GroupInner {
    id: u64,
    pending: Mutex<HashMap<ItemKey, Pending>>,
    runtime: Handle,
    name: Option<Arc<str>>,
    bus: Option<Bus>,
}

impl GroupInner {
    fn publish(&self, kind: EventKind, decorate: impl FnOnce(Event) -> Event) {
        emit(self.bus.as_ref(), || {
            let ev = Event::new(kind);
            let ev = match &self.name {
                Some(name) => ev.with_action(name.clone()),
                None => ev,
            };
            decorate(ev)
        });
    }

    /// Removes `key` from the pending set, releasing its process-wide ownership.
    fn take(&self, key: ItemKey) -> Option<Pending> {
        let entry = self.pending.lock().remove(&key)?;
        let mut owners = owners().lock();
        if owners.get(&key) == Some(&self.id) {
            owners.remove(&key);
        }
        Some(entry)
    }

    fn dispose(&self, key: ItemKey) {
        if let Some(entry) = self.take(key) {
            entry.item.dispose();
            tracing::debug!(group = self.id, "item disposed");
            self.publish(EventKind::Disposed, |ev| ev);
        }
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        let mut owners = owners().lock();
        for key in self.pending.get_mut().keys() {
            if owners.get(key) == Some(&self.id) {
                owners.remove(key);
            }
        }
    }
}

/// Shared coordinator of pending teardowns. Cheap to clone.
#[derive(Clone)]
pub struct DisposalGroup {
    inner: Arc<GroupInner>,
}

impl DisposalGroup {
    /// Creates an empty group bound to the current Tokio runtime.
    ///
    /// # Errors
    /// - [`ConfigError::NoRuntime`] outside a runtime.
    /// - [`ConfigError::MultiThreadRuntime`] on anything but a current-thread runtime.
    pub fn new() -> Result<Self, ConfigError> {
        Self::build(None, None)
    }

    /// Like [`new`](Self::new), publishing disposal events under `name`.
    pub fn with_bus(name: impl Into<Arc<str>>, bus: Bus) -> Result<Self, ConfigError> {
        Self::build(Some(name.into()), Some(bus))
    }

    fn build(name: Option<Arc<str>>, bus: Option<Bus>) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        if !matches!(runtime.runtime_flavor(), RuntimeFlavor::CurrentThread) {
            return Err(ConfigError::MultiThreadRuntime);
        }
        Ok(Self {
            inner: Arc::new(GroupInner {
                id: GROUP_SEQ.fetch_add(1, Ordering::Relaxed),
                pending: Mutex::new(HashMap::new()),
                runtime,
                name,
                bus,
            }),
        })
    }

    /// Marks each item for teardown after `grace`.
    ///
    /// Returns how many items were newly scheduled.
    pub fn schedule_disposal<D, I>(&self, items: I, grace: Duration) -> usize
    where
        D: Disposable,
        I: IntoIterator<Item = Arc<D>>,
    {
        let mut scheduled = 0;
        for item in items {
            let key = key_of(&item);
            {
                let mut owners = owners().lock();
                if owners.contains_key(&key) {
                    continue;
                }
                owners.insert(key, self.inner.id);
            }

            let timer = CancellationToken::new();
            self.inner.pending.lock().insert(
                key,
                Pending {
                    item,
                    timer: timer.clone(),
                },
            );
            self.spawn_teardown(key, grace, timer);
            self.inner.publish(EventKind::DisposalScheduled, |ev| ev.with_delay(grace));
            scheduled += 1;
        }
        scheduled
    }

    fn spawn_teardown(&self, key: ItemKey, grace: Duration, timer: CancellationToken) {
        let inner = self.inner.clone();
        self.inner.runtime.spawn(async move {
            if grace.is_zero() {
                task::yield_now().await;
                if timer.is_cancelled() {
                    return;
                }
            } else {
                select! {
                    biased;
                    _ = timer.cancelled() => return,
                    _ = time::sleep(grace) => {}
                }
            }
            inner.dispose(key);
        });
    }

    /// Withdraws pending teardowns of `items`. Items not pending here are ignored.
    ///
    /// Returns how many teardowns were cancelled.
    pub fn cancel_disposal<'a, D, I>(&self, items: I) -> usize
    where
        D: Disposable,
        I: IntoIterator<Item = &'a Arc<D>>,
    {
        let mut cancelled = 0;
        for item in items {
            if let Some(entry) = self.inner.take(key_of(item)) {
                entry.timer.cancel();
                self.inner.publish(EventKind::DisposalCanceled, |ev| ev);
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_pending<D: ?Sized>(&self, item: &Arc<D>) -> bool {
        self.inner.pending.lock().contains_key(&key_of(item))
    }

    /// Tears down everything pending now. Returns how many items were disposed.
    pub fn flush(&self) -> usize {
        let keys: Vec<ItemKey> = self.inner.pending.lock().keys().copied().collect();
        let mut disposed = 0;
        for key in keys {
            if let Some(entry) = self.inner.take(key) {
                entry.timer.cancel();
                entry.item.dispose();
                self.inner.publish(EventKind::Disposed, |ev| ev);
                disposed += 1;
            }
        }
        disposed
    }

    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.lock().is_empty()
    }
}

impl fmt::Debug for DisposalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalGroup")
            .field("id", &self.inner.id)
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    pub(crate) struct Tracked {
        pub(crate) disposed: AtomicU32,
    }

    impl Disposable for Tracked {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Tracked {
        pub(crate) fn count(&self) -> u32 {
            self.disposed.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_after_grace() {
        let group = DisposalGroup::new().unwrap();
        let item = Arc::new(Tracked::default());

        assert_eq!(group.schedule_disposal([item.clone()], Duration::from_millis(100)), 1);
        assert!(group.is_pending(&item));

        time::sleep(Duration::from_millis(99)).await;
        assert_eq!(item.count(), 0);
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(item.count(), 1);
        assert!(!group.is_pending(&item));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_grace_prevents_teardown() {
        let group = DisposalGroup::new().unwrap();
        let item = Arc::new(Tracked::default());

        group.schedule_disposal([item.clone()], Duration::from_millis(100));
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(group.cancel_disposal([&item]), 1);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(item.count(), 0);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_zero_grace_allows_same_turn_cancel() {
        let group = DisposalGroup::new().unwrap();
        let kept = Arc::new(Tracked::default());
        let dropped = Arc::new(Tracked::default());

        group.schedule_disposal([kept.clone(), dropped.clone()], Duration::ZERO);
        group.cancel_disposal([&kept]);
        for _ in 0..5 {
            task::yield_now().await;
        }

        assert_eq!(kept.count(), 0);
        assert_eq!(dropped.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_grace_survives_busy_turn_before_cancel() {
        let group = DisposalGroup::new().unwrap();
        let mut disposed = 0;
        for _ in 0..50 {
            let item = Arc::new(Tracked::default());
            group.schedule_disposal([item.clone()], Duration::ZERO);
            std::thread::sleep(Duration::from_millis(2));
            group.cancel_disposal([&item]);
            task::yield_now().await;
            disposed += item.count();
        }
        assert_eq!(disposed, 0);
        assert!(group.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_multi_thread_runtime_is_rejected() {
        let err = DisposalGroup::new().unwrap_err();
        assert_eq!(err, ConfigError::MultiThreadRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_is_pending_in_one_group_only() {
        let a = DisposalGroup::new().unwrap();
        let b = DisposalGroup::new().unwrap();
        let item = Arc::new(Tracked::default());

        assert_eq!(a.schedule_disposal([item.clone()], Duration::from_secs(1)), 1);
        assert_eq!(a.schedule_disposal([item.clone()], Duration::from_secs(1)), 0);
        assert_eq!(b.schedule_disposal([item.clone()], Duration::from_secs(1)), 0);
        assert!(!b.is_pending(&item));

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(item.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_disposes_everything_now() {
        let group = DisposalGroup::new().unwrap();
        let items: Vec<_> = (0..3).map(|_| Arc::new(Tracked::default())).collect();

        group.schedule_disposal(items.iter().cloned(), Duration::from_secs(60));
        assert_eq!(group.flush(), 3);
        assert!(items.iter().all(|i| i.count() == 1));

        time::sleep(Duration::from_secs(61)).await;
        assert!(items.iter().all(|i| i.count() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_published() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let group = DisposalGroup::with_bus("rows", bus).unwrap();
        let item = Arc::new(Tracked::default());

        group.schedule_disposal([item.clone()], Duration::from_millis(1));
        time::sleep(Duration::from_millis(5)).await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::DisposalScheduled);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Disposed);
        assert_eq!(ev.action.as_deref(), Some("rows"));
    }
}
