//! # Accessor: the engine's only view of the reactive layer.
//!
//! An [`Accessor`] is a getter/setter pair bound to one field of a reactive container,
//! plus a batching hook that coalesces several writes into one notification.
//!
//! - [`StateCell`]   in-memory accessor backed by a `watch` version counter
//! - [`FieldAccessor`] adapter over plain getter/setter closures

use std::fmt;
use std::future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::state::async_state::AsyncState;
use crate::state::request::AccessorKey;

/// Getter/setter pair for one async-state field.
pub trait Accessor<T>: Send + Sync + 'static {
    /// Stable opaque key of this accessor.
    fn key(&self) -> AccessorKey;

    fn get(&self) -> AsyncState<T>;

    fn set(&self, state: AsyncState<T>);

    /// Runs `f`, delivering at most one change notification for the writes inside it.
    fn batch(&self, f: &mut dyn FnMut()) {
        f()
    }

    /// Resolves on the next write. Never resolves if the accessor cannot notify.
    fn changed(&self) -> BoxFuture<'static, ()> {
        future::pending().boxed()
    }
}

/// Shared accessor handle.
pub type AccessorRef<T> = Arc<dyn Accessor<T>>;

struct CellInner<T> {
    state: AsyncState<T>,
    batch_depth: u32,
    dirty: bool,
}

/// In-memory accessor.
///
/// Each notification bumps a version on a `watch` channel; writes inside
/// [`batch`](Accessor::batch) collapse into a single bump when the outermost batch ends.
pub struct StateCell<T> {
    key: AccessorKey,
    inner: Mutex<CellInner<T>>,
    version: watch::Sender<u64>,
}

impl<T> StateCell<T> {
    pub fn new(state: AsyncState<T>) -> Self {
        let (version, _rx) = watch::channel(0);
        Self {
            key: AccessorKey::mint(),
            inner: Mutex::new(CellInner {
                state,
                batch_depth: 0,
                dirty: false,
            }),
            version,
        }
    }

    /// Shorthand for `Arc::new(StateCell::new(state))`.
    pub fn arc(state: AsyncState<T>) -> Arc<Self> {
        Arc::new(Self::new(state))
    }

    /// Receiver observing the notification counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of notifications delivered so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl<T> Accessor<T> for StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn key(&self) -> AccessorKey {
        self.key
    }

    fn get(&self) -> AsyncState<T> {
        self.inner.lock().state.clone()
    }

    fn set(&self, state: AsyncState<T>) {
        let deferred = {
            let mut inner = self.inner.lock();
            inner.state = state;
            if inner.batch_depth > 0 {
                inner.dirty = true;
            }
            inner.batch_depth > 0
        };
        if !deferred {
            self.notify();
        }
    }

    fn batch(&self, f: &mut dyn FnMut()) {
        self.inner.lock().batch_depth += 1;
        f();
        let flush = {
            let mut inner = self.inner.lock();
            inner.batch_depth -= 1;
            let flush = inner.batch_depth == 0 && inner.dirty;
            if flush {
                inner.dirty = false;
            }
            flush
        };
        if flush {
            self.notify();
        }
    }

    fn changed(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.version.subscribe();
        async move {
            let _ = rx.changed().await;
        }
        .boxed()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("key", &self.key)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

/// Accessor over caller-supplied getter and setter closures.
pub struct FieldAccessor<G, S> {
    key: AccessorKey,
    get: G,
    set: S,
}

impl<G, S> FieldAccessor<G, S> {
    pub fn new(get: G, set: S) -> Self {
        Self {
            key: AccessorKey::mint(),
            get,
            set,
        }
    }
}

impl<T, G, S> Accessor<T> for FieldAccessor<G, S>
where
    T: 'static,
    G: Fn() -> AsyncState<T> + Send + Sync + 'static,
    S: Fn(AsyncState<T>) + Send + Sync + 'static,
{
    fn key(&self) -> AccessorKey {
        self.key
    }

    fn get(&self) -> AsyncState<T> {
        (self.get)()
    }

    fn set(&self, state: AsyncState<T>) {
        (self.set)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::async_state::{fresh, Mode};

    #[test]
    fn test_each_write_notifies_outside_batch() {
        let cell = StateCell::new(fresh::<u32>());
        cell.set(AsyncState::pending(Mode::Fresh, None));
        cell.set(AsyncState::success(Mode::Fresh, 1));
        assert_eq!(cell.version(), 2);
        assert_eq!(cell.get().data(), Some(&1));
    }

    #[test]
    fn test_batch_coalesces_notifications() {
        let cell = StateCell::new(fresh::<u32>());
        cell.batch(&mut || {
            cell.set(AsyncState::pending(Mode::Fresh, None));
            cell.batch(&mut || cell.set(AsyncState::success(Mode::Fresh, 2)));
        });
        assert_eq!(cell.version(), 1);
        assert!(cell.get().is_success());
    }

    #[test]
    fn test_field_accessor_forwards_to_closures() {
        let slot = Arc::new(Mutex::new(fresh::<String>()));
        let (g, s) = (slot.clone(), slot.clone());
        let acc = FieldAccessor::new(move || g.lock().clone(), move |v| *s.lock() = v);

        acc.set(AsyncState::success(Mode::Fresh, "x".to_string()));
        assert_eq!(acc.get().data().map(String::as_str), Some("x"));
        assert!(slot.lock().is_success());
    }

    #[tokio::test]
    async fn test_changed_resolves_on_next_write() {
        let cell = Arc::new(StateCell::new(fresh::<u32>()));
        let changed = cell.changed();
        cell.set(AsyncState::success(Mode::Fresh, 1));
        changed.await;
    }
}
