//! # Pending-future registry.
//!
//! Maps an [`AccessorKey`] to the in-flight dispatch writing that accessor, so code
//! that finds the accessor `pending` can await the exact computation instead of
//! invoking the handler again.
//!
//! ## Rules
//! - At most one entry per accessor: a newer dispatch replaces the older entry.
//! - An entry is evicted when its dispatch settles or is cancelled, and only if it
//!   still belongs to that dispatch's [`RequestId`].
//! - [`PendingHandle`] is untyped (derivations wait on it); [`PendingRegistry::get`]
//!   returns the typed shared result.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::handlers::BoxHandlerFuture;
use crate::middleware::Shareable;
use crate::state::{AccessorKey, RequestId};

/// Shared in-flight result of one dispatch.
pub type InFlight<T> = Shared<BoxHandlerFuture<T>>;

/// Resolves when the registered dispatch settles, whatever its outcome.
#[derive(Clone)]
pub struct PendingHandle {
    settled: Shared<BoxFuture<'static, ()>>,
}

impl PendingHandle {
    pub(crate) fn new(fut: BoxFuture<'static, ()>) -> Self {
        Self {
            settled: fut.shared(),
        }
    }
}

impl Future for PendingHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.settled.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle").finish_non_exhaustive()
    }
}

struct Entry {
    request: RequestId,
    handle: PendingHandle,
    typed: Box<dyn Any + Send + Sync>,
}

/// Registry of in-flight dispatches, keyed by accessor. Cheap to clone.
#[derive(Clone, Default)]
pub struct PendingRegistry {
    entries: Arc<Mutex<HashMap<AccessorKey, Entry>>>,
}

static GLOBAL: OnceLock<PendingRegistry> = OnceLock::new();

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by default.
    pub fn global() -> PendingRegistry {
        GLOBAL.get_or_init(PendingRegistry::new).clone()
    }

    pub(crate) fn insert<T: Shareable>(&self, key: AccessorKey, request: RequestId, fut: InFlight<T>) {
        let handle = PendingHandle::new(fut.clone().map(|_| ()).boxed());
        self.entries.lock().insert(
            key,
            Entry {
                request,
                handle,
                typed: Box::new(fut),
            },
        );
    }

    /// The typed in-flight result for `key`, if any and if it produces `T`.
    pub fn get<T: Shareable>(&self, key: AccessorKey) -> Option<InFlight<T>> {
        self.entries
            .lock()
            .get(&key)
            .and_then(|e| e.typed.downcast_ref::<InFlight<T>>())
            .cloned()
    }

    /// Untyped settlement handle for `key`.
    pub fn pending(&self, key: AccessorKey) -> Option<PendingHandle> {
        self.entries.lock().get(&key).map(|e| e.handle.clone())
    }

    pub fn contains(&self, key: AccessorKey) -> bool {
        self.entries.lock().contains_key(&key)
    }

    /// Removes the entry for `key` if it still belongs to `request`.
    pub(crate) fn evict(&self, key: AccessorKey, request: RequestId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(e) if e.request == request => {
                entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for PendingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRegistry")
            .field("len", &self.len())
            .finish()
    }
}
