//! # Composition operator.
//!
//! A [`Layer`] turns a handler into a wrapped handler: `(next) -> next'`.
//! [`HandlerExt::with`] applies one; chained calls compose right-to-left, so the
//! **last** `with` wraps outermost:
//!
//! ```text
//! h.with(retry(3)).with(timeout(..))   ==   timeout(retry(h))
//! ```
//!
//! Layers are configuration; per-instance mutable state (cache entries, failure
//! counters, queues) is created inside [`Layer::wrap`], so two handlers wrapped with
//! the same layer value never share it.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::events::{emit, Bus, Event, EventKind};
use crate::handlers::HandlerRef;

/// Values that can cross tasks and be handed to several awaiters.
pub trait Shareable: Clone + Send + Sync + 'static {}

impl<X: Clone + Send + Sync + 'static> Shareable for X {}

/// Handler-to-handler transformation.
pub trait Layer<A, T>: Send + Sync {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T>;
}

/// Layer built from a closure.
pub struct LayerFn<F, A, T> {
    f: F,
    _marker: PhantomData<fn(A) -> T>,
}

/// Wraps a `(next) -> next'` closure as a [`Layer`].
pub fn layer_fn<A, T, F>(f: F) -> LayerFn<F, A, T>
where
    F: Fn(HandlerRef<A, T>) -> HandlerRef<A, T> + Send + Sync,
{
    LayerFn {
        f,
        _marker: PhantomData,
    }
}

impl<A, T, F> Layer<A, T> for LayerFn<F, A, T>
where
    F: Fn(HandlerRef<A, T>) -> HandlerRef<A, T> + Send + Sync,
{
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        (self.f)(next)
    }
}

/// `use`-style composition on handler handles.
pub trait HandlerExt<A, T> {
    /// Wraps `self` in `layer`.
    fn with<L: Layer<A, T>>(self, layer: L) -> HandlerRef<A, T>;
}

impl<A, T> HandlerExt<A, T> for HandlerRef<A, T> {
    fn with<L: Layer<A, T>>(self, layer: L) -> HandlerRef<A, T> {
        layer.wrap(self)
    }
}

/// Optional event sink shared by the built-in layers.
#[derive(Clone, Debug, Default)]
pub(crate) struct Telemetry {
    name: Option<Arc<str>>,
    bus: Option<Bus>,
}

impl Telemetry {
    pub(crate) fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        Self {
            name: Some(name.into()),
            bus: Some(bus),
        }
    }

    pub(crate) fn publish(&self, kind: EventKind, decorate: impl FnOnce(Event) -> Event) {
        emit(self.bus.as_ref(), || {
            let ev = Event::new(kind);
            let ev = match &self.name {
                Some(name) => ev.with_action(name.clone()),
                None => ev,
            };
            decorate(ev)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Ctx;
    use crate::error::ActionError;
    use crate::handlers::{handler, Handler};
    use parking_lot::Mutex;

    fn tagging(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Layer<u32, u32> {
        layer_fn(move |next: HandlerRef<u32, u32>| {
            let log = log.clone();
            handler(move |n: u32, ctx: Ctx| {
                log.lock().push(tag);
                next.call(n, ctx)
            })
        })
    }

    #[tokio::test]
    async fn test_last_with_wraps_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let base = handler(|n: u32, _ctx: Ctx| async move { Ok::<_, ActionError>(n) });

        let h = base
            .with(tagging(log.clone(), "inner"))
            .with(tagging(log.clone(), "outer"));

        assert_eq!(h.call(4, Ctx::default()).await, Ok(4));
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }
}
