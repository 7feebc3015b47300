//! # `cache` layer.
//!
//! Memoizes successful results per argument key for `ttl`. The default key is the
//! `serde_json` encoding of the arguments; [`cache_by`] takes a custom key function.
//! Expiry is lazy: a stale entry is dropped by the next call that looks it up.
//! Errors (and aborts) are never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::cancel::Ctx;
use crate::events::EventKind;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable, Telemetry};

/// Computes the cache key for a call; `None` bypasses the cache.
pub type KeyFn<A> = Arc<dyn Fn(&A) -> Option<String> + Send + Sync>;

/// Cache layer.
pub struct Cache<A> {
    ttl: Duration,
    key: KeyFn<A>,
    telemetry: Telemetry,
}

impl<A> Clone for Cache<A> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            key: self.key.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

/// Caches by the JSON encoding of the arguments.
pub fn cache<A: Serialize + 'static>(ttl: Duration) -> Cache<A> {
    Cache {
        ttl,
        key: Arc::new(|args: &A| serde_json::to_string(args).ok()),
        telemetry: Telemetry::default(),
    }
}

/// Caches by a caller-supplied key.
pub fn cache_by<A, F>(ttl: Duration, key: F) -> Cache<A>
where
    A: 'static,
    F: Fn(&A) -> String + Send + Sync + 'static,
{
    Cache {
        ttl,
        key: Arc::new(move |args: &A| Some(key(args))),
        telemetry: Telemetry::default(),
    }
}

impl<A> Cache<A> {
    /// Publishes `CacheHit` under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: crate::Bus) -> Self {
        self.telemetry = Telemetry::new(name, bus);
        self
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Cache<A> {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(CacheHandler {
            next,
            ttl: self.ttl,
            key: self.key.clone(),
            telemetry: self.telemetry.clone(),
            entries: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

struct CacheHandler<A, T> {
    next: HandlerRef<A, T>,
    ttl: Duration,
    key: KeyFn<A>,
    telemetry: Telemetry,
    entries: Arc<Mutex<HashMap<String, (Instant, T)>>>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for CacheHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let Some(key) = (self.key)(&args) else {
            return self.next.call(args, ctx);
        };

        let hit = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
                Some(_) => {
                    entries.remove(&key);
                    None
                }
                None => None,
            }
        };
        if let Some(value) = hit {
            self.telemetry
                .publish(EventKind::CacheHit, |ev| ev.with_reason(key.as_str()));
            return Box::pin(async move { Ok(value) });
        }

        let fut = self.next.call(args, ctx);
        let entries = self.entries.clone();
        Box::pin(async move {
            let res = fut.await;
            if let Ok(value) = &res {
                entries.lock().insert(key, (Instant::now(), value.clone()));
            }
            res
        })
    }
}
