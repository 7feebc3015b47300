//! # `rate_limit` layer.
//!
//! Sliding window of call start times. Calls under `limit` within `window` start
//! immediately; the rest wait in arrival order and are released as the window vacates
//! slots. A queued call whose context is cancelled is withdrawn and rejects with
//! [`ActionError::Canceled`].
//!
//! ```text
//! call ─► prune(window) ─► slots free & queue empty? ─yes─► run
//!                                   │ no
//!                                   ▼
//!                           [queue] ◄── drainer: sleep until oldest + window, grant FIFO
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};

use crate::cancel::Ctx;
use crate::error::{ActionError, ConfigError};
use crate::events::EventKind;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable, Telemetry};

/// Rate limit layer.
#[derive(Clone, Debug)]
pub struct RateLimit {
    limit: usize,
    window: Duration,
    telemetry: Telemetry,
}

/// At most `limit` call starts per sliding `window`.
pub fn rate_limit(limit: usize, window: Duration) -> Result<RateLimit, ConfigError> {
    if limit == 0 {
        return Err(ConfigError::InvalidLimit);
    }
    if window.is_zero() {
        return Err(ConfigError::InvalidWindow);
    }
    Ok(RateLimit {
        limit,
        window,
        telemetry: Telemetry::default(),
    })
}

impl RateLimit {
    /// Publishes `CallQueued` under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: crate::Bus) -> Self {
        self.telemetry = Telemetry::new(name, bus);
        self
    }
}

#[derive(Debug)]
struct Window {
    limit: usize,
    span: Duration,
    starts: VecDeque<Instant>,
    queue: VecDeque<oneshot::Sender<()>>,
    draining: bool,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.starts.front() {
            if now.duration_since(*front) >= self.span {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Grants queued waiters while slots are free; returns when to look again.
    fn release(&mut self, now: Instant) -> Option<Instant> {
        self.prune(now);
        while self.starts.len() < self.limit {
            match self.queue.pop_front() {
                Some(waiter) => {
                    if waiter.send(()).is_ok() {
                        self.starts.push_back(now);
                    }
                }
                None => break,
            }
        }
        self.queue.retain(|w| !w.is_closed());
        if self.queue.is_empty() {
            self.draining = false;
            return None;
        }
        self.starts.front().map(|oldest| *oldest + self.span)
    }
}

async fn drain(window: Arc<Mutex<Window>>) {
    loop {
        let wake = window.lock().release(Instant::now());
        match wake {
            Some(at) => time::sleep_until(at).await,
            None => return,
        }
    }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for RateLimit {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(RateLimitHandler {
            next,
            telemetry: self.telemetry.clone(),
            window: Arc::new(Mutex::new(Window {
                limit: self.limit,
                span: self.window,
                starts: VecDeque::new(),
                queue: VecDeque::new(),
                draining: false,
            })),
        })
    }
}

struct RateLimitHandler<A, T> {
    next: HandlerRef<A, T>,
    telemetry: Telemetry,
    window: Arc<Mutex<Window>>,
}

impl<A, T> RateLimitHandler<A, T> {
    /// Takes a slot now, or enqueues and returns the grant receiver.
    fn acquire(&self) -> Option<oneshot::Receiver<()>> {
        let now = Instant::now();
        let mut w = self.window.lock();
        w.prune(now);
        w.queue.retain(|tx| !tx.is_closed());

        if w.queue.is_empty() && w.starts.len() < w.limit {
            w.starts.push_back(now);
            return None;
        }

        let (tx, rx) = oneshot::channel();
        w.queue.push_back(tx);
        if !w.draining {
            w.draining = true;
            tokio::spawn(drain(self.window.clone()));
        }
        Some(rx)
    }
}

impl<A: Shareable, T: Shareable> Handler<A, T> for RateLimitHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let queued = self.acquire();
        if queued.is_some() {
            self.telemetry.publish(EventKind::CallQueued, |ev| ev);
        }
        let next = self.next.clone();

        Box::pin(async move {
            if let Some(grant) = queued {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(ActionError::Canceled),
                    granted = grant => {
                        if granted.is_err() {
                            return Err(ActionError::Canceled);
                        }
                    }
                }
            }
            next.call(args, ctx).await
        })
    }
}
