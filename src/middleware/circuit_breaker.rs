//! # `circuit_breaker` layer.
//!
//! ```text
//!            failures >= threshold
//!   Closed ─────────────────────────► Open ──(reset_timeout elapsed, next call)──► HalfOpen
//!     ▲                                 ▲                                            │
//!     │            trial fails          └────────────────────────────────────────────┤
//!     └──────────────────────────── trial succeeds (counter zeroed) ─────────────────┘
//! ```
//!
//! ## Rules
//! - Closed: each success decrements the failure counter, each non-abort failure
//!   increments it.
//! - Open: calls fail with [`ActionError::CircuitOpen`] without invoking the handler.
//! - HalfOpen is entered lazily by the first call after the timeout; exactly one trial
//!   call runs, concurrent calls fail as if open.
//! - Aborted calls never count toward the threshold.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::cancel::Ctx;
use crate::error::{ActionError, ConfigError};
use crate::events::EventKind;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable, Telemetry};

/// Circuit breaker configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitBreakerPolicy {
    /// Failures that open the circuit.
    pub threshold: u32,
    /// Time spent open before a trial call is allowed.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerPolicy {
    /// `threshold = 5`, `reset_timeout = 30s`.
    fn default() -> Self {
        Self {
            threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker layer.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    policy: CircuitBreakerPolicy,
    telemetry: Telemetry,
}

/// Builds a breaker layer; `threshold = 0` is rejected.
pub fn circuit_breaker(policy: CircuitBreakerPolicy) -> Result<CircuitBreaker, ConfigError> {
    if policy.threshold == 0 {
        return Err(ConfigError::InvalidThreshold);
    }
    Ok(CircuitBreaker {
        policy,
        telemetry: Telemetry::default(),
    })
}

impl CircuitBreaker {
    /// Publishes circuit transitions under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: crate::Bus) -> Self {
        self.telemetry = Telemetry::new(name, bus);
        self
    }
}

/// Breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    failures: u32,
    trial_in_flight: bool,
}

impl<A: Shareable, T: Shareable> Layer<A, T> for CircuitBreaker {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(BreakerHandler {
            next,
            policy: self.policy,
            telemetry: self.telemetry.clone(),
            breaker: Arc::new(Mutex::new(Breaker {
                state: CircuitState::Closed,
                failures: 0,
                trial_in_flight: false,
            })),
        })
    }
}

struct BreakerHandler<A, T> {
    next: HandlerRef<A, T>,
    policy: CircuitBreakerPolicy,
    telemetry: Telemetry,
    breaker: Arc<Mutex<Breaker>>,
}

/// Admission ticket; releases a half-open trial slot if the call is dropped unsettled.
struct Admission {
    breaker: Arc<Mutex<Breaker>>,
    trial: bool,
    settled: bool,
}

impl Drop for Admission {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

impl<A, T> BreakerHandler<A, T> {
    fn admit(&self) -> Result<Admission, ActionError> {
        let now = Instant::now();
        let mut b = self.breaker.lock();
        let trial = match b.state {
            CircuitState::Closed => false,
            CircuitState::Open { until } if now < until => {
                return Err(ActionError::CircuitOpen {
                    remaining: until - now,
                });
            }
            CircuitState::Open { .. } | CircuitState::HalfOpen => {
                if b.trial_in_flight {
                    return Err(ActionError::CircuitOpen {
                        remaining: Duration::ZERO,
                    });
                }
                if b.state != CircuitState::HalfOpen {
                    b.state = CircuitState::HalfOpen;
                    self.telemetry.publish(EventKind::CircuitHalfOpen, |ev| ev);
                }
                b.trial_in_flight = true;
                true
            }
        };
        Ok(Admission {
            breaker: self.breaker.clone(),
            trial,
            settled: false,
        })
    }
}

fn settle<T>(
    admission: &mut Admission,
    res: &Result<T, ActionError>,
    policy: CircuitBreakerPolicy,
    telemetry: &Telemetry,
) {
    admission.settled = true;
    let mut b = admission.breaker.lock();
    let reopen = |b: &mut Breaker, err: &ActionError| {
        b.state = CircuitState::Open {
            until: Instant::now() + policy.reset_timeout,
        };
        let reason = err.to_string();
        telemetry.publish(EventKind::CircuitOpened, |ev| ev.with_reason(reason));
    };

    if admission.trial {
        b.trial_in_flight = false;
        match res {
            Ok(_) => {
                b.state = CircuitState::Closed;
                b.failures = 0;
                telemetry.publish(EventKind::CircuitClosed, |ev| ev);
            }
            Err(e) if e.is_canceled() => {}
            Err(e) => reopen(&mut *b, e),
        }
        return;
    }

    match res {
        Ok(_) => b.failures = b.failures.saturating_sub(1),
        Err(e) if e.is_canceled() => {}
        Err(e) => {
            b.failures = b.failures.saturating_add(1);
            if b.failures >= policy.threshold && b.state == CircuitState::Closed {
                reopen(&mut *b, e);
            }
        }
    }
}

impl<A: Shareable, T: Shareable> Handler<A, T> for BreakerHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let mut admission = match self.admit() {
            Ok(a) => a,
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let fut = self.next.call(args, ctx);
        let policy = self.policy;
        let telemetry = self.telemetry.clone();

        Box::pin(async move {
            let res = fut.await;
            settle(&mut admission, &res, policy, &telemetry);
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::handler;
    use crate::middleware::HandlerExt;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn switchable(
        calls: Arc<AtomicU32>,
        healthy: Arc<AtomicBool>,
        threshold: u32,
    ) -> HandlerRef<(), &'static str> {
        let policy = CircuitBreakerPolicy {
            threshold,
            reset_timeout: Duration::from_secs(10),
        };
        handler(move |_: (), _ctx: Ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            let ok = healthy.load(Ordering::SeqCst);
            async move {
                if ok {
                    Ok("ok")
                } else {
                    Err(ActionError::fail("down"))
                }
            }
        })
        .with(circuit_breaker(policy).unwrap())
    }

    #[test]
    fn test_zero_threshold_is_a_config_error() {
        let policy = CircuitBreakerPolicy {
            threshold: 0,
            ..Default::default()
        };
        assert_eq!(circuit_breaker(policy).unwrap_err(), ConfigError::InvalidThreshold);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_open_half_open_closed() {
        let calls = Arc::new(AtomicU32::new(0));
        let healthy = Arc::new(AtomicBool::new(false));
        let h = switchable(calls.clone(), healthy.clone(), 3);

        for _ in 0..3 {
            assert_eq!(h.call((), Ctx::default()).await, Err(ActionError::fail("down")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let fourth = h.call((), Ctx::default()).await;
        assert!(matches!(fourth, Err(ActionError::CircuitOpen { .. })), "{fourth:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 3, "handler not invoked while open");

        tokio::time::advance(Duration::from_secs(10)).await;
        healthy.store(true, Ordering::SeqCst);
        assert_eq!(h.call((), Ctx::default()).await, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        healthy.store(false, Ordering::SeqCst);
        assert_eq!(h.call((), Ctx::default()).await, Err(ActionError::fail("down")));
        assert_eq!(h.call((), Ctx::default()).await, Err(ActionError::fail("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 6, "closed again with a zeroed counter");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let calls = Arc::new(AtomicU32::new(0));
        let healthy = Arc::new(AtomicBool::new(false));
        let h = switchable(calls.clone(), healthy, 1);

        let _ = h.call((), Ctx::default()).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(h.call((), Ctx::default()).await, Err(ActionError::fail("down")));
        assert!(matches!(
            h.call((), Ctx::default()).await,
            Err(ActionError::CircuitOpen { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborts_do_not_count() {
        let h = handler(|_: (), _ctx: Ctx| async { Err::<u32, _>(ActionError::Canceled) })
            .with(circuit_breaker(CircuitBreakerPolicy { threshold: 1, ..Default::default() }).unwrap());
        for _ in 0..5 {
            assert_eq!(h.call((), Ctx::default()).await, Err(ActionError::Canceled));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_separately_wrapped_handlers_do_not_share_counters() {
        let layer = circuit_breaker(CircuitBreakerPolicy { threshold: 1, ..Default::default() }).unwrap();
        let failing = handler(|_: (), _ctx: Ctx| async { Err::<u32, _>(ActionError::fail("x")) });
        let a = failing.clone().with(layer.clone());
        let b = failing.with(layer);

        let _ = a.call((), Ctx::default()).await;
        assert!(matches!(a.call((), Ctx::default()).await, Err(ActionError::CircuitOpen { .. })));
        assert_eq!(b.call((), Ctx::default()).await, Err(ActionError::fail("x")));
    }
}
