//! # Delay strategies between retry attempts.
//!
//! | Strategy      | Delay before retry `n` (0-indexed)          |
//! |---------------|---------------------------------------------|
//! | `Backoff`     | [`BackoffPolicy::next`] (default: `min(1000·2^n, 30000)` ms) |
//! | `Linear`      | `min(1000·(n+1), 30000)` ms                 |
//! | `Fixed`       | `1000` ms                                   |
//! | `Fibonacci`   | `1000·fib(n+1)` ms, capped at 30s           |
//! | `Immediate`   | `0`                                         |
//! | `Millis(f)`   | `f(n)`                                      |
//! | `Wait(f)`     | awaits the future returned by `f(n, err)`   |
//!
//! `Wait` lets the caller wait for a condition ("network back online") instead of a clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ActionError;
use crate::policies::backoff::BackoffPolicy;

const STEP: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(30);

/// Custom delay in milliseconds-as-duration.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
/// Custom delay expressed as a future to await.
pub type WaitFn = Arc<dyn Fn(u32, &ActionError) -> BoxFuture<'static, ()> + Send + Sync>;

/// How long to pause before retry `n`.
#[derive(Clone)]
pub enum DelayStrategy {
    Backoff(BackoffPolicy),
    Linear,
    Fixed,
    Fibonacci,
    Immediate,
    Millis(DelayFn),
    Wait(WaitFn),
}

/// What a strategy resolves to for one retry.
pub enum Pause {
    Sleep(Duration),
    Until(BoxFuture<'static, ()>),
}

impl DelayStrategy {
    /// Doubling backoff from 1s capped at 30s.
    pub fn backoff() -> Self {
        DelayStrategy::Backoff(BackoffPolicy::default())
    }

    /// Custom millisecond function.
    pub fn millis<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        DelayStrategy::Millis(Arc::new(f))
    }

    /// Custom "wait for this future" function.
    pub fn wait<F>(f: F) -> Self
    where
        F: Fn(u32, &ActionError) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        DelayStrategy::Wait(Arc::new(f))
    }

    /// Fixed delay for clock-based strategies; `None` for [`DelayStrategy::Wait`].
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        let d = match self {
            DelayStrategy::Backoff(b) => b.next(attempt),
            DelayStrategy::Linear => STEP.saturating_mul(attempt.saturating_add(1)).min(CAP),
            DelayStrategy::Fixed => STEP,
            DelayStrategy::Fibonacci => STEP.saturating_mul(fibonacci(attempt + 1)).min(CAP),
            DelayStrategy::Immediate => Duration::ZERO,
            DelayStrategy::Millis(f) => f(attempt),
            DelayStrategy::Wait(_) => return None,
        };
        Some(d)
    }

    /// Resolves the pause before retry `attempt` following `err`.
    pub fn pause(&self, attempt: u32, err: &ActionError) -> Pause {
        match self {
            DelayStrategy::Wait(f) => Pause::Until(f(attempt, err)),
            other => Pause::Sleep(other.delay(attempt).unwrap_or(Duration::ZERO)),
        }
    }
}

impl Default for DelayStrategy {
    fn default() -> Self {
        DelayStrategy::backoff()
    }
}

impl fmt::Debug for DelayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayStrategy::Backoff(b) => f.debug_tuple("Backoff").field(b).finish(),
            DelayStrategy::Linear => write!(f, "Linear"),
            DelayStrategy::Fixed => write!(f, "Fixed"),
            DelayStrategy::Fibonacci => write!(f, "Fibonacci"),
            DelayStrategy::Immediate => write!(f, "Immediate"),
            DelayStrategy::Millis(_) => write!(f, "Millis(..)"),
            DelayStrategy::Wait(_) => write!(f, "Wait(..)"),
        }
    }
}

/// `fib(1) = fib(2) = 1`, saturating at `u32::MAX`.
fn fibonacci(n: u32) -> u32 {
    let (mut a, mut b) = (0u32, 1u32);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(strategy: &DelayStrategy, attempt: u32) -> u128 {
        strategy.delay(attempt).map(|d| d.as_millis()).unwrap_or(u128::MAX)
    }

    #[test]
    fn test_linear_grows_by_one_second_and_caps() {
        let s = DelayStrategy::Linear;
        assert_eq!(ms(&s, 0), 1_000);
        assert_eq!(ms(&s, 1), 2_000);
        assert_eq!(ms(&s, 40), 30_000);
    }

    #[test]
    fn test_fibonacci_sequence_capped() {
        let s = DelayStrategy::Fibonacci;
        let got: Vec<u128> = (0..6).map(|n| ms(&s, n)).collect();
        assert_eq!(got, vec![1_000, 1_000, 2_000, 3_000, 5_000, 8_000]);
        assert_eq!(ms(&s, 30), 30_000);
    }

    #[test]
    fn test_fixed_immediate_and_custom() {
        assert_eq!(ms(&DelayStrategy::Fixed, 7), 1_000);
        assert_eq!(ms(&DelayStrategy::Immediate, 7), 0);
        let custom = DelayStrategy::millis(|n| Duration::from_millis(10 * u64::from(n)));
        assert_eq!(ms(&custom, 3), 30);
    }

    #[test]
    fn test_wait_strategy_has_no_clock_delay() {
        let s = DelayStrategy::wait(|_, _| Box::pin(async {}));
        assert!(s.delay(0).is_none());
        assert!(matches!(s.pause(0, &ActionError::fail("x")), Pause::Until(_)));
    }
}
