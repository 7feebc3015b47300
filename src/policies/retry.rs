//! # Bounded retry loop.
//!
//! [`RetryPolicy`] bundles the total number of attempts with the [`DelayStrategy`]
//! used between them. [`run_attempts`] is the shared loop behind both the action
//! engine and the `retry` middleware.
//!
//! ## Rules
//! - `attempts` counts invocations, so `attempts = 3` calls the handler at most 3 times.
//! - Every attempt is raced against the token: cancellation rejects immediately,
//!   even if the handler never looks at its token.
//! - A cancelled token is never retried; an abort during the delay interrupts it.

use std::future::Future;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::{ActionError, ConfigError};
use crate::policies::delay::{DelayStrategy, Pause};

/// Total attempts plus the pause between them.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total number of invocations (`>= 1`).
    pub attempts: u32,
    /// Pause before each retry.
    pub delay: DelayStrategy,
}

impl Default for RetryPolicy {
    /// A single attempt, no retries.
    fn default() -> Self {
        Self {
            attempts: 1,
            delay: DelayStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// `attempts` invocations with the default backoff between them.
    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts,
            delay: DelayStrategy::default(),
        }
    }

    /// Returns a new policy with the given delay strategy.
    pub fn with_delay(mut self, delay: DelayStrategy) -> Self {
        self.delay = delay;
        self
    }

    /// Rejects a policy with zero attempts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }
        Ok(())
    }
}

impl From<u32> for RetryPolicy {
    fn from(attempts: u32) -> Self {
        RetryPolicy::attempts(attempts)
    }
}

impl From<DelayStrategy> for RetryPolicy {
    /// Three attempts with the given strategy.
    fn from(delay: DelayStrategy) -> Self {
        RetryPolicy { attempts: 3, delay }
    }
}

/// Hook called before each retry with `(attempt, error, delay)`; `delay` is `None`
/// when the strategy waits on a future.
pub(crate) type OnRetry<'a> = &'a mut (dyn FnMut(u32, &ActionError, Option<Duration>) + Send);

/// Runs `attempt` up to `policy.attempts` times.
///
/// `attempt` receives the 1-based attempt number.
pub(crate) async fn run_attempts<T, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut attempt: F,
    on_retry: OnRetry<'_>,
) -> Result<T, ActionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ActionError>>,
{
    let total = policy.attempts.max(1);
    let mut n: u32 = 0;

    loop {
        if token.is_cancelled() {
            return Err(ActionError::Canceled);
        }
        n += 1;

        let res = select! {
            biased;
            _ = token.cancelled() => Err(ActionError::Canceled),
            r = attempt(n) => r,
        };

        let err = match res {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if token.is_cancelled() || !err.is_retryable() {
            return Err(ActionError::Canceled);
        }
        if n >= total {
            return Err(err);
        }

        let retry_index = n - 1;
        let pause = policy.delay.pause(retry_index, &err);
        on_retry(n, &err, policy.delay.delay(retry_index));

        match pause {
            Pause::Sleep(d) if d.is_zero() => {}
            Pause::Sleep(d) => {
                select! {
                    _ = time::sleep(d) => {}
                    _ = token.cancelled() => return Err(ActionError::Canceled),
                }
            }
            Pause::Until(fut) => {
                select! {
                    _ = fut => {}
                    _ = token.cancelled() => return Err(ActionError::Canceled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn no_hook() -> impl FnMut(u32, &ActionError, Option<Duration>) + Send {
        |_, _, _| {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_invokes_exactly_attempts_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::attempts(3).with_delay(DelayStrategy::Immediate);
        let token = CancellationToken::new();

        let c = calls.clone();
        let res: Result<(), _> = run_attempts(
            &policy,
            &token,
            |n| {
                c.fetch_add(1, Ordering::SeqCst);
                async move { Err(ActionError::fail(format!("boom #{n}"))) }
            },
            &mut no_hook(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res, Err(ActionError::fail("boom #3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_hook_sees_backoff_delays() {
        let policy = RetryPolicy::attempts(3);
        let token = CancellationToken::new();
        let mut seen = Vec::new();
        let mut hook = |n: u32, _: &ActionError, d: Option<Duration>| seen.push((n, d));

        let res: Result<u32, _> = run_attempts(
            &policy,
            &token,
            |n| async move {
                if n < 3 {
                    Err(ActionError::fail("flaky"))
                } else {
                    Ok(n)
                }
            },
            &mut hook,
        )
        .await;

        assert_eq!(res, Ok(3));
        assert_eq!(
            seen,
            vec![
                (1, Some(Duration::from_secs(1))),
                (2, Some(Duration::from_secs(2)))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_interrupts_it() {
        let policy = RetryPolicy::attempts(5).with_delay(DelayStrategy::Fixed);
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let t = token.clone();
        let c = calls.clone();
        let run = tokio::spawn(async move {
            run_attempts::<(), _, _>(
                &policy,
                &t,
                |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    async { Err(ActionError::fail("down")) }
                },
                &mut no_hook(),
            )
            .await
        });

        time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        let res = run.await.expect("join");
        assert_eq!(res, Err(ActionError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_attempt_rejects_on_cancel() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        let t = token.clone();
        let run = tokio::spawn(async move {
            run_attempts::<(), _, _>(
                &policy,
                &t,
                |_| futures::future::pending(),
                &mut |_, _, _| {},
            )
            .await
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(run.await.expect("join"), Err(ActionError::Canceled));
    }
}
