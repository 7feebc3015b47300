//! # Derived async state.
//!
//! [`derive`] keeps a target accessor equal to a synchronous computation over other
//! async states. The computation reads its inputs through [`WaitCx::wait`], which
//! answers with a [`Wait`]:
//!
//! | Input state | `wait` returns |
//! |---|---|
//! | success | `Ready(data)` |
//! | error with stale data | `Ready(data)` |
//! | error without data | `Failed(error)` |
//! | pending | `Pending(handle)` |
//! | idle with stale data | `Ready(data)` |
//! | idle without data | `Pending(next write)` |
//!
//! [`Wait::ready`] turns the answer into a `Result` so inputs compose with `?`.
//!
//! ## Loop
//! ```text
//! compute ──► Ok(v)         ──► set(success)  ─┐
//!        ├──► Failed(e)     ──► set(error)     ├─► wait for an input write / recompute()
//!        └──► Pending(h)    ──► set(pending)*  ─┘   (and for h)
//! ```
//! `*` only if the target is not already pending: a cascade of inputs settling one
//! after another produces a single pending write.

use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::action::registry::{PendingHandle, PendingRegistry};
use crate::error::{ActionError, ConfigError};
use crate::middleware::Shareable;
use crate::state::{Accessor, AccessorRef, AsyncState, RequestId, Status};

/// Answer of [`WaitCx::wait`].
#[derive(Debug)]
pub enum Wait<T> {
    Ready(T),
    /// Not available yet; resolves when it may be.
    Pending(PendingHandle),
    Failed(ActionError),
}

/// Why a derivation could not produce a value this round.
#[derive(Debug)]
pub enum Blocked {
    Pending(PendingHandle),
    Failed(ActionError),
}

impl From<ActionError> for Blocked {
    fn from(err: ActionError) -> Self {
        Blocked::Failed(err)
    }
}

impl<T> Wait<T> {
    /// `Ready(v)` becomes `Ok(v)`, anything else `Err(Blocked)`.
    pub fn ready(self) -> Result<T, Blocked> {
        match self {
            Wait::Ready(v) => Ok(v),
            Wait::Pending(h) => Err(Blocked::Pending(h)),
            Wait::Failed(e) => Err(Blocked::Failed(e)),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Wait::Ready(_))
    }
}

/// Read context of one derivation round.
pub struct WaitCx<'a> {
    registry: &'a PendingRegistry,
    writes: Vec<BoxFuture<'static, ()>>,
}

impl<'a> WaitCx<'a> {
    pub fn new(registry: &'a PendingRegistry) -> Self {
        Self {
            registry,
            writes: Vec::new(),
        }
    }

    /// Reads `accessor`, recording it as an input of this round.
    pub fn wait<T, S>(&mut self, accessor: &S) -> Wait<T>
    where
        T: Clone,
        S: Accessor<T> + ?Sized,
    {
        // Subscribe before reading so a write in between is not missed.
        let next_write = accessor.changed().shared();
        self.writes.push(next_write.clone().boxed());

        let state = accessor.get();
        match state.status() {
            Status::Success => match state.into_data() {
                Some(v) => Wait::Ready(v),
                None => Wait::Pending(PendingHandle::new(next_write.boxed())),
            },
            Status::Error => match state.retained() {
                Some(v) => Wait::Ready(v),
                None => Wait::Failed(
                    state
                        .error_ref()
                        .cloned()
                        .unwrap_or_else(|| ActionError::fail("error state without error")),
                ),
            },
            Status::Pending => match self.registry.pending(accessor.key()) {
                Some(handle) => Wait::Pending(handle),
                None => Wait::Pending(PendingHandle::new(next_write.boxed())),
            },
            Status::Idle => match state.retained() {
                Some(v) => Wait::Ready(v),
                None => Wait::Pending(PendingHandle::new(next_write.boxed())),
            },
        }
    }

    fn into_writes(self) -> Vec<BoxFuture<'static, ()>> {
        self.writes
    }
}

/// Handle of a running derivation. Dropping it stops the derivation.
pub struct Derived<T> {
    target: AccessorRef<T>,
    token: CancellationToken,
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T: 'static> Derived<T> {
    /// Runs the computation again even if no input changed.
    pub fn recompute(&self) {
        self.trigger.notify_one();
    }

    /// Stops the derivation; the target keeps its last value.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn state(&self) -> AsyncState<T> {
        self.target.get()
    }
}

impl<T> Drop for Derived<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T: 'static> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("target", &self.target.key())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Keeps `target` equal to `compute` over its inputs.
///
/// The first round runs on the runtime right away.
///
/// # Errors
/// [`ConfigError::NoRuntime`] outside a Tokio runtime.
pub fn derive<U, F>(
    target: AccessorRef<U>,
    registry: PendingRegistry,
    compute: F,
) -> Result<Derived<U>, ConfigError>
where
    U: Shareable,
    F: Fn(&mut WaitCx<'_>) -> Result<U, Blocked> + Send + Sync + 'static,
{
    let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
    let token = CancellationToken::new();
    let trigger = Arc::new(Notify::new());

    let task = runtime.spawn(derivation_loop(
        target.clone(),
        registry,
        compute,
        token.clone(),
        trigger.clone(),
    ));

    Ok(Derived {
        target,
        token,
        trigger,
        task,
    })
}

async fn derivation_loop<U, F>(
    target: AccessorRef<U>,
    registry: PendingRegistry,
    compute: F,
    token: CancellationToken,
    trigger: Arc<Notify>,
) where
    U: Shareable,
    F: Fn(&mut WaitCx<'_>) -> Result<U, Blocked> + Send + Sync + 'static,
{
    loop {
        let (outcome, mut wake) = {
            let mut cx = WaitCx::new(&registry);
            let outcome = compute(&mut cx);
            (outcome, cx.into_writes())
        };

        let current = target.get();
        let mode = current.mode();
        match outcome {
            Ok(value) => {
                target.set(AsyncState::success(mode, value).with_request(RequestId::mint()));
            }
            Err(Blocked::Failed(err)) => {
                target.set(
                    AsyncState::error(mode, err, current.retained())
                        .with_request(RequestId::mint()),
                );
            }
            Err(Blocked::Pending(handle)) => {
                if !current.is_pending() {
                    target.set(
                        AsyncState::pending(mode, current.retained())
                            .with_request(RequestId::mint()),
                    );
                }
                wake.push(handle.boxed());
            }
        }

        let any_input = async move {
            if wake.is_empty() {
                future::pending::<()>().await;
            } else {
                future::select_all(wake).await;
            }
        };
        select! {
            biased;
            _ = token.cancelled() => return,
            _ = trigger.notified() => {}
            _ = any_input => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionConfig};
    use crate::cancel::Ctx;
    use crate::handlers::handler;
    use crate::state::{fresh, stale, Mode, StateCell};
    use std::time::Duration;
    use tokio::time;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_wait_answers_per_state() {
        let reg = PendingRegistry::new();
        let mut cx = WaitCx::new(&reg);

        let ok = StateCell::new(AsyncState::success(Mode::Fresh, 1u32));
        assert!(matches!(cx.wait(&ok), Wait::Ready(1)));

        let stale_err = StateCell::new(AsyncState::error(
            Mode::Stale,
            ActionError::fail("x"),
            Some(2u32),
        ));
        assert!(matches!(cx.wait(&stale_err), Wait::Ready(2)));

        let fresh_err = StateCell::new(AsyncState::<u32>::error(
            Mode::Fresh,
            ActionError::fail("x"),
            None,
        ));
        assert!(matches!(cx.wait(&fresh_err), Wait::Failed(_)));

        let loading = StateCell::new(AsyncState::pending(Mode::Stale, Some(3u32)));
        assert!(matches!(cx.wait(&loading), Wait::Pending(_)));

        assert!(matches!(cx.wait(&StateCell::new(stale(4u32))), Wait::Ready(4)));
        assert!(matches!(cx.wait(&StateCell::new(fresh::<u32>())), Wait::Pending(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_derivation_follows_pending_input() {
        let registry = PendingRegistry::new();
        let source = StateCell::arc(fresh::<u32>());
        let source_acc: AccessorRef<u32> = source.clone();
        let target = StateCell::arc(fresh::<String>());
        let target_acc: AccessorRef<String> = target.clone();

        let load = Action::new(
            source_acc,
            handler(|n: u32, _ctx: Ctx| async move {
                time::sleep(Duration::from_millis(100)).await;
                Ok(n)
            }),
            ActionConfig::builder("source").registry(registry.clone()).build(),
        )
        .unwrap();

        let src = source.clone();
        let derived = derive(target_acc, registry.clone(), move |cx| {
            let n = cx.wait(&*src).ready()?;
            Ok(format!("#{n}"))
        })
        .unwrap();

        let d = load.dispatch(7);
        settle().await;
        assert!(target.get().is_pending());

        d.await.unwrap();
        settle().await;
        assert_eq!(target.get().data().map(String::as_str), Some("#7"));
        assert!(!derived.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_writes_pending_once() {
        let registry = PendingRegistry::new();
        let a = StateCell::arc(AsyncState::pending(Mode::Fresh, None::<u32>));
        let b = StateCell::arc(AsyncState::pending(Mode::Fresh, None::<u32>));
        let target = StateCell::arc(fresh::<u32>());
        let target_acc: AccessorRef<u32> = target.clone();

        let (ra, rb) = (a.clone(), b.clone());
        let _derived = derive(target_acc, registry, move |cx| {
            let x = cx.wait(&*ra).ready()?;
            let y = cx.wait(&*rb).ready()?;
            Ok(x + y)
        })
        .unwrap();

        settle().await;
        assert_eq!(target.version(), 1);

        a.set(AsyncState::success(Mode::Fresh, 1));
        settle().await;
        assert!(target.get().is_pending());
        assert_eq!(target.version(), 1);

        b.set(AsyncState::success(Mode::Fresh, 2));
        settle().await;
        assert_eq!(target.get().data(), Some(&3));
        assert_eq!(target.version(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_fallback_is_written() {
        let registry = PendingRegistry::new();
        let input = StateCell::arc(AsyncState::<u32>::error(
            Mode::Fresh,
            ActionError::fail("gone"),
            None,
        ));
        let target = StateCell::arc(fresh::<u32>());
        let target_acc: AccessorRef<u32> = target.clone();

        let i = input.clone();
        let derived = derive(target_acc, registry, move |cx| cx.wait(&*i).ready()).unwrap();
        settle().await;
        assert_eq!(target.get().error_ref(), Some(&ActionError::fail("gone")));

        derived.cancel();
        settle().await;
        assert!(derived.is_finished());
    }
}
