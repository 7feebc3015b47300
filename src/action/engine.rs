//! # Action: a handler bound to one async-state accessor.
//!
//! [`Action`] owns the dispatch state machine of one accessor.
//!
//! ## Operations
//! - [`dispatch`](Action::dispatch): cancel the previous call (auto-cancel), write
//!   `pending`, run the handler through the retry loop, write `success`/`error`.
//! - [`refresh`](Action::refresh): dispatch again with the last arguments.
//! - [`cancel`](Action::cancel): abort the latest dispatch; idempotent.
//! - [`reset`](Action::reset): abort everything, forget the last call, write `idle`.
//!
//! ## Write rules
//! ```text
//! dispatch ──► mint token + RequestId ──► set(pending, id)
//!                     │
//!                     ▼
//!           run_attempts(handler) ──► cancelled? ──yes──► reject Canceled, no write
//!                     │ no
//!                     ▼
//!           accessor still carries our id? ──no──► WriteSuppressed, settle caller anyway
//!                     │ yes
//!                     ▼
//!              set(success | error, id)
//! ```
//! With `auto_cancel` disabled, concurrent dispatches race and the ownership check
//! becomes "the accessor carries some engine identity"; the last to settle wins.
//! A handler that returns [`ActionError::Canceled`] on its own settles the accessor
//! back to `idle`; it is not an error.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::action::config::ActionConfig;
use crate::action::dispatch::Dispatch;
use crate::action::registry::{InFlight, PendingHandle, PendingRegistry};
use crate::cancel::Ctx;
use crate::error::{ActionError, ConfigError};
use crate::events::{emit, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::middleware::Shareable;
use crate::policies::retry::run_attempts;
use crate::state::{AccessorRef, AsyncState, RequestId};

/// The last dispatch of an action, as reported by [`Action::last`].
#[derive(Clone, Debug)]
pub struct LastInvocation<A, T> {
    /// Arguments of the most recent dispatch.
    pub args: A,
    /// 1-based count of dispatches since creation or the last reset.
    pub invocation_count: u32,
    /// Current value of the accessor.
    pub state: AsyncState<T>,
}

struct Record<A> {
    args: A,
    invocation_count: u32,
    token: CancellationToken,
    request: RequestId,
}

struct Inner<A, T> {
    accessor: AccessorRef<T>,
    handler: HandlerRef<A, T>,
    cfg: ActionConfig,
    runtime: Handle,
    record: Mutex<Option<Record<A>>>,
    /// Parent of every dispatch token; replaced on reset.
    scope: Mutex<CancellationToken>,
}

/// A handler bound to an accessor. Cheap to clone; clones share the same state machine.
pub struct Action<A, T> {
    inner: Arc<Inner<A, T>>,
}

impl<A, T> Clone for Action<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Shareable, T: Shareable> Action<A, T> {
    /// Binds `handler` to `accessor`.
    ///
    /// Must be called inside a Tokio runtime; dispatches are spawned onto it.
    ///
    /// # Errors
    /// - [`ConfigError::NoRuntime`] outside a runtime.
    /// - [`ConfigError::InvalidAttempts`] for a retry policy with zero attempts.
    pub fn new(
        accessor: AccessorRef<T>,
        handler: HandlerRef<A, T>,
        cfg: ActionConfig,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        cfg.retry.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                accessor,
                handler,
                cfg,
                runtime,
                record: Mutex::new(None),
                scope: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    /// Starts a new call with `args`.
    ///
    /// `pending` is written before this returns. The returned [`Dispatch`] settles
    /// with the handler's result even when the state write is suppressed.
    pub fn dispatch(&self, args: A) -> Dispatch<T> {
        let inner = &self.inner;
        let request = RequestId::mint();
        let token = inner.scope.lock().child_token();

        let invocation_count = {
            let mut record = inner.record.lock();
            if inner.cfg.auto_cancel {
                if let Some(prev) = record.as_ref() {
                    prev.token.cancel();
                }
            }
            let count = record.as_ref().map_or(1, |r| r.invocation_count + 1);
            *record = Some(Record {
                args: args.clone(),
                invocation_count: count,
                token: token.clone(),
                request,
            });
            count
        };

        let current = inner.accessor.get();
        inner
            .accessor
            .set(AsyncState::pending(current.mode(), current.retained()).with_request(request));
        tracing::debug!(action = %inner.cfg.name, invocation = invocation_count, "dispatch started");
        emit(inner.cfg.bus.as_ref(), || {
            Event::new(EventKind::DispatchStarted)
                .with_action(inner.cfg.name.clone())
                .with_attempt(invocation_count)
        });

        let work: InFlight<T> = run(inner.clone(), args, token.clone(), request)
            .boxed()
            .shared();
        inner
            .cfg
            .registry
            .insert(inner.accessor.key(), request, work.clone());
        inner.runtime.spawn({
            let work = work.clone();
            async move {
                let _ = work.await;
            }
        });

        Dispatch::new(work, token, request)
    }

    /// Dispatches again with the last arguments; `None` if nothing was dispatched
    /// since creation or the last reset.
    pub fn refresh(&self) -> Option<Dispatch<T>> {
        let args = self.inner.record.lock().as_ref().map(|r| r.args.clone())?;
        Some(self.dispatch(args))
    }

    /// Cancels the most recent dispatch. Idempotent.
    pub fn cancel(&self) {
        let inner = &self.inner;
        if let Some(record) = inner.record.lock().as_ref() {
            record.token.cancel();
            inner.cfg.registry.evict(inner.accessor.key(), record.request);
        }
    }

    /// Cancels every in-flight dispatch, forgets the last call and writes `idle`.
    ///
    /// Stale-mode accessors keep their data; fresh-mode ones are cleared.
    pub fn reset(&self) {
        let inner = &self.inner;
        let previous = std::mem::replace(&mut *inner.scope.lock(), CancellationToken::new());
        previous.cancel();
        if let Some(record) = inner.record.lock().take() {
            inner.cfg.registry.evict(inner.accessor.key(), record.request);
        }

        let request = RequestId::mint();
        let current = inner.accessor.get();
        inner
            .accessor
            .set(AsyncState::idle(current.mode(), current.retained()).with_request(request));
        tracing::debug!(action = %inner.cfg.name, "state reset");
        emit(inner.cfg.bus.as_ref(), || {
            Event::new(EventKind::StateReset).with_action(inner.cfg.name.clone())
        });
    }

    /// Arguments, invocation count and current state; `None` before the first dispatch.
    pub fn last(&self) -> Option<LastInvocation<A, T>> {
        let (args, invocation_count) = {
            let record = self.inner.record.lock();
            let r = record.as_ref()?;
            (r.args.clone(), r.invocation_count)
        };
        Some(LastInvocation {
            args,
            invocation_count,
            state: self.inner.accessor.get(),
        })
    }

    /// Current value of the accessor.
    pub fn state(&self) -> AsyncState<T> {
        self.inner.accessor.get()
    }

    /// Settlement handle of the in-flight dispatch, if any.
    pub fn pending(&self) -> Option<PendingHandle> {
        self.inner.cfg.registry.pending(self.inner.accessor.key())
    }

    pub fn accessor(&self) -> &AccessorRef<T> {
        &self.inner.accessor
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.inner.cfg.registry
    }
}

impl<A, T: 'static> Inner<A, T> {
    /// Whether a write from the dispatch minted `request` is still authoritative.
    fn owns(&self, request: RequestId) -> bool {
        match self.accessor.get().request_id() {
            Some(current) if self.cfg.auto_cancel => current == request,
            Some(_) => true,
            None => false,
        }
    }

    fn publish(&self, kind: EventKind, decorate: impl FnOnce(Event) -> Event) {
        emit(self.cfg.bus.as_ref(), || {
            decorate(Event::new(kind).with_action(self.cfg.name.clone()))
        });
    }
}

/// Body of one dispatch: retry loop, then the guarded state write.
async fn run<A: Shareable, T: Shareable>(
    inner: Arc<Inner<A, T>>,
    args: A,
    token: CancellationToken,
    request: RequestId,
) -> Result<T, ActionError> {
    let ctx = Ctx::new(token.clone());
    let handler = inner.handler.clone();

    let res = {
        let hook_inner = inner.clone();
        let mut on_retry = move |n: u32, err: &ActionError, delay: Option<std::time::Duration>| {
            hook_inner.publish(EventKind::AttemptFailed, |ev| {
                ev.with_attempt(n).with_reason(err.to_string())
            });
            hook_inner.publish(EventKind::RetryScheduled, |ev| {
                let ev = ev.with_attempt(n).with_reason(err.to_string());
                match delay {
                    Some(d) => ev.with_delay(d),
                    None => ev,
                }
            });
        };
        run_attempts(
            &inner.cfg.retry,
            &token,
            |_| handler.call(args.clone(), ctx.clone()),
            &mut on_retry,
        )
        .await
    };

    inner.cfg.registry.evict(inner.accessor.key(), request);

    if token.is_cancelled() {
        tracing::debug!(action = %inner.cfg.name, "dispatch cancelled");
        inner.publish(EventKind::DispatchCanceled, |ev| ev);
        return Err(ActionError::Canceled);
    }

    let owned = inner.owns(request);
    let mode = inner.accessor.get().mode();
    match res {
        Ok(value) => {
            if owned {
                inner
                    .accessor
                    .set(AsyncState::success(mode, value.clone()).with_request(request));
            }
            inner.publish(EventKind::DispatchSucceeded, |ev| ev);
            if !owned {
                suppressed(&inner, "success");
            }
            Ok(value)
        }
        Err(ActionError::Canceled) => {
            // Cancelled from inside the handler: settle back to idle, never to error.
            if owned {
                let retained = inner.accessor.get().retained();
                inner
                    .accessor
                    .set(AsyncState::idle(mode, retained).with_request(request));
            }
            tracing::debug!(action = %inner.cfg.name, "handler cancelled itself");
            inner.publish(EventKind::DispatchCanceled, |ev| ev);
            Err(ActionError::Canceled)
        }
        Err(err) => {
            // One notification for the error write and whatever on_error writes back.
            inner.accessor.batch(&mut || {
                if owned {
                    let retained = inner.accessor.get().retained();
                    inner
                        .accessor
                        .set(AsyncState::error(mode, err.clone(), retained).with_request(request));
                }
                if let Some(on_error) = &inner.cfg.on_error {
                    on_error(&err);
                }
            });
            tracing::debug!(action = %inner.cfg.name, error = %err, "dispatch failed");
            inner.publish(EventKind::DispatchFailed, |ev| {
                ev.with_attempt(inner.cfg.retry.attempts)
                    .with_reason(err.to_string())
            });
            if !owned {
                suppressed(&inner, "error");
            }
            Err(err)
        }
    }
}

fn suppressed<A, T: 'static>(inner: &Inner<A, T>, write: &'static str) {
    tracing::debug!(action = %inner.cfg.name, write, "state changed externally; write suppressed");
    inner.publish(EventKind::WriteSuppressed, |ev| ev.with_reason(write));
}

impl<A, T: 'static> fmt::Debug for Action<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.inner.cfg.name)
            .field("key", &self.inner.accessor.key())
            .finish()
    }
}
