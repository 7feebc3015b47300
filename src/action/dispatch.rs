//! # Cancellable dispatch handle.
//!
//! [`Dispatch`] is what [`Action::dispatch`](crate::Action::dispatch) returns: a future
//! of the call's result that can also be cancelled. The work itself runs on the
//! runtime whether or not the handle is polled; dropping the handle does not cancel it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::action::registry::InFlight;
use crate::error::ActionError;
use crate::handlers::BoxHandlerFuture;
use crate::middleware::Shareable;
use crate::state::RequestId;

/// Future of one dispatch, with `cancel()`.
#[must_use = "dropping a Dispatch does not cancel it; call cancel() to abort"]
pub struct Dispatch<T> {
    result: BoxHandlerFuture<T>,
    token: CancellationToken,
    request: RequestId,
}

impl<T: Shareable> Dispatch<T> {
    pub(crate) fn new(work: InFlight<T>, token: CancellationToken, request: RequestId) -> Self {
        let cancelled = token.clone();
        let result = async move {
            select! {
                biased;
                r = work => r,
                _ = cancelled.cancelled() => Err(ActionError::Canceled),
            }
        }
        .boxed();
        Self {
            result,
            token,
            request,
        }
    }
}

impl<T> Dispatch<T> {
    /// Cancels this dispatch. The handle then rejects with [`ActionError::Canceled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Identity written alongside the state of this dispatch.
    pub fn request_id(&self) -> RequestId {
        self.request
    }
}

impl<T> Future for Dispatch<T> {
    type Output = Result<T, ActionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("request", &self.request)
            .field("canceled", &self.token.is_cancelled())
            .finish()
    }
}
