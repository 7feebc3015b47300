//! # Safe execution: settle only while not cancelled.
//!
//! [`Safe`] is the sanctioned way for handler code to run nested asynchronous work.
//!
//! - [`Safe::run`] wraps a future so that it **never settles** once the owning token is
//!   cancelled (before or during the await). It neither resolves nor rejects, so a
//!   cancelled operation cannot produce a late state write.
//! - [`Safe::wrap`] wraps a callback so it no-ops (returns `None`) when called after
//!   cancellation, and forwards to the callback otherwise.
//!
//! ```text
//! cancel ─┐
//!         ▼
//! safe.run(fut) ── pending forever
//! safe.wrap(cb)(x) ── None
//! ```

use std::future::{self, Future};

use tokio::select;
use tokio_util::sync::CancellationToken;

/// Settlement guard bound to one cancellation token.
#[derive(Clone, Debug)]
pub struct Safe {
    token: CancellationToken,
}

impl Safe {
    /// Binds the guard to `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// True once the bound token is cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Awaits `fut`, but stays pending forever if the token is (or becomes) cancelled.
    ///
    /// A value produced in the same poll as the cancellation is discarded too.
    pub fn run<F>(&self, fut: F) -> impl Future<Output = F::Output> + Send + 'static
    where
        F: Future + Send + 'static,
        F::Output: Send,
    {
        let token = self.token.clone();
        async move {
            if token.is_cancelled() {
                return future::pending().await;
            }
            let out = select! {
                biased;
                _ = token.cancelled() => None,
                v = fut => Some(v),
            };
            match out {
                Some(v) if !token.is_cancelled() => v,
                _ => future::pending().await,
            }
        }
    }

    /// Wraps a one-argument callback; use a tuple for more.
    ///
    /// The returned closure yields `None` without calling `f` once the token is cancelled.
    pub fn wrap<Arg, R, F>(&self, f: F) -> impl Fn(Arg) -> Option<R> + Send + Sync + 'static
    where
        F: Fn(Arg) -> R + Send + Sync + 'static,
    {
        let token = self.token.clone();
        move |arg| {
            if token.is_cancelled() {
                None
            } else {
                Some(f(arg))
            }
        }
    }
}
