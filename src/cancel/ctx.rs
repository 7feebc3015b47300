//! # Per-call handler context.
//!
//! Every handler invocation receives a [`Ctx`]: the cancellation token of the dispatch
//! (or of a middleware-derived child), plus shortcuts into [`Safe`].
//!
//! Handlers should route nested awaits through [`Ctx::safe`] so that cancelling the
//! outer dispatch silently orphans them.

use std::future::Future;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::cancel::safe::Safe;

/// Cancellation context handed to handlers.
#[derive(Clone, Debug, Default)]
pub struct Ctx {
    token: CancellationToken,
}

impl Ctx {
    /// Wraps an existing token.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// The underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Context whose cancellation follows this one but can also be cancelled alone.
    pub fn child(&self) -> Ctx {
        Ctx::new(self.token.child_token())
    }

    /// Settlement guard for this context.
    pub fn guard(&self) -> Safe {
        Safe::new(self.token.clone())
    }

    /// Shorthand for `self.guard().run(fut)`.
    pub fn safe<F>(&self, fut: F) -> impl Future<Output = F::Output> + Send + 'static
    where
        F: Future + Send + 'static,
        F::Output: Send,
    {
        self.guard().run(fut)
    }

    /// Shorthand for `self.guard().wrap(f)`.
    pub fn safe_fn<Arg, R, F>(&self, f: F) -> impl Fn(Arg) -> Option<R> + Send + Sync + 'static
    where
        F: Fn(Arg) -> R + Send + Sync + 'static,
    {
        self.guard().wrap(f)
    }
}

impl From<CancellationToken> for Ctx {
    fn from(token: CancellationToken) -> Self {
        Ctx::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_follows_parent_but_not_back() {
        let parent = Ctx::default();
        let a = parent.child();
        let b = parent.child();

        a.token().cancel();
        assert!(a.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!b.is_cancelled());

        parent.token().cancel();
        assert!(b.is_cancelled());
    }
}
