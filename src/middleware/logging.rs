//! # `logging` layer.
//!
//! Emits a `tracing` record at the start and end of every call, tagged with the
//! action name and the elapsed time.

use std::sync::Arc;

use tokio::time::Instant;

use crate::cancel::Ctx;
use crate::handlers::{BoxHandlerFuture, Handler, HandlerRef};
use crate::middleware::layer::{Layer, Shareable};

/// Logging layer.
#[derive(Clone, Debug)]
pub struct Logging {
    name: Arc<str>,
}

pub fn logging(name: impl Into<Arc<str>>) -> Logging {
    Logging { name: name.into() }
}

impl<A: Shareable, T: Shareable> Layer<A, T> for Logging {
    fn wrap(&self, next: HandlerRef<A, T>) -> HandlerRef<A, T> {
        Arc::new(LoggingHandler {
            next,
            name: self.name.clone(),
        })
    }
}

struct LoggingHandler<A, T> {
    next: HandlerRef<A, T>,
    name: Arc<str>,
}

impl<A: Shareable, T: Shareable> Handler<A, T> for LoggingHandler<A, T> {
    fn call(&self, args: A, ctx: Ctx) -> BoxHandlerFuture<T> {
        let name = self.name.clone();
        tracing::debug!(action = %name, "call started");
        let started = Instant::now();
        let fut = self.next.call(args, ctx);

        Box::pin(async move {
            let res = fut.await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &res {
                Ok(_) => tracing::info!(action = %name, elapsed_ms, "call succeeded"),
                Err(e) if e.is_canceled() => {
                    tracing::debug!(action = %name, elapsed_ms, "call cancelled")
                }
                Err(e) => tracing::warn!(
                    action = %name,
                    elapsed_ms,
                    error = %e,
                    label = e.as_label(),
                    "call failed"
                ),
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::handlers::handler;
    use crate::middleware::HandlerExt;

    #[tokio::test]
    async fn test_result_passes_through_unchanged() {
        let h = handler(|n: u32, _ctx: Ctx| async move {
            if n == 0 {
                Err(ActionError::fail("zero"))
            } else {
                Ok(n)
            }
        })
        .with(logging("numbers"));

        assert_eq!(h.call(3, Ctx::default()).await, Ok(3));
        assert_eq!(h.call(0, Ctx::default()).await, Err(ActionError::fail("zero")));
    }
}
