//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout. Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [dispatch] action="load-user" invocation=1
//! [attempt-failed] action="load-user" attempt=1 err="connection refused"
//! [retry] action="load-user" delay_ms=1000 after_attempt=1
//! [succeeded] action="load-user"
//! [suppressed] action="load-user" write="success"
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let action = e.action.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::DispatchStarted => {
                println!("[dispatch] action={action:?} invocation={:?}", e.attempt)
            }
            EventKind::AttemptFailed => println!(
                "[attempt-failed] action={action:?} attempt={:?} err={reason:?}",
                e.attempt
            ),
            EventKind::RetryScheduled => println!(
                "[retry] action={action:?} delay_ms={:?} after_attempt={:?}",
                e.delay_ms, e.attempt
            ),
            EventKind::DispatchSucceeded => println!("[succeeded] action={action:?}"),
            EventKind::DispatchFailed => println!("[failed] action={action:?} err={reason:?}"),
            EventKind::DispatchCanceled => println!("[canceled] action={action:?}"),
            EventKind::WriteSuppressed => {
                println!("[suppressed] action={action:?} write={reason:?}")
            }
            EventKind::StateReset => println!("[reset] action={action:?}"),
            EventKind::TimeoutHit => {
                println!("[timeout] action={action:?} timeout_ms={:?}", e.timeout_ms)
            }
            EventKind::CircuitOpened => println!("[circuit-open] action={action:?} err={reason:?}"),
            EventKind::CircuitHalfOpen => println!("[circuit-half-open] action={action:?}"),
            EventKind::CircuitClosed => println!("[circuit-closed] action={action:?}"),
            EventKind::CallQueued => println!("[queued] action={action:?}"),
            EventKind::CacheHit => println!("[cache-hit] action={action:?} key={reason}"),
            EventKind::DisposalScheduled => {
                println!("[disposal-scheduled] group={action:?} grace_ms={:?}", e.delay_ms)
            }
            EventKind::DisposalCanceled => println!("[disposal-canceled] group={action:?}"),
            EventKind::Disposed => println!("[disposed] group={action:?}"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
