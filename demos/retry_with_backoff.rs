//! # Example: retry_with_backoff
//!
//! Demonstrates how an [`Action`] retries a failing handler according to its
//! [`RetryPolicy`] and a jittered [`BackoffPolicy`], and how the accessor moves through
//! `pending` to `success` while keeping its stale data.
//!
//! The handler fails twice before succeeding.
//!
//! ## Flow
//! ```text
//! Action::dispatch()
//!   ├─► set(pending, data="cached profile")
//!   ├─► publish(DispatchStarted)
//!   ├─► attempt 1 → Err("boom #1")
//!   ├─► publish(AttemptFailed, RetryScheduled{delay=100ms})
//!   ├─► sleep(delay)
//!   ├─► attempt 2 → Err("boom #2")
//!   ├─► publish(AttemptFailed, RetryScheduled{delay≈200ms})
//!   ├─► sleep(delay)
//!   ├─► attempt 3 → Ok("fresh profile")
//!   ├─► set(success, data="fresh profile")
//!   └─► publish(DispatchSucceeded)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_backoff
//! cargo run --example retry_with_backoff --features logging
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actionvisor::{
    handler, stale, Accessor, AccessorRef, Action, ActionConfig, ActionError, BackoffPolicy, Bus,
    Ctx, DelayStrategy, JitterPolicy, RetryPolicy, StateCell, Subscribe, SubscriberSet,
};

static ATTEMPTS: AtomicU64 = AtomicU64::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Event bus and subscribers (LogWriter if the feature is enabled)
    let bus = Bus::new(100);
    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(actionvisor::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
    let listener = Arc::new(SubscriberSet::new(subs)).listen(&bus);

    // 2. Stale-mode state seeded with cached data
    let profile = StateCell::arc(stale("cached profile".to_string()));
    let accessor: AccessorRef<String> = profile.clone();

    // 3. A handler that fails 2 times before succeeding
    let flaky = handler(|user: u32, ctx: Ctx| async move {
        let attempt = ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[flaky] user {user}, attempt {attempt}");

        ctx.safe(tokio::time::sleep(Duration::from_millis(20))).await;
        if attempt <= 2 {
            println!("[flaky] simulated failure #{attempt}");
            Err(ActionError::fail(format!("boom #{attempt}")))
        } else {
            println!("[flaky] success on attempt {attempt}");
            Ok("fresh profile".to_string())
        }
    });

    // 4. Exponential backoff with jitter, three attempts in total
    let backoff = BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_secs(2),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };
    let cfg = ActionConfig::builder("load-profile")
        .retry(RetryPolicy::attempts(3).with_delay(DelayStrategy::Backoff(backoff)))
        .bus(bus)
        .on_error(|e| eprintln!("[main] gave up: {e}"))
        .build();

    // 5. Dispatch and watch the state
    let action = Action::new(accessor, flaky, cfg)?;
    let call = action.dispatch(42);
    let pending = profile.get();
    println!("[main] {:?} with {:?}", pending.status(), pending.data());

    let value = call.await?;
    let done = profile.get();
    println!("[main] {:?} with {:?} (returned {value:?})", done.status(), done.data());

    listener.abort();
    println!("[main] done.");
    Ok(())
}
