//! # Example: activity_log
//!
//! Observes dispatch through the activity bus: the built-in [`LogWriter`]
//! renders every record through `tracing`, and a custom subscriber tallies
//! which threads handlers ran on.
//!
//! ## Flow
//! ```text
//! Dispatcher::builder(cfg).with_subscriber(LogWriter).with_subscriber(ThreadTally).build()
//!   emit / emit_in / commit / rollback
//!     └─► Bus ─► activity listener ─► SubscriberSet ─► LogWriter.on_activity()
//!                                                  └─► ThreadTally.on_activity()
//! shutdown().await  (drains queued records)
//! ```
//!
//! ## Run
//! Requires the `logging` feature to export [`LogWriter`].
//! ```bash
//! cargo run --example activity_log --features logging
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use signalvisor::{
    Activity, ActivityKind, Dispatcher, DispatcherConfig, EventKind, Interest, LogWriter, Saved,
    Subscribe,
};
use tracing_subscriber::EnvFilter;

/// Counts handler returns per thread name.
#[derive(Default)]
struct ThreadTally {
    per_thread: Mutex<BTreeMap<String, usize>>,
}

#[async_trait]
impl Subscribe for ThreadTally {
    async fn on_activity(&self, rec: &Activity) {
        let thread = rec.thread.as_deref().unwrap_or("<unknown>").to_string();
        if let Ok(mut map) = self.per_thread.lock() {
            *map.entry(thread).or_default() += 1;
        }
    }

    fn name(&self) -> &'static str {
        "thread-tally"
    }

    fn interest(&self) -> Interest {
        Interest::Kinds(&[ActivityKind::HandlerReturned])
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tally = Arc::new(ThreadTally::default());
    let cfg = DispatcherConfig {
        slow_handler: Duration::from_millis(100),
        ..DispatcherConfig::default()
    };
    let signals: Dispatcher<Saved<String>> = Dispatcher::builder(cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .with_subscriber(tally.clone())
        .build()?;

    signals.register_fn(EventKind::POST_SAVE, "audit", |em| {
        std::thread::sleep(Duration::from_millis(150));
        println!("audit: {} created={}", em.payload().instance, em.payload().created);
        Ok(())
    });
    signals.register_fn_on_commit(EventKind::POST_SAVE, "welcome-mail", |em| {
        println!("welcome mail to {}", em.payload().instance);
        Ok(())
    });

    // Committed scope: both handlers run.
    let scope = signals.scope();
    signals.emit_in(&scope, &EventKind::POST_SAVE, &Saved::created("alice".into()))?;
    scope.commit()?;

    // Rolled back scope: only the immediate handler runs.
    let scope = signals.scope();
    signals.emit_in(&scope, &EventKind::POST_SAVE, &Saved::created("bob".into()))?;
    scope.rollback();

    // Emission from another thread.
    let emitter = signals.clone();
    tokio::task::spawn_blocking(move || {
        emitter.emit(&EventKind::POST_SAVE, &Saved::updated("carol".into()))
    })
    .await??;

    signals.shutdown().await;

    if let Ok(map) = tally.per_thread.lock() {
        for (thread, n) in map.iter() {
            println!("handlers returned on {thread}: {n}");
        }
    }
    Ok(())
}
