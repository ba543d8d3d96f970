//! # Example: sync_dispatch
//!
//! Shows that emission is synchronous: the emitter does not continue until
//! the handler (which sleeps) has returned.
//!
//! ## Flow
//! ```text
//! main ──► "Starting user creation process..."
//!      ──► signals.emit_from(User, POST_SAVE, Saved::created(user))
//!            └─► user_post_save: prints, sleeps, prints   (same thread)
//!      ──► "User creation process finished after ..."
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example sync_dispatch
//! HANDLER_DELAY_MS=500 cargo run --example sync_dispatch
//! ```

use std::time::{Duration, Instant};

use signalvisor::{Dispatcher, DispatcherConfig, Emission, EventKind, Saved, Sender};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct User {
    username: String,
}

fn handler_delay() -> Duration {
    std::env::var("HANDLER_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let signals: Dispatcher<Saved<User>> = Dispatcher::new(DispatcherConfig::quiet());
    let delay = handler_delay();

    signals.register_fn_for(
        EventKind::POST_SAVE,
        Sender::of::<User>(),
        "user_post_save",
        move |em: &Emission<'_, Saved<User>>| {
            let saved = em.payload();
            if saved.created {
                println!("Signal handler: User {} created", saved.instance.username);
                std::thread::sleep(delay);
                println!("Signal handler done after {delay:?}");
            }
            Ok(())
        },
    );

    println!("Starting user creation process...");
    let started = Instant::now();

    let user = User {
        username: "alice".to_string(),
    };
    signals.emit_from(&Sender::of::<User>(), &EventKind::POST_SAVE, &Saved::created(user))?;

    println!(
        "User creation process finished after {:?} (handler delay {delay:?})",
        started.elapsed()
    );
    Ok(())
}
