//! # Example: thread_affinity
//!
//! Emits from a named worker thread (standing in for a request thread) and
//! shows that the handler reports the very same thread.
//!
//! ## Flow
//! ```text
//! spawn thread "request-1"
//!   ├─► "View running in thread: request-1"
//!   ├─► signals.emit_from(User, POST_SAVE, ...)
//!   │     └─► "Signal handler running in thread: request-1"
//!   └─► compare ThreadIds
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example thread_affinity
//! ```

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use signalvisor::{Dispatcher, DispatcherConfig, Emission, EventKind, Saved, Sender};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct User {
    username: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let signals: Dispatcher<Saved<User>> = Dispatcher::new(DispatcherConfig::quiet());
    let handler_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));

    let seen = handler_thread.clone();
    signals.register_fn_for(
        EventKind::POST_SAVE,
        Sender::of::<User>(),
        "user_post_save",
        move |em: &Emission<'_, Saved<User>>| {
            println!("Signal handler running in thread: {}", em.thread_name());
            println!("Signal handler: User {} created", em.payload().instance.username);
            *seen.lock().unwrap_or_else(|e| e.into_inner()) = Some(em.thread_id());
            Ok(())
        },
    );

    let emitter = signals.clone();
    let view = thread::Builder::new()
        .name("request-1".to_string())
        .spawn(move || -> anyhow::Result<ThreadId> {
            let me = thread::current();
            println!("View running in thread: {}", me.name().unwrap_or("<unnamed>"));
            let user = User {
                username: format!("{}-user", me.name().unwrap_or("anon")),
            };
            emitter.emit_from(&Sender::of::<User>(), &EventKind::POST_SAVE, &Saved::created(user))?;
            Ok(me.id())
        })?;

    let view_thread = view
        .join()
        .map_err(|_| anyhow::anyhow!("view thread panicked"))??;
    let handler_thread = handler_thread.lock().unwrap_or_else(|e| e.into_inner()).take();

    println!(
        "Same thread: {}",
        handler_thread.is_some_and(|id| id == view_thread)
    );
    Ok(())
}
