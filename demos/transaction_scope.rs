//! # Example: transaction_scope
//!
//! Emits inside a scope that may be rolled back. The immediate handler runs
//! (and prints) no matter what; the on-commit handler only runs if the scope
//! commits.
//!
//! ## Flow
//! ```text
//! dispatcher.atomic(|scope| {
//!     "Starting user creation process..."
//!     emit_in_from(scope, User, POST_SAVE) ─► user_post_save prints now
//!                                ─► send_welcome queued on scope
//!     "User creation process finished, but before committing transaction..."
//!     --fail ? Err(simulated) : Ok
//! })
//!   Ok  ─► commit   ─► send_welcome prints ─► "User created successfully!"
//!   Err ─► rollback ─► send_welcome dropped ─► "Transaction failed, user was not created!"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example transaction_scope
//! cargo run --example transaction_scope -- --fail
//! ```

use std::sync::{Arc, Mutex};

use signalvisor::{Dispatcher, DispatcherConfig, Emission, EventKind, Saved, Sender};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct User {
    username: String,
}

/// Stand-in for a table: rows written inside the scope, kept only on commit.
#[derive(Default)]
struct Users {
    rows: Mutex<Vec<User>>,
}

#[derive(Debug, thiserror::Error)]
#[error("Simulating an error to roll back the transaction")]
struct SimulatedFailure;

fn create_user(
    signals: &Dispatcher<Saved<User>>,
    users: &Arc<Users>,
    fail: bool,
) -> anyhow::Result<&'static str> {
    let outcome: anyhow::Result<()> = signals.atomic(|scope| {
        println!("Starting user creation process...");

        let user = User {
            username: format!("{}1", std::thread::current().name().unwrap_or("main")),
        };
        let rows = users.clone();
        let staged = user.clone();
        scope.on_success(move || {
            rows.rows
                .lock()
                .map_err(|_| anyhow::anyhow!("users table poisoned"))?
                .push(staged);
            Ok(())
        });
        signals.emit_in_from(
            scope,
            &Sender::of::<User>(),
            &EventKind::POST_SAVE,
            &Saved::created(user),
        )?;

        println!("User creation process finished, but before committing transaction...");
        if fail {
            return Err(SimulatedFailure.into());
        }
        Ok(())
    });

    match outcome {
        Ok(()) => Ok("User created successfully!"),
        Err(err) if err.is::<SimulatedFailure>() => {
            println!("Exception occurred: {err}");
            Ok("Transaction failed, user was not created!")
        }
        Err(err) => Err(err),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let fail = std::env::args().any(|a| a == "--fail");
    let signals: Dispatcher<Saved<User>> = Dispatcher::new(DispatcherConfig::quiet());
    let users = Arc::new(Users::default());

    signals.register_fn_for(
        EventKind::POST_SAVE,
        Sender::of::<User>(),
        "user_post_save",
        |em: &Emission<'_, Saved<User>>| {
            if em.payload().created {
                println!(
                    "Signal handler: User {} created (runs regardless of rollback)",
                    em.payload().instance.username
                );
            }
            Ok(())
        },
    );
    signals.register_fn_on_commit(
        EventKind::POST_SAVE,
        "send_welcome",
        |em: &Emission<'_, Saved<User>>| {
            println!(
                "On-commit handler: welcome mail to {}",
                em.payload().instance.username
            );
            Ok(())
        },
    );

    let response = create_user(&signals, &users, fail)?;
    println!("{response}");

    let stored = users.rows.lock().map(|rows| rows.len()).unwrap_or(0);
    println!("Users stored: {stored}");
    Ok(())
}
