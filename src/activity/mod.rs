//! Activity records and the broadcast bus that carries them.
//!
//! ## Contents
//! - [`ActivityKind`], [`Activity`] record classification and metadata
//! - [`Bus`] lazy, non-blocking publisher over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` (registry and dispatch), `Scope` (queue,
//!   commit, rollback), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the activity listener spawned by `DispatcherBuilder::build`,
//!   which fans records out to the configured subscribers.

mod bus;
mod record;

pub use bus::{ActivityReceiver, Bus};
pub use record::{Activity, ActivityKind};
