//! # signalvisor
//!
//! **signalvisor** is a small, synchronous, in-process signal dispatcher.
//!
//! Handlers are registered against an [`EventKind`]; emitting that kind calls
//! every handler **in registration order, on the emitting thread, before
//! `emit` returns**. A failing handler halts the emission and its error reaches
//! the emitter unchanged. Handlers know nothing about the emitter's unit of
//! work unless they opt in to [`Delivery::OnCommit`], in which case they are
//! queued on an explicit [`Scope`] and run only if it commits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   emitter thread
//!   ──────────────────────────────────────────────────────────────────────
//!   scope = dispatcher.scope()
//!   dispatcher.emit_in(&scope, &POST_SAVE, &payload)
//!        │
//!        ├─► Registry snapshot: [h1 Immediate, h2 OnCommit, h3 Immediate]
//!        ├─► h1.handle(&emission)          (same thread, blocks emitter)
//!        ├─► scope.on_success(h2 + payload clone)
//!        └─► h3.handle(&emission)          (same thread, blocks emitter)
//!   scope.commit()   ─► h2.handle(&emission)
//!   scope.rollback() ─► h2 dropped; h1 and h3 already ran
//!   ──────────────────────────────────────────────────────────────────────
//!        │ publish(Activity)  (non-blocking, optional)
//!        ▼
//! ┌──────────────────────────────┐    ┌──────────────────────────────────┐
//! │  Bus (broadcast channel)     │───►│ activity listener ─► SubscriberSet│
//! └──────────────────────────────┘    │   worker1  worker2  ...  workerN │
//!                                     │   LogWriter Metrics      Custom  │
//!                                     └──────────────────────────────────┘
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Dispatch**      | Synchronous, ordered, fail-fast delivery.                    | [`Dispatcher`], [`EventKind`], [`Emission`] |
//! | **Handlers**      | Trait or closure handlers with removable registrations.      | [`Handler`], [`HandlerFn`], [`HandlerId`]  |
//! | **Senders**       | Handlers bound to one emission origin.                       | [`Sender`]                                 |
//! | **Scopes**        | Commit-deferred callbacks, savepoints, `atomic` helpers.     | [`Scope`], [`Delivery`]                    |
//! | **Observability** | Activity records fanned out to async subscribers.            | [`Bus`], [`Activity`], [`Subscribe`], [`Interest`] |
//! | **Errors**        | Typed errors that keep the handler's own error intact.       | [`DispatchError`]                          |
//! | **Configuration** | Bus capacity and slow-handler threshold.                     | [`DispatcherConfig`]                       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber that renders activity through `tracing`.
//!
//! ## Example
//! ```rust
//! use signalvisor::{Dispatcher, DispatcherConfig, EventKind, Saved};
//!
//! # fn main() -> anyhow::Result<()> {
//! let signals: Dispatcher<Saved<String>> = Dispatcher::new(DispatcherConfig::default());
//!
//! signals.register_fn(EventKind::POST_SAVE, "greet", |em| {
//!     println!("handler on {}: {} created={}", em.thread_name(), em.payload().instance, em.payload().created);
//!     Ok(())
//! });
//! signals.register_fn_on_commit(EventKind::POST_SAVE, "welcome-mail", |em| {
//!     println!("mail to {}", em.payload().instance);
//!     Ok(())
//! });
//!
//! let res: anyhow::Result<()> = signals.atomic(|scope| {
//!     signals.emit_in(scope, &EventKind::POST_SAVE, &Saved::created("alice".into()))?;
//!     anyhow::bail!("simulating an error to roll back the transaction");
//! });
//! // "greet" already ran; "welcome-mail" never will.
//! assert!(res.is_err());
//! # Ok(())
//! # }
//! ```

mod activity;
mod dispatch;
mod error;
mod scope;
mod signals;
mod subscribers;

// ---- Public re-exports ----

pub use activity::{Activity, ActivityKind, ActivityReceiver, Bus};
pub use dispatch::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatchError;
pub use scope::{Callback, Scope};
pub use signals::{
    Delivery, Emission, EventKind, Handler, HandlerFn, HandlerId, HandlerOutcome, HandlerRef,
    Saved, Sender,
};
pub use subscribers::{Interest, Subscribe};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
