//! # Handler abstraction.
//!
//! A [`Handler`] is a named, synchronous callable registered against one
//! [`EventKind`](crate::EventKind). The shared handle type is [`HandlerRef`].
//!
//! Handlers run on the emitting thread and block the emitter until they
//! return. Errors are returned as [`anyhow::Error`] so that any error type
//! reaches the emitter unchanged.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::emission::Emission;

/// Global counter for handler ids.
static HANDLER_SEQ: AtomicU64 = AtomicU64::new(1);

/// # Synchronous signal handler.
///
/// # Example
/// ```
/// use signalvisor::{Emission, Handler, Saved};
///
/// struct Welcome;
///
/// impl Handler<Saved<String>> for Welcome {
///     fn name(&self) -> &str { "welcome" }
///
///     fn handle(&self, em: &Emission<'_, Saved<String>>) -> anyhow::Result<()> {
///         if em.payload().created {
///             println!("welcome, {}", em.payload().instance);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Handler<P>: Send + Sync + 'static {
    /// Returns a stable, human-readable handler name (used in logs and errors).
    fn name(&self) -> &str;

    /// Handles one emission.
    ///
    /// Returning `Err` halts the emission: later handlers are skipped and the
    /// error propagates to the emitter.
    fn handle(&self, emission: &Emission<'_, P>) -> anyhow::Result<()>;
}

/// Shared handle to a handler.
pub type HandlerRef<P> = Arc<dyn Handler<P>>;

/// Token returned by registration; pass it to
/// [`Dispatcher::unregister`](crate::Dispatcher::unregister) to remove the handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(HANDLER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric value (process-unique).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// When a registered handler runs relative to the emitter's scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Invoked inside `emit`, before it returns.
    #[default]
    Immediate,
    /// Queued on the scope passed to `emit_in` and invoked only after it commits.
    ///
    /// Without a scope (plain `emit`) the handler runs immediately.
    OnCommit,
}

/// Result of one handler invocation during a robust emission.
#[derive(Debug)]
pub struct HandlerOutcome {
    /// Registration token of the handler.
    pub id: HandlerId,
    /// Handler name.
    pub handler: Arc<str>,
    /// What the handler returned.
    pub result: anyhow::Result<()>,
}

impl HandlerOutcome {
    /// True if the handler returned `Ok`.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
