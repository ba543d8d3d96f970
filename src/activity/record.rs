//! # Activity records published by the dispatcher and scopes.
//!
//! The [`ActivityKind`] enum classifies records across three categories:
//! - **Registry activity**: handlers added and removed
//! - **Dispatch activity**: emission flow (started, handler returned/failed, finished)
//! - **Scope activity**: callbacks queued, committed, rolled back
//!
//! Subscriber workers add their own records (panic, overflow).
//!
//! Activity is purely diagnostic: nothing in dispatch or commit depends on it.
//!
//! ## Ordering guarantees
//! Each record has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when records are delivered out of order.
//!
//! ## Example
//! ```rust
//! use signalvisor::{Activity, ActivityKind, EventKind};
//!
//! let rec = Activity::new(ActivityKind::HandlerFailed)
//!     .with_signal(EventKind::new("created"))
//!     .with_handler("audit")
//!     .with_reason("boom");
//!
//! assert_eq!(rec.kind, ActivityKind::HandlerFailed);
//! assert_eq!(rec.handler.as_deref(), Some("audit"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::signals::{EventKind, Sender};

/// Global sequence counter for activity ordering.
static ACTIVITY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of activity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    // === Subscriber activity ===
    /// Subscriber panicked while processing a record.
    ///
    /// Sets: `handler` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped a record (queue full or worker closed).
    ///
    /// Sets: `handler` (subscriber name), `reason` (`"full"` / `"closed"`).
    SubscriberOverflow,

    // === Registry activity ===
    /// Handler registered.
    ///
    /// Sets: `signal`, `sender` (if sender-scoped), `handler`, `handler_id`.
    HandlerRegistered,

    /// Handler removed.
    ///
    /// Sets: `signal`, `handler`, `handler_id`.
    HandlerUnregistered,

    // === Dispatch activity ===
    /// `emit` started.
    ///
    /// Sets: `signal`, `sender` (if any), `emission`, `thread`, `count` (handlers matching the sender).
    EmissionStarted,

    /// Handler returned `Ok`.
    ///
    /// Sets: `signal`, `emission`, `handler`, `thread`, `elapsed_ms`.
    HandlerReturned,

    /// Handler returned `Err`; dispatch halted (or continued, for robust emissions).
    ///
    /// Sets: `signal`, `emission`, `handler`, `thread`, `elapsed_ms`, `reason`.
    HandlerFailed,

    /// Handler ran longer than the configured slow-handler threshold.
    ///
    /// Sets: `signal`, `emission`, `handler`, `elapsed_ms`.
    SlowHandler,

    /// `emit` returned.
    ///
    /// Sets: `signal`, `emission`, `count` (handlers invoked immediately).
    EmissionFinished,

    // === Scope activity ===
    /// On-commit handler queued on a scope.
    ///
    /// Sets: `signal`, `emission`, `handler`, `scope`.
    CallbackQueued,

    /// Root scope committed and its callbacks ran.
    ///
    /// Sets: `scope`, `count` (callbacks run).
    ScopeCommitted,

    /// Savepoint committed; callbacks handed to the parent scope.
    ///
    /// Sets: `scope`, `count` (callbacks handed over).
    SavepointReleased,

    /// Scope rolled back; callbacks discarded.
    ///
    /// Sets: `scope`, `count` (callbacks discarded).
    ScopeRolledBack,

    /// On-success callback failed during commit.
    ///
    /// Sets: `scope`, `count` (callbacks discarded after the failure), `reason`.
    CallbackFailed,
}

/// Activity record with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`ActivityKind`]
#[derive(Clone, Debug)]
pub struct Activity {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Record classification.
    pub kind: ActivityKind,

    /// Signal kind involved, if applicable.
    pub signal: Option<EventKind>,
    /// Sender of the emission, or the sender a handler is bound to.
    pub sender: Option<Sender>,
    /// Emission sequence number, if applicable.
    pub emission: Option<u64>,
    /// Handler (or subscriber) name.
    pub handler: Option<Arc<str>>,
    /// Raw handler id.
    pub handler_id: Option<u64>,
    /// Scope id.
    pub scope: Option<u64>,
    /// Name of the thread the activity happened on.
    pub thread: Option<Arc<str>>,
    /// Elapsed time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Count whose meaning depends on the kind.
    pub count: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Activity {
    /// Creates a new record of the given kind with current timestamp and next sequence number.
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            seq: ACTIVITY_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            signal: None,
            sender: None,
            emission: None,
            handler: None,
            handler_id: None,
            scope: None,
            thread: None,
            elapsed_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches the signal kind.
    #[inline]
    pub fn with_signal(mut self, kind: EventKind) -> Self {
        self.signal = Some(kind);
        self
    }

    /// Attaches a sender (no-op for `None`).
    #[inline]
    pub fn with_sender(mut self, sender: Option<Sender>) -> Self {
        self.sender = sender;
        self
    }

    /// Attaches an emission sequence number.
    #[inline]
    pub fn with_emission(mut self, seq: u64) -> Self {
        self.emission = Some(seq);
        self
    }

    /// Attaches a handler or subscriber name.
    #[inline]
    pub fn with_handler(mut self, name: impl Into<Arc<str>>) -> Self {
        self.handler = Some(name.into());
        self
    }

    /// Attaches a raw handler id.
    #[inline]
    pub fn with_handler_id(mut self, id: u64) -> Self {
        self.handler_id = Some(id);
        self
    }

    /// Attaches a scope id.
    #[inline]
    pub fn with_scope(mut self, id: u64) -> Self {
        self.scope = Some(id);
        self
    }

    /// Attaches a thread name.
    #[inline]
    pub fn with_thread(mut self, name: impl Into<Arc<str>>) -> Self {
        self.thread = Some(name.into());
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Attaches a count (saturated to `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow record.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Activity::new(ActivityKind::SubscriberOverflow)
            .with_handler(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic record.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Activity::new(ActivityKind::SubscriberPanicked)
            .with_handler(subscriber)
            .with_reason(info)
    }

    /// Name of the subscriber this record reports on, for `SubscriberPanicked`
    /// and `SubscriberOverflow`; `None` for every other kind.
    pub fn subscriber_health(&self) -> Option<&str> {
        match self.kind {
            ActivityKind::SubscriberPanicked | ActivityKind::SubscriberOverflow => {
                self.handler.as_deref()
            }
            _ => None,
        }
    }
}
