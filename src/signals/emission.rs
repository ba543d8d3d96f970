//! # Emissions and payloads.
//!
//! An [`Emission`] is what a handler receives: the [`EventKind`], an optional
//! [`Sender`], a borrowed payload, a sequence number and the thread the
//! handler runs on. It lives
//! only for the duration of the dispatch call.
//!
//! ## Ordering
//! Every emission takes the next value of a process-wide counter (`seq`).
//! All handlers of one emission observe the same `seq`, including handlers
//! deferred to a scope commit.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::thread::{self, Thread, ThreadId};

use super::kind::EventKind;
use super::sender::Sender;

/// Global sequence counter for emissions.
static EMISSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fallback label for threads spawned without a name.
const UNNAMED_THREAD: &str = "<unnamed>";

/// One occurrence of an [`EventKind`] with its payload.
///
/// Handlers borrow the payload; nothing here outlives the dispatch call.
#[derive(Debug)]
pub struct Emission<'a, P> {
    kind: &'a EventKind,
    sender: Option<&'a Sender>,
    payload: &'a P,
    seq: u64,
    thread: Thread,
}

impl<'a, P> Emission<'a, P> {
    /// Creates an emission with the next sequence number, bound to the current thread.
    ///
    /// Useful for calling a handler directly in tests.
    pub fn new(kind: &'a EventKind, payload: &'a P) -> Self {
        Self::with_seq(kind, payload, next_seq())
    }

    /// Recreates an emission with a known sequence number on the current thread.
    pub(crate) fn with_seq(kind: &'a EventKind, payload: &'a P, seq: u64) -> Self {
        Self {
            kind,
            sender: None,
            payload,
            seq,
            thread: thread::current(),
        }
    }

    /// Attaches the sender the emission comes from.
    #[must_use]
    pub fn sent_by(mut self, sender: Option<&'a Sender>) -> Self {
        self.sender = sender;
        self
    }

    /// Kind of this emission.
    #[inline]
    pub fn kind(&self) -> &EventKind {
        self.kind
    }

    /// Sender of this emission, if the emitter named one.
    #[inline]
    pub fn sender(&self) -> Option<&Sender> {
        self.sender
    }

    /// Borrowed payload.
    #[inline]
    pub fn payload(&self) -> &P {
        self.payload
    }

    /// Monotonic sequence number shared by all handlers of this emission.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Identifier of the thread running the handler.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Name of the thread running the handler (`"<unnamed>"` if none).
    #[inline]
    pub fn thread_name(&self) -> &str {
        self.thread.name().unwrap_or(UNNAMED_THREAD)
    }
}

/// Allocates the next emission sequence number.
pub(crate) fn next_seq() -> u64 {
    EMISSION_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Payload of save signals: the written record plus whether it was newly created.
///
/// ## Example
/// ```rust
/// use signalvisor::Saved;
///
/// let saved = Saved::created("alice");
/// assert!(saved.created);
/// assert_eq!(saved.instance, "alice");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Saved<T> {
    /// The record that was written.
    pub instance: T,
    /// `true` when the write inserted a new record.
    pub created: bool,
}

impl<T> Saved<T> {
    /// Payload for a freshly inserted record.
    pub fn created(instance: T) -> Self {
        Self {
            instance,
            created: true,
        }
    }

    /// Payload for an update of an existing record.
    pub fn updated(instance: T) -> Self {
        Self {
            instance,
            created: false,
        }
    }
}
