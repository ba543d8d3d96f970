//! # Activity subscribers.
//!
//! A [`Subscribe`] implementation watches dispatch from the side: it gets
//! [`Activity`] records on its own worker task, after the emission that caused
//! them has already moved on. It declares an [`Interest`] so it only receives
//! the records it cares about (one signal, or a few kinds).
//!
//! ```text
//! listener ─► Interest::matches(rec)? ─► [queue] ─► worker ─► on_activity(rec)
//!                 │ no                      │ full
//!                 └─► skipped               └─► dropped, SubscriberOverflow
//! ```
//!
//! A subscriber never receives health records about itself, and a panic while
//! handling another subscriber's health record is logged but not re-published.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use signalvisor::{Activity, ActivityKind, Interest, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_activity(&self, rec: &Activity) {
//!         // export a metric, etc.
//!         let _ = rec.handler.as_deref();
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//!
//!     fn interest(&self) -> Interest {
//!         Interest::Kinds(&[ActivityKind::HandlerFailed, ActivityKind::CallbackFailed])
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::activity::{Activity, ActivityKind};
use crate::signals::EventKind;

/// Which records a subscriber wants.
#[derive(Clone, Debug, Default)]
pub enum Interest {
    /// Every record.
    #[default]
    All,
    /// Records about one signal kind (registrations, emissions, queued callbacks).
    Signal(EventKind),
    /// Records of the listed kinds.
    Kinds(&'static [ActivityKind]),
}

impl Interest {
    /// True if `rec` should be delivered.
    pub fn matches(&self, rec: &Activity) -> bool {
        match self {
            Interest::All => true,
            Interest::Signal(kind) => rec.signal.as_ref() == Some(kind),
            Interest::Kinds(kinds) => kinds.contains(&rec.kind),
        }
    }
}

/// Observer of dispatcher activity.
///
/// `on_activity` runs on a Tokio worker, one record at a time in publish
/// order. Blocking in it only backs up this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one record.
    async fn on_activity(&self, rec: &Activity);

    /// Name used in logs and in `SubscriberPanicked` / `SubscriberOverflow` records.
    fn name(&self) -> &'static str;

    /// Records this subscriber receives. Default: all of them.
    fn interest(&self) -> Interest {
        Interest::All
    }

    /// Records buffered before new ones are dropped (at least 1). Default: 256.
    fn queue_capacity(&self) -> usize {
        256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_by_signal_and_kind() {
        let saved = Activity::new(ActivityKind::EmissionStarted).with_signal(EventKind::POST_SAVE);
        let deleted =
            Activity::new(ActivityKind::EmissionStarted).with_signal(EventKind::POST_DELETE);
        let commit = Activity::new(ActivityKind::ScopeCommitted);

        assert!(Interest::All.matches(&commit));

        let post_save = Interest::Signal(EventKind::POST_SAVE);
        assert!(post_save.matches(&saved));
        assert!(!post_save.matches(&deleted));
        assert!(!post_save.matches(&commit));

        let scopes = Interest::Kinds(&[ActivityKind::ScopeCommitted, ActivityKind::ScopeRolledBack]);
        assert!(scopes.matches(&commit));
        assert!(!scopes.matches(&saved));
    }
}
