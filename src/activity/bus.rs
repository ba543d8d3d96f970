//! # Activity bus.
//!
//! [`Bus`] carries [`Activity`] records from the dispatch path to whoever
//! listens. Publishing is synchronous and never waits: dispatch runs on plain
//! threads, often with no async runtime at all.
//!
//! ```text
//! Dispatcher::emit ──┐
//! Scope::commit    ──┼─ publish_with(|| rec) ─► broadcast ring ─► listener(s)
//! subscriber worker ─┘      (skipped if nobody listens)
//! ```
//!
//! Records are built lazily: with no receivers attached, `publish_with` does
//! not construct the record, so an unobserved dispatcher pays one atomic load
//! per step. Receivers that fall more than `capacity` records behind see
//! `RecvError::Lagged` and skip ahead.

use tokio::sync::broadcast;

use super::record::Activity;

/// Receiving end of a [`Bus`].
pub type ActivityReceiver = broadcast::Receiver<Activity>;

/// Broadcast channel for activity records. Clones share the channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Activity>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` undelivered records (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `rec`; returns how many receivers will see it.
    pub fn publish(&self, rec: Activity) -> usize {
        self.tx.send(rec).unwrap_or(0)
    }

    /// Builds and publishes a record only if someone is listening.
    pub fn publish_with(&self, rec: impl FnOnce() -> Activity) {
        if self.is_observed() {
            self.publish(rec());
        }
    }

    /// Attaches a receiver that sees records published from now on.
    pub fn subscribe(&self) -> ActivityReceiver {
        self.tx.subscribe()
    }

    /// True if at least one receiver is attached.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;

    #[test]
    fn unobserved_bus_skips_record_construction() {
        let bus = Bus::new(0);
        assert!(!bus.is_observed());
        bus.publish_with(|| panic!("record built without receivers"));
        assert_eq!(bus.publish(Activity::new(ActivityKind::EmissionStarted)), 0);
    }

    #[test]
    fn receivers_see_records_in_order() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        assert!(bus.is_observed());

        bus.publish_with(|| Activity::new(ActivityKind::EmissionStarted));
        assert_eq!(bus.publish(Activity::new(ActivityKind::EmissionFinished)), 1);

        assert_eq!(rx.try_recv().unwrap().kind, ActivityKind::EmissionStarted);
        assert_eq!(rx.try_recv().unwrap().kind, ActivityKind::EmissionFinished);
        assert!(rx.try_recv().is_err());
    }
}
