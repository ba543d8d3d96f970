//! # Fan-out from the activity listener to subscriber workers.
//!
//! ```text
//! forward(rec)
//!   for each slot:
//!     rec is about this subscriber?   ─► skip
//!     interest does not match?        ─► skip
//!     try_send ─► Ok                  ─► worker ─► on_activity (panics caught)
//!               └ Full / Closed       ─► warn + SubscriberOverflow
//! ```
//!
//! Health records (`SubscriberPanicked`, `SubscriberOverflow`) never cause
//! further health records: an overflow while forwarding one is only logged,
//! and so is a panic while handling one. One failing subscriber therefore
//! produces at most one record per activity it failed on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::subscriber::{Interest, Subscribe};
use crate::activity::{Activity, Bus};

struct Slot {
    name: &'static str,
    interest: Interest,
    queue: mpsc::Sender<Arc<Activity>>,
}

/// Subscriber queues and their worker tasks.
pub(crate) struct SubscriberSet {
    slots: Vec<Slot>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber on the current Tokio runtime.
    pub(crate) fn spawn(subscribers: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Self {
        let (slots, workers): (Vec<Slot>, Vec<JoinHandle<()>>) = subscribers
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let slot = Slot {
                    name: sub.name(),
                    interest: sub.interest(),
                    queue,
                };
                (slot, tokio::spawn(work(sub, rx, bus.clone())))
            })
            .unzip();

        Self {
            slots,
            workers,
            bus: bus.clone(),
        }
    }

    /// Hands `rec` to every interested subscriber without waiting.
    pub(crate) fn forward(&self, rec: Arc<Activity>) {
        let about = rec.subscriber_health();

        for slot in &self.slots {
            if about == Some(slot.name) || !slot.interest.matches(&rec) {
                continue;
            }
            let reason = match slot.queue.try_send(Arc::clone(&rec)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            warn!(subscriber = slot.name, reason, activity = ?rec.kind, "activity dropped for subscriber");
            if about.is_none() {
                self.bus.publish(Activity::subscriber_overflow(slot.name, reason));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Closes every queue and waits until the workers have drained them.
    pub(crate) async fn shutdown(self) {
        drop(self.slots);
        for res in join_all(self.workers).await {
            if let Err(err) = res {
                warn!(error = %err, "subscriber worker ended abnormally");
            }
        }
        debug!("subscribers drained");
    }
}

async fn work(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Activity>>, bus: Bus) {
    while let Some(rec) = rx.recv().await {
        let handled = AssertUnwindSafe(sub.on_activity(&rec)).catch_unwind().await;
        let Err(payload) = handled else {
            continue;
        };

        let reason = panic_reason(payload.as_ref());
        warn!(subscriber = sub.name(), activity = ?rec.kind, %reason, "subscriber panicked");
        if rec.subscriber_health().is_none() {
            bus.publish(Activity::subscriber_panicked(sub.name(), reason));
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
