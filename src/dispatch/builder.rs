//! # Dispatcher builder and activity listener.
//!
//! The builder wires the optional observability side of a dispatcher:
//!
//! ```text
//! DispatcherBuilder::build()
//!   ├─► Bus::new(cfg.bus_capacity)                 (if enabled)
//!   ├─► SubscriberSet::spawn(subscribers, &bus)    (if any subscribers)
//!   └─► spawn activity listener:
//!         loop {
//!           select! {
//!             token.cancelled() => drain what is already published, break
//!             rx.recv()         => SubscriberSet::forward
//!           }
//!         }
//!         SubscriberSet::shutdown().await
//! ```
//!
//! Dispatch itself never touches the listener; records travel through the bus.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;
use crate::activity::Bus;
use crate::error::DispatchError;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Dispatcher`] with activity subscribers.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use signalvisor::{Activity, Dispatcher, DispatcherConfig, EventKind, Subscribe};
///
/// struct Quiet;
///
/// #[async_trait]
/// impl Subscribe for Quiet {
///     async fn on_activity(&self, _rec: &Activity) {}
///     fn name(&self) -> &'static str { "quiet" }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), signalvisor::DispatchError> {
/// let signals = Dispatcher::<u32>::builder(DispatcherConfig::default())
///     .with_subscriber(Arc::new(Quiet))
///     .build()?;
///
/// signals.emit(&EventKind::new("tick"), &1)?;
/// signals.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct DispatcherBuilder<P> {
    cfg: DispatcherConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    _payload: PhantomData<fn(&P)>,
}

impl<P> DispatcherBuilder<P>
where
    P: Send + Sync + 'static,
{
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            _payload: PhantomData,
        }
    }

    /// Sets activity subscribers (replaces any added before).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one activity subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the dispatcher.
    ///
    /// With subscribers this spawns workers and must run inside a Tokio runtime,
    /// otherwise [`DispatchError::NoRuntime`] is returned. Subscribers are
    /// ignored (with a warning) when the bus is disabled.
    pub fn build(self) -> Result<Dispatcher<P>, DispatchError> {
        let bus = self
            .cfg
            .bus_enabled()
            .then(|| Bus::new(self.cfg.bus_capacity));

        let observers = match (&bus, self.subscribers.is_empty()) {
            (Some(bus), false) => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(DispatchError::NoRuntime);
                }
                Some(Observers::spawn(bus.clone(), self.subscribers))
            }
            (None, false) => {
                tracing::warn!(
                    subscribers = self.subscribers.len(),
                    "activity bus disabled; subscribers ignored"
                );
                None
            }
            (_, true) => None,
        };

        Ok(Dispatcher::from_parts(self.cfg, bus, observers))
    }
}

/// Running activity listener and its stop token.
pub(crate) struct Observers {
    token: CancellationToken,
    listener: JoinHandle<()>,
}

impl Observers {
    fn spawn(bus: Bus, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        // Subscribe before returning so no record published after build is missed.
        let mut rx = bus.subscribe();
        let set = SubscriberSet::spawn(subscribers, &bus);
        tracing::debug!(subscribers = set.len(), "activity listener started");
        let token = CancellationToken::new();
        let stop = token.clone();

        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(rec) => set.forward(Arc::new(rec)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "activity listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            loop {
                match rx.try_recv() {
                    Ok(rec) => set.forward(Arc::new(rec)),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        });

        Self { token, listener }
    }

    /// Cancels the listener and waits for subscribers to drain.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        if let Err(err) = self.listener.await {
            tracing::warn!(error = %err, "activity listener ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityKind};
    use crate::signals::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        kinds: Mutex<Vec<ActivityKind>>,
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_activity(&self, rec: &Activity) {
            self.kinds.lock().unwrap().push(rec.kind);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Panicker {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl Panicker {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_activity(&self, _rec: &Activity) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("{} always fails", self.name);
        }
        fn name(&self) -> &'static str {
            self.name
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn subscribers_require_a_runtime() {
        let res = Dispatcher::<u32>::builder(DispatcherConfig::default())
            .with_subscriber(Arc::new(Collect::default()))
            .build();
        assert!(matches!(res, Err(DispatchError::NoRuntime)));
    }

    #[test]
    fn no_subscribers_needs_no_runtime() {
        let d = Dispatcher::<u32>::builder(DispatcherConfig::default())
            .build()
            .unwrap();
        assert!(d.bus().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_activity_after_shutdown_drain() {
        let collect = Arc::new(Collect::default());
        let d = Dispatcher::<u32>::builder(DispatcherConfig::default())
            .with_subscriber(collect.clone())
            .build()
            .unwrap();

        let kind = EventKind::new("tick");
        d.register_fn(kind.clone(), "noop", |_| Ok(()));
        d.emit(&kind, &1).unwrap();
        d.shutdown().await;

        assert_eq!(
            *collect.kinds.lock().unwrap(),
            [
                ActivityKind::HandlerRegistered,
                ActivityKind::EmissionStarted,
                ActivityKind::HandlerReturned,
                ActivityKind::EmissionFinished,
            ]
        );
    }

    #[tokio::test]
    async fn disabled_bus_ignores_subscribers() {
        let d = Dispatcher::<u32>::builder(DispatcherConfig::quiet())
            .with_subscriber(Arc::new(Collect::default()))
            .build()
            .unwrap();
        assert!(d.bus().is_none());
        d.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported_once_per_record() {
        let panicker = Panicker::new("panicker");
        let collect = Arc::new(Collect::default());
        let d = Dispatcher::<u32>::builder(DispatcherConfig::default())
            .with_subscriber(panicker.clone())
            .with_subscriber(collect.clone())
            .build()
            .unwrap();

        d.register_fn(EventKind::new("tick"), "noop", |_| Ok(()));
        wait_until(|| collect.kinds.lock().unwrap().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        d.shutdown().await;

        assert_eq!(panicker.calls(), 1);
        assert_eq!(
            *collect.kinds.lock().unwrap(),
            [ActivityKind::HandlerRegistered, ActivityKind::SubscriberPanicked]
        );
    }

    #[tokio::test]
    async fn two_panicking_subscribers_do_not_feed_each_other() {
        let a = Panicker::new("a");
        let b = Panicker::new("b");
        let d = Dispatcher::<u32>::builder(DispatcherConfig::default())
            .with_subscriber(a.clone())
            .with_subscriber(b.clone())
            .build()
            .unwrap();

        d.register_fn(EventKind::new("tick"), "noop", |_| Ok(()));
        wait_until(|| a.calls() >= 2 && b.calls() >= 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        d.shutdown().await;

        // The registration record, then the other subscriber's panic report.
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 2);
    }
}
