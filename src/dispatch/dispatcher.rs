//! # Dispatcher: synchronous, in-order signal delivery.
//!
//! [`Dispatcher`] maps each [`EventKind`] to an ordered list of handlers and
//! invokes them **synchronously**, in registration order, on the thread that
//! calls `emit`.
//!
//! ## Emission flow
//! ```text
//! emit(kind, &payload) / emit_from(&sender, kind, &payload)
//!   ├─► snapshot handlers for kind (lock released before any call)
//!   ├─► publish EmissionStarted
//!   ├─► for entry in snapshot (registration order):
//!   │     ├─ bound to another sender ─► skipped
//!   │     ├─ Immediate             ─► handler.handle(&emission)
//!   │     ├─ OnCommit, no scope    ─► handler.handle(&emission)
//!   │     ├─ OnCommit, emit_in     ─► scope.on_success(clone payload, call later)
//!   │     ├─ Ok  ─► publish HandlerReturned (+ SlowHandler if over threshold)
//!   │     └─ Err ─► publish HandlerFailed, return DispatchError::Handler (halt)
//!   └─► publish EmissionFinished, return number of handlers invoked
//! ```
//!
//! ## Rules
//! - `emit` returns only after every handler returned or one failed.
//! - Handlers run on the caller's thread; nothing is spawned.
//! - The dispatcher never commits or rolls back anything: a scope passed to
//!   `emit_in` only receives on-commit handlers.
//! - Panics unwind through `emit` unchanged.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::builder::{DispatcherBuilder, Observers};
use super::config::DispatcherConfig;
use super::registry::{Binding, Entry, Inserted, Registry};
use crate::activity::{Activity, ActivityKind, Bus};
use crate::error::DispatchError;
use crate::scope::Scope;
use crate::signals::{
    Delivery, Emission, EventKind, Handler, HandlerId, HandlerOutcome, HandlerRef, Sender,
    next_seq,
};

/// Process-local signal dispatcher.
///
/// Cheap to clone: clones share the same registry and activity bus.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use signalvisor::{Dispatcher, DispatcherConfig, EventKind, Saved};
///
/// let signals: Dispatcher<Saved<String>> = Dispatcher::new(DispatcherConfig::default());
/// let calls = Arc::new(AtomicUsize::new(0));
///
/// let c = calls.clone();
/// signals.register_fn(EventKind::POST_SAVE, "count", move |em| {
///     if em.payload().created {
///         c.fetch_add(1, Ordering::SeqCst);
///     }
///     Ok(())
/// });
///
/// let invoked = signals.emit(&EventKind::POST_SAVE, &Saved::created("alice".to_string())).unwrap();
/// assert_eq!(invoked, 1);
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct Dispatcher<P> {
    inner: Arc<Inner<P>>,
}

struct Inner<P> {
    cfg: DispatcherConfig,
    registry: Registry<P>,
    bus: Option<Bus>,
    observers: Mutex<Option<Observers>>,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: 'static> std::fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cfg", &self.inner.cfg)
            .field("kinds", &self.inner.registry.kinds())
            .finish_non_exhaustive()
    }
}

impl<P> Default for Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl<P> Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    /// Creates a dispatcher without subscribers.
    ///
    /// The activity bus (if enabled) is still available through [`Dispatcher::bus`].
    #[must_use]
    pub fn new(cfg: DispatcherConfig) -> Self {
        let bus = cfg.bus_enabled().then(|| Bus::new(cfg.bus_capacity));
        Self::from_parts(cfg, bus, None)
    }

    /// Returns a builder for attaching activity subscribers.
    pub fn builder(cfg: DispatcherConfig) -> DispatcherBuilder<P> {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: DispatcherConfig,
        bus: Option<Bus>,
        observers: Option<Observers>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                registry: Registry::new(),
                bus,
                observers: Mutex::new(observers),
            }),
        }
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `handler` under `kind`; it runs inside `emit`.
    pub fn register(&self, kind: EventKind, handler: HandlerRef<P>) -> HandlerId {
        self.insert(kind, Binding::default(), handler)
    }

    /// Registers `handler` under `kind` for emissions from `sender` only.
    ///
    /// Emissions from other senders, or without a sender, skip it.
    pub fn register_for(&self, kind: EventKind, sender: Sender, handler: HandlerRef<P>) -> HandlerId {
        self.insert(kind, Binding::default().sender(sender), handler)
    }

    /// Registers `handler` under `kind` to run only once the emitter's scope commits.
    ///
    /// When emitted through plain [`emit`](Self::emit) (no scope) it runs immediately.
    pub fn register_on_commit(&self, kind: EventKind, handler: HandlerRef<P>) -> HandlerId {
        self.insert(kind, Binding::on_commit(), handler)
    }

    /// Sender-scoped variant of [`register_on_commit`](Self::register_on_commit).
    pub fn register_on_commit_for(
        &self,
        kind: EventKind,
        sender: Sender,
        handler: HandlerRef<P>,
    ) -> HandlerId {
        self.insert(kind, Binding::on_commit().sender(sender), handler)
    }

    /// Registers `handler` once per `(kind, uid)`.
    ///
    /// A repeated registration with the same key returns the first id and adds nothing.
    pub fn register_unique(
        &self,
        kind: EventKind,
        uid: impl Into<Arc<str>>,
        handler: HandlerRef<P>,
    ) -> HandlerId {
        self.insert(kind, Binding::default().uid(uid.into()), handler)
    }

    /// Registers a closure under `kind` (see [`HandlerFn`](crate::HandlerFn)).
    pub fn register_fn<F>(&self, kind: EventKind, name: &'static str, f: F) -> HandlerId
    where
        F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, crate::signals::HandlerFn::arc::<P>(name, f))
    }

    /// Registers a closure under `kind` for emissions from `sender` only.
    pub fn register_fn_for<F>(
        &self,
        kind: EventKind,
        sender: Sender,
        name: &'static str,
        f: F,
    ) -> HandlerId
    where
        F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_for(kind, sender, crate::signals::HandlerFn::arc::<P>(name, f))
    }

    /// Registers a closure under `kind` with on-commit delivery.
    pub fn register_fn_on_commit<F>(&self, kind: EventKind, name: &'static str, f: F) -> HandlerId
    where
        F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_on_commit(kind, crate::signals::HandlerFn::arc::<P>(name, f))
    }

    /// Removes a handler. Returns `false` if the id is unknown (already removed).
    ///
    /// An emission already in flight still invokes the removed handler.
    pub fn unregister(&self, id: HandlerId) -> bool {
        match self.inner.registry.remove(id) {
            Some((kind, name)) => {
                debug!(signal = %kind, handler = %name, %id, "handler unregistered");
                self.publish(|| {
                    Activity::new(ActivityKind::HandlerUnregistered)
                        .with_signal(kind)
                        .with_handler(name)
                        .with_handler_id(id.get())
                });
                true
            }
            None => false,
        }
    }

    /// True if at least one handler is registered for `kind`.
    pub fn has_handlers(&self, kind: &EventKind) -> bool {
        self.inner.registry.count(kind) > 0
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: &EventKind) -> usize {
        self.inner.registry.count(kind)
    }

    /// Sorted list of kinds with at least one handler.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.inner.registry.kinds()
    }

    fn insert(&self, kind: EventKind, binding: Binding, handler: HandlerRef<P>) -> HandlerId {
        let name = handler.name().to_owned();
        let delivery = binding.delivery;
        let sender = binding.sender.clone();
        match self.inner.registry.insert(&kind, binding, handler) {
            Inserted::New(id) => {
                debug!(signal = %kind, handler = %name, %id, ?delivery, sender = ?sender, "handler registered");
                self.publish(|| {
                    Activity::new(ActivityKind::HandlerRegistered)
                        .with_signal(kind)
                        .with_sender(sender)
                        .with_handler(name)
                        .with_handler_id(id.get())
                });
                id
            }
            Inserted::Existing(id) => {
                trace!(signal = %kind, handler = %name, %id, "duplicate uid; registration skipped");
                id
            }
        }
    }

    // ---------------------------
    // Emission
    // ---------------------------

    /// Invokes every handler registered for `kind`, in order, on this thread.
    ///
    /// Returns the number of handlers invoked. The first failing handler halts
    /// dispatch and its error is returned as [`DispatchError::Handler`].
    pub fn emit(&self, kind: &EventKind, payload: &P) -> Result<usize, DispatchError> {
        self.dispatch(None, kind, payload, |_, _| false)
    }

    /// Like [`emit`](Self::emit), naming the sender the emission comes from.
    ///
    /// Handlers bound to a different sender are skipped.
    pub fn emit_from(
        &self,
        sender: &Sender,
        kind: &EventKind,
        payload: &P,
    ) -> Result<usize, DispatchError> {
        self.dispatch(Some(sender), kind, payload, |_, _| false)
    }

    /// Like [`emit`](Self::emit), but on-commit handlers are queued on `scope`.
    ///
    /// Immediate handlers still run now, whatever later happens to `scope`.
    /// Returns the number of handlers invoked immediately.
    pub fn emit_in(
        &self,
        scope: &Scope<'_>,
        kind: &EventKind,
        payload: &P,
    ) -> Result<usize, DispatchError>
    where
        P: Clone,
    {
        self.scoped(scope, None, kind, payload)
    }

    /// [`emit_in`](Self::emit_in) with a sender.
    pub fn emit_in_from(
        &self,
        scope: &Scope<'_>,
        sender: &Sender,
        kind: &EventKind,
        payload: &P,
    ) -> Result<usize, DispatchError>
    where
        P: Clone,
    {
        self.scoped(scope, Some(sender), kind, payload)
    }

    /// Invokes every handler for `kind` even if some fail, reporting each result.
    ///
    /// On-commit handlers run immediately, as with [`emit`](Self::emit).
    pub fn emit_robust(&self, kind: &EventKind, payload: &P) -> Vec<HandlerOutcome> {
        let Some(entries) = self.inner.registry.snapshot(kind) else {
            return Vec::new();
        };
        let emission = Emission::with_seq(kind, payload, next_seq());
        let matching = entries.iter().filter(|e| e.accepts(None));
        self.started(kind, &emission, matching.clone().count());

        let outcomes: Vec<HandlerOutcome> = matching
            .map(|entry| HandlerOutcome {
                id: entry.id,
                handler: Arc::clone(&entry.name),
                result: self.invoke(entry, &emission),
            })
            .collect();

        self.finished(kind, &emission, outcomes.len());
        outcomes
    }

    /// Begins a root scope wired to this dispatcher's activity bus.
    #[must_use]
    pub fn scope(&self) -> Scope<'static> {
        Scope::root(self.inner.bus.clone())
    }

    /// Runs `f` inside [`Dispatcher::scope`]: commit on `Ok`, roll back on `Err`.
    pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Scope<'static>) -> Result<T, E>,
        E: From<DispatchError>,
    {
        self.scope().run(f)
    }

    /// Activity bus, if enabled.
    pub fn bus(&self) -> Option<&Bus> {
        self.inner.bus.as_ref()
    }

    /// Configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.cfg
    }

    /// Stops the activity listener after it forwards every record already published,
    /// then waits for subscriber workers to drain their queues.
    ///
    /// Dispatch keeps working afterwards; activity is simply no longer observed.
    pub async fn shutdown(&self) {
        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(observers) = observers {
            observers.stop().await;
        }
    }

    // ---------------------------
    // Internals
    // ---------------------------

    fn scoped(
        &self,
        scope: &Scope<'_>,
        sender: Option<&Sender>,
        kind: &EventKind,
        payload: &P,
    ) -> Result<usize, DispatchError>
    where
        P: Clone,
    {
        self.dispatch(sender, kind, payload, |entry, seq| {
            if entry.delivery != Delivery::OnCommit {
                return false;
            }
            self.defer(scope, entry, sender, kind, payload, seq);
            true
        })
    }

    /// Shared emission loop; `defer` returns `true` when it took care of an entry.
    fn dispatch<D>(
        &self,
        sender: Option<&Sender>,
        kind: &EventKind,
        payload: &P,
        mut defer: D,
    ) -> Result<usize, DispatchError>
    where
        D: FnMut(&Entry<P>, u64) -> bool,
    {
        let Some(entries) = self.inner.registry.snapshot(kind) else {
            trace!(signal = %kind, "no handlers");
            return Ok(0);
        };
        let emission = Emission::with_seq(kind, payload, next_seq()).sent_by(sender);
        let matching = entries.iter().filter(|e| e.accepts(sender));
        self.started(kind, &emission, matching.clone().count());

        let mut invoked = 0;
        for entry in matching {
            if defer(entry, emission.seq()) {
                continue;
            }
            invoked += 1;
            if let Err(source) = self.invoke(entry, &emission) {
                return Err(DispatchError::Handler {
                    kind: kind.clone(),
                    id: entry.id,
                    handler: Arc::clone(&entry.name),
                    source,
                });
            }
        }

        self.finished(kind, &emission, invoked);
        Ok(invoked)
    }

    /// Calls one handler, timing it and reporting the outcome.
    fn invoke(&self, entry: &Entry<P>, emission: &Emission<'_, P>) -> anyhow::Result<()> {
        trace!(signal = %emission.kind(), handler = %entry.name, seq = emission.seq(), "invoking handler");
        let started = Instant::now();
        let result = entry.handler.handle(emission);
        let elapsed = started.elapsed();

        if let Some(limit) = self.inner.cfg.slow_handler_threshold() {
            if elapsed > limit {
                warn!(
                    signal = %emission.kind(),
                    handler = %entry.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow handler"
                );
                self.publish(|| {
                    Activity::new(ActivityKind::SlowHandler)
                        .with_signal(emission.kind().clone())
                        .with_emission(emission.seq())
                        .with_handler(Arc::clone(&entry.name))
                        .with_elapsed(elapsed)
                });
            }
        }

        match &result {
            Ok(()) => self.publish(|| {
                Activity::new(ActivityKind::HandlerReturned)
                    .with_signal(emission.kind().clone())
                    .with_emission(emission.seq())
                    .with_handler(Arc::clone(&entry.name))
                    .with_thread(emission.thread_name())
                    .with_elapsed(elapsed)
            }),
            Err(err) => {
                debug!(signal = %emission.kind(), handler = %entry.name, error = %err, "handler failed");
                self.publish(|| {
                    Activity::new(ActivityKind::HandlerFailed)
                        .with_signal(emission.kind().clone())
                        .with_emission(emission.seq())
                        .with_handler(Arc::clone(&entry.name))
                        .with_thread(emission.thread_name())
                        .with_elapsed(elapsed)
                        .with_reason(err.to_string())
                });
            }
        }
        result
    }

    /// Queues an on-commit handler on `scope` with an owned copy of the payload.
    fn defer(
        &self,
        scope: &Scope<'_>,
        entry: &Entry<P>,
        sender: Option<&Sender>,
        kind: &EventKind,
        payload: &P,
        seq: u64,
    ) where
        P: Clone,
    {
        let handler = Arc::clone(&entry.handler);
        let name = Arc::clone(&entry.name);
        let kind_owned = kind.clone();
        let sender = sender.cloned();
        let payload = payload.clone();

        scope.on_success(move || {
            let emission = Emission::with_seq(&kind_owned, &payload, seq).sent_by(sender.as_ref());
            trace!(signal = %kind_owned, handler = %name, seq, "invoking on-commit handler");
            handler.handle(&emission)
        });

        trace!(signal = %kind, handler = %entry.name, scope = scope.id(), "on-commit handler queued");
        self.publish(|| {
            Activity::new(ActivityKind::CallbackQueued)
                .with_signal(kind.clone())
                .with_emission(seq)
                .with_handler(Arc::clone(&entry.name))
                .with_scope(scope.id())
        });
    }

    fn started(&self, kind: &EventKind, emission: &Emission<'_, P>, handlers: usize) {
        debug!(signal = %kind, seq = emission.seq(), handlers, thread = emission.thread_name(), "emission started");
        self.publish(|| {
            Activity::new(ActivityKind::EmissionStarted)
                .with_signal(kind.clone())
                .with_sender(emission.sender().cloned())
                .with_emission(emission.seq())
                .with_thread(emission.thread_name())
                .with_count(handlers)
        });
    }

    fn finished(&self, kind: &EventKind, emission: &Emission<'_, P>, invoked: usize) {
        self.publish(|| {
            Activity::new(ActivityKind::EmissionFinished)
                .with_signal(kind.clone())
                .with_emission(emission.seq())
                .with_count(invoked)
        });
    }

    fn publish(&self, rec: impl FnOnce() -> Activity) {
        if let Some(bus) = &self.inner.bus {
            bus.publish_with(rec);
        }
    }
}

/// Convenience for handlers written as types.
impl<P> Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    /// Registers a handler value (wrapped in an `Arc`).
    pub fn register_handler<H>(&self, kind: EventKind, handler: H) -> HandlerId
    where
        H: Handler<P>,
    {
        self.register(kind, Arc::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use crate::signals::{HandlerFn, Saved};

    #[derive(Clone, Debug, PartialEq)]
    struct User {
        username: String,
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn created() -> EventKind {
        EventKind::new("created")
    }

    fn user(name: &str) -> Saved<User> {
        Saved::created(User {
            username: name.to_string(),
        })
    }

    fn recorder(log: &Log, tag: &'static str) -> HandlerRef<Saved<User>> {
        let log = log.clone();
        HandlerFn::arc(tag, move |em: &Emission<'_, Saved<User>>| {
            log.lock()
                .unwrap()
                .push(format!("{tag}:{}", em.payload().instance.username));
            Ok(())
        })
    }

    fn quiet() -> Dispatcher<Saved<User>> {
        Dispatcher::new(DispatcherConfig::quiet())
    }

    #[derive(Debug, thiserror::Error)]
    #[error("username taken")]
    struct Taken;

    #[test]
    fn invokes_every_handler_once_in_registration_order() {
        let d = quiet();
        let log = Log::default();
        d.register(created(), recorder(&log, "first"));
        d.register(created(), recorder(&log, "second"));
        d.register(EventKind::new("deleted"), recorder(&log, "other"));
        d.register(created(), recorder(&log, "third"));

        assert_eq!(d.emit(&created(), &user("alice")).unwrap(), 3);
        assert_eq!(
            *log.lock().unwrap(),
            ["first:alice", "second:alice", "third:alice"]
        );
    }

    #[test]
    fn emit_without_handlers_is_a_noop() {
        let d = quiet();
        assert!(!d.has_handlers(&created()));
        assert_eq!(d.emit(&created(), &user("alice")).unwrap(), 0);
    }

    #[test]
    fn emit_blocks_until_slow_handler_returns() {
        let d = quiet();
        let delay = Duration::from_millis(50);
        d.register_fn(created(), "sleepy", move |_| {
            thread::sleep(delay);
            Ok(())
        });

        let started = Instant::now();
        d.emit(&created(), &user("alice")).unwrap();
        assert!(started.elapsed() >= delay);
    }

    #[test]
    fn handler_runs_on_emitting_thread() {
        let d = quiet();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        d.register_fn(created(), "thread-probe", move |em| {
            *s.lock().unwrap() = Some((thread::current().id(), em.thread_name().to_owned()));
            Ok(())
        });

        let d2 = d.clone();
        let emitter = thread::Builder::new()
            .name("request-1".into())
            .spawn(move || {
                d2.emit(&created(), &user("alice")).unwrap();
                thread::current().id()
            })
            .unwrap();
        let emitter_id = emitter.join().unwrap();

        let (handler_id, handler_name) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(handler_id, emitter_id);
        assert_eq!(handler_name, "request-1");
    }

    #[test]
    fn failing_handler_halts_dispatch_and_keeps_error() {
        let d = quiet();
        let log = Log::default();
        d.register(created(), recorder(&log, "before"));
        let failing = d.register_fn(created(), "validator", |_| Err(Taken.into()));
        d.register(created(), recorder(&log, "after"));

        let err = d.emit(&created(), &user("alice")).unwrap_err();
        match &err {
            DispatchError::Handler { id, handler, kind, .. } => {
                assert_eq!(*id, failing);
                assert_eq!(&**handler, "validator");
                assert_eq!(*kind, created());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.downcast_ref::<Taken>().is_some());
        assert_eq!(*log.lock().unwrap(), ["before:alice"]);
    }

    #[test]
    fn emit_robust_runs_everything() {
        let d = quiet();
        let log = Log::default();
        d.register_fn(created(), "validator", |_| Err(Taken.into()));
        d.register(created(), recorder(&log, "after"));

        let outcomes = d.emit_robust(&created(), &user("alice"));
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_ok());
        assert_eq!(&*outcomes[0].handler, "validator");
        assert!(outcomes[1].is_ok());
        assert_eq!(*log.lock().unwrap(), ["after:alice"]);
    }

    #[test]
    fn unregister_removes_exactly_one_handler() {
        let d = quiet();
        let log = Log::default();
        let a = d.register(created(), recorder(&log, "a"));
        d.register(created(), recorder(&log, "b"));

        assert!(d.unregister(a));
        assert!(!d.unregister(a));
        assert_eq!(d.handler_count(&created()), 1);

        d.emit(&created(), &user("bob")).unwrap();
        assert_eq!(*log.lock().unwrap(), ["b:bob"]);
    }

    #[test]
    fn register_unique_deduplicates() {
        let d = quiet();
        let log = Log::default();
        let first = d.register_unique(created(), "welcome-mail", recorder(&log, "mail"));
        let again = d.register_unique(created(), "welcome-mail", recorder(&log, "mail-dup"));
        assert_eq!(first, again);

        d.emit(&created(), &user("carol")).unwrap();
        assert_eq!(*log.lock().unwrap(), ["mail:carol"]);
    }

    #[test]
    fn registration_during_dispatch_applies_to_next_emission() {
        let d = quiet();
        let log = Log::default();
        let d2 = d.clone();
        let late = recorder(&log, "late");
        d.register_fn(created(), "registrar", move |_| {
            d2.register(created(), late.clone());
            Ok(())
        });

        assert_eq!(d.emit(&created(), &user("dave")).unwrap(), 1);
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(d.emit(&created(), &user("erin")).unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), ["late:erin"]);
    }

    #[test]
    fn immediate_handler_effects_survive_rollback() {
        let d = quiet();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        d.register_fn(created(), "counter", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let res: Result<(), anyhow::Error> = d.atomic(|scope| {
            d.emit_in(scope, &created(), &user("frank"))?;
            anyhow::bail!("simulating an error to roll back the transaction")
        });

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_commit_handler_is_dropped_on_rollback() {
        let d = quiet();
        let log = Log::default();
        d.register_on_commit(created(), recorder(&log, "mail"));

        let scope = d.scope();
        assert_eq!(d.emit_in(&scope, &created(), &user("gina")).unwrap(), 0);
        assert_eq!(scope.pending(), 1);
        scope.rollback();

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn on_commit_handler_runs_after_commit_with_same_seq() {
        let d = quiet();
        let log = Log::default();
        let seqs = Arc::new(Mutex::new(Vec::new()));

        let s = seqs.clone();
        d.register_fn(created(), "immediate", move |em| {
            s.lock().unwrap().push(em.seq());
            Ok(())
        });
        let s = seqs.clone();
        d.register_fn_on_commit(created(), "deferred", move |em| {
            s.lock().unwrap().push(em.seq());
            Ok(())
        });
        d.register(created(), recorder(&log, "tail"));

        let scope = d.scope();
        assert_eq!(d.emit_in(&scope, &created(), &user("hank")).unwrap(), 2);
        assert_eq!(seqs.lock().unwrap().len(), 1);
        assert_eq!(*log.lock().unwrap(), ["tail:hank"]);

        assert_eq!(scope.commit().unwrap(), 1);
        let seqs = seqs.lock().unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0], seqs[1]);
    }

    #[test]
    fn on_commit_handler_without_scope_runs_immediately() {
        let d = quiet();
        let log = Log::default();
        d.register_on_commit(created(), recorder(&log, "mail"));
        assert_eq!(d.emit(&created(), &user("ivy")).unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), ["mail:ivy"]);
    }

    #[test]
    fn failing_on_commit_handler_surfaces_from_commit() {
        let d = quiet();
        d.register_fn_on_commit(created(), "mailer", |_| Err(anyhow::anyhow!("smtp down")));

        let scope = d.scope();
        d.emit_in(&scope, &created(), &user("jack")).unwrap();
        let err = scope.commit().unwrap_err();
        assert_eq!(err.as_label(), "dispatch_callback_failed");
    }

    #[test]
    fn register_handler_accepts_types() {
        struct Welcome(Arc<AtomicUsize>);
        impl Handler<Saved<User>> for Welcome {
            fn name(&self) -> &str {
                "welcome"
            }
            fn handle(&self, em: &Emission<'_, Saved<User>>) -> anyhow::Result<()> {
                if em.payload().created {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }

        let d = quiet();
        let hits = Arc::new(AtomicUsize::new(0));
        d.register_handler(created(), Welcome(hits.clone()));
        d.emit(&created(), &user("kim")).unwrap();
        d.emit(
            &created(),
            &Saved::updated(User {
                username: "kim".into(),
            }),
        )
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_lists_registered_kinds() {
        let d = quiet();
        d.register(created(), HandlerFn::arc("noop", |_: &Emission<'_, Saved<User>>| Ok(())));
        let text = format!("{d:?}");
        assert!(text.starts_with("Dispatcher"));
        assert!(text.contains("created"));
    }

    #[test]
    fn sender_scoped_handler_skips_other_senders() {
        let d = quiet();
        let log = Log::default();
        d.register_for(created(), Sender::of::<User>(), recorder(&log, "users"));
        d.register(created(), recorder(&log, "any"));

        assert_eq!(d.emit_from(&Sender::of::<User>(), &created(), &user("ann")).unwrap(), 2);
        assert_eq!(d.emit_from(&Sender::of::<String>(), &created(), &user("bo")).unwrap(), 1);
        assert_eq!(d.emit(&created(), &user("cy")).unwrap(), 1);
        assert_eq!(d.handler_count(&created()), 2);

        assert_eq!(*log.lock().unwrap(), ["users:ann", "any:ann", "any:bo", "any:cy"]);
    }

    #[test]
    fn handler_sees_the_emission_sender() {
        let d = quiet();
        let seen: Arc<Mutex<Vec<Option<Sender>>>> = Arc::default();
        let s = seen.clone();
        d.register_fn(created(), "who", move |em| {
            s.lock().unwrap().push(em.sender().cloned());
            Ok(())
        });

        d.emit_from(&Sender::from("user"), &created(), &user("dee")).unwrap();
        d.emit(&created(), &user("dee")).unwrap();
        assert_eq!(*seen.lock().unwrap(), [Some(Sender::from("user")), None]);
    }

    #[test]
    fn sender_scoped_on_commit_handler_is_only_queued_for_its_sender() {
        let d = quiet();
        let seen: Arc<Mutex<Vec<Option<Sender>>>> = Arc::default();
        let s = seen.clone();
        d.register_on_commit_for(
            created(),
            Sender::of::<User>(),
            HandlerFn::arc("mail", move |em: &Emission<'_, Saved<User>>| {
                s.lock().unwrap().push(em.sender().cloned());
                Ok(())
            }),
        );

        let scope = d.scope();
        d.emit_in_from(&scope, &Sender::of::<String>(), &created(), &user("ed")).unwrap();
        assert_eq!(scope.pending(), 0);
        d.emit_in_from(&scope, &Sender::of::<User>(), &created(), &user("ed")).unwrap();
        assert_eq!(scope.pending(), 1);

        assert_eq!(scope.commit().unwrap(), 1);
        assert_eq!(*seen.lock().unwrap(), [Some(Sender::of::<User>())]);
    }

    #[test]
    fn publishes_dispatch_activity() {
        let d: Dispatcher<Saved<User>> = Dispatcher::new(DispatcherConfig {
            slow_handler: Duration::from_millis(1),
            ..DispatcherConfig::default()
        });
        let mut rx = d.bus().unwrap().subscribe();

        d.register_fn(created(), "sleepy", |_| {
            thread::sleep(Duration::from_millis(5));
            Ok(())
        });
        d.emit(&created(), &user("lee")).unwrap();

        let kinds: Vec<ActivityKind> = (0..5).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            [
                ActivityKind::HandlerRegistered,
                ActivityKind::EmissionStarted,
                ActivityKind::SlowHandler,
                ActivityKind::HandlerReturned,
                ActivityKind::EmissionFinished,
            ]
        );
    }
}
