//! # Transaction scope with on-success callbacks.
//!
//! A [`Scope`] is the emitter's unit of work. The dispatcher knows nothing
//! about it unless the scope is passed to
//! [`Dispatcher::emit_in`](crate::Dispatcher::emit_in), and even then only
//! on-commit handlers are affected: immediate handlers have already run.
//!
//! ## Lifecycle
//! ```text
//! Scope::new() ──► on_success(cb)* ──┬─► commit()   ─► root:      run callbacks FIFO
//!      │                             │                savepoint: hand callbacks to parent
//!      │                             └─► rollback() ─► drop callbacks (never invoked)
//!      └─► savepoint() ──► nested Scope<'_> (same rules)
//!
//! dropping an uncommitted scope == rollback()
//! ```
//!
//! ## Rules
//! - Callbacks run only after the **root** scope commits, on the committing thread.
//! - The first failing callback halts the drain; the rest are discarded.
//! - Rolling back a savepoint discards only the callbacks queued inside it.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::activity::{Activity, ActivityKind, Bus};
use crate::error::DispatchError;

/// Global counter for scope ids.
static SCOPE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Deferred work queued on a scope.
pub type Callback = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Explicit unit of work collecting callbacks to run once it commits.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use signalvisor::Scope;
///
/// let sent = Arc::new(AtomicUsize::new(0));
///
/// let scope = Scope::new();
/// let s = sent.clone();
/// scope.on_success(move || { s.fetch_add(1, Ordering::SeqCst); Ok(()) });
/// scope.rollback();
/// assert_eq!(sent.load(Ordering::SeqCst), 0);
///
/// let scope = Scope::new();
/// let s = sent.clone();
/// scope.on_success(move || { s.fetch_add(1, Ordering::SeqCst); Ok(()) });
/// scope.commit().unwrap();
/// assert_eq!(sent.load(Ordering::SeqCst), 1);
/// ```
pub struct Scope<'p> {
    id: u64,
    parent: Option<&'p Scope<'p>>,
    pending: Mutex<Vec<Callback>>,
    bus: Option<Bus>,
    finished: bool,
}

impl Scope<'static> {
    /// Begins a root scope.
    #[must_use]
    pub fn new() -> Self {
        Self::root(None)
    }

    /// Begins a root scope that publishes activity on `bus`.
    #[must_use]
    pub fn with_bus(bus: Bus) -> Self {
        Self::root(Some(bus))
    }

    pub(crate) fn root(bus: Option<Bus>) -> Self {
        let scope = Self {
            id: SCOPE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            parent: None,
            pending: Mutex::new(Vec::new()),
            bus,
            finished: false,
        };
        debug!(scope = scope.id, "scope begun");
        scope
    }

    /// Runs `f` inside a new root scope: commit on `Ok`, roll back on `Err`.
    ///
    /// A callback failure during commit is returned through `E: From<DispatchError>`.
    ///
    /// # Example
    /// ```
    /// use signalvisor::{DispatchError, Scope};
    ///
    /// let res: Result<u32, DispatchError> = Scope::atomic(|scope| {
    ///     scope.on_success(|| Ok(()));
    ///     Ok(7)
    /// });
    /// assert_eq!(res.unwrap(), 7);
    /// ```
    pub fn atomic<T, E, F>(f: F) -> Result<T, E>
    where
        F: FnOnce(&Scope<'static>) -> Result<T, E>,
        E: From<DispatchError>,
    {
        Scope::new().run(f)
    }
}

impl Default for Scope<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> Scope<'p> {
    /// Scope id (process-unique).
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Nesting depth: `0` for a root scope.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent;
        while let Some(p) = cur {
            depth += 1;
            cur = p.parent;
        }
        depth
    }

    /// True for a root scope.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of callbacks queued in this scope (not counting parents).
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Queues `callback` to run after the root scope commits.
    ///
    /// Dropped without being invoked if this scope (or any ancestor) rolls back.
    pub fn on_success<F>(&self, callback: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.queue().push(Box::new(callback));
    }

    /// Begins a savepoint nested in this scope.
    #[must_use]
    pub fn savepoint(&self) -> Scope<'_> {
        let scope = Scope {
            id: SCOPE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            parent: Some(self),
            pending: Mutex::new(Vec::new()),
            bus: self.bus.clone(),
            finished: false,
        };
        debug!(scope = scope.id, parent = self.id, "savepoint begun");
        scope
    }

    /// Runs `f` inside a savepoint of this scope: release on `Ok`, roll back on `Err`.
    pub fn atomic_nested<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Scope<'_>) -> Result<T, E>,
        E: From<DispatchError>,
    {
        self.savepoint().run(f)
    }

    /// Runs `f` with this scope, then commits on `Ok` or rolls back on `Err`.
    pub fn run<T, E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DispatchError>,
    {
        match f(&self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }

    /// Commits the scope.
    ///
    /// - **Root**: runs queued callbacks in FIFO order on the current thread and
    ///   returns how many ran. The first failure stops the drain, discards the
    ///   rest and returns [`DispatchError::Callback`].
    /// - **Savepoint**: appends its callbacks to the parent's queue and returns
    ///   how many were handed over.
    pub fn commit(mut self) -> Result<usize, DispatchError> {
        self.finished = true;
        let callbacks = std::mem::take(&mut *self.queue());

        if let Some(parent) = self.parent {
            let n = callbacks.len();
            parent.queue().extend(callbacks);
            debug!(scope = self.id, parent = parent.id, handed_over = n, "savepoint released");
            self.publish(|| {
                Activity::new(ActivityKind::SavepointReleased)
                    .with_scope(self.id)
                    .with_count(n)
            });
            return Ok(n);
        }

        let total = callbacks.len();
        for (ran, callback) in callbacks.into_iter().enumerate() {
            if let Err(source) = callback() {
                let discarded = total - ran - 1;
                warn!(
                    scope = self.id,
                    discarded,
                    error = %source,
                    "on-success callback failed; remaining callbacks discarded"
                );
                self.publish(|| {
                    Activity::new(ActivityKind::CallbackFailed)
                        .with_scope(self.id)
                        .with_count(discarded)
                        .with_reason(source.to_string())
                });
                return Err(DispatchError::Callback {
                    scope: self.id,
                    source,
                });
            }
        }

        debug!(scope = self.id, callbacks = total, "scope committed");
        self.publish(|| {
            Activity::new(ActivityKind::ScopeCommitted)
                .with_scope(self.id)
                .with_count(total)
        });
        Ok(total)
    }

    /// Rolls the scope back, discarding its callbacks; returns how many were dropped.
    pub fn rollback(mut self) -> usize {
        self.discard()
    }

    fn discard(&mut self) -> usize {
        self.finished = true;
        let dropped = std::mem::take(&mut *self.queue()).len();
        debug!(scope = self.id, discarded = dropped, "scope rolled back");
        self.publish(|| {
            Activity::new(ActivityKind::ScopeRolledBack)
                .with_scope(self.id)
                .with_count(dropped)
        });
        dropped
    }

    pub(crate) fn publish(&self, rec: impl FnOnce() -> Activity) {
        if let Some(bus) = &self.bus {
            bus.publish_with(rec);
        }
    }

    fn queue(&self) -> MutexGuard<'_, Vec<Callback>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.discard();
        }
    }
}

impl std::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("pending", &self.pending())
            .finish()
    }
}
