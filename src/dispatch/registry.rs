//! # Handler registry: copy-on-write map from kind to handlers.
//!
//! ## Architecture
//! ```text
//! RwLock<Slots>
//!   ├─ by_kind: HashMap<EventKind, Arc<[Entry]>>   (ordered by registration)
//!   └─ index:   HashMap<HandlerId, EventKind>      (for unregister)
//!
//! register / unregister ─► write lock ─► build new Arc<[Entry]> ─► swap
//! emit                  ─► read lock  ─► clone Arc<[Entry]>     ─► release ─► invoke
//! ```
//!
//! ## Rules
//! - The lock is never held while a handler runs.
//! - An in-flight emission keeps its snapshot; registration changes apply to
//!   the next emission.
//! - Poisoned locks are recovered (the map is only mutated by whole-slice swaps).
//! - A `uid` is unique per `(kind, sender)`, so the same uid may be bound to
//!   several senders of one kind.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::signals::{Delivery, EventKind, HandlerId, HandlerRef, Sender, accepts};

/// One registered handler.
pub(crate) struct Entry<P> {
    pub(crate) id: HandlerId,
    pub(crate) name: Arc<str>,
    pub(crate) sender: Option<Sender>,
    pub(crate) uid: Option<Arc<str>>,
    pub(crate) delivery: Delivery,
    pub(crate) handler: HandlerRef<P>,
}

impl<P> Entry<P> {
    /// True if this entry should run for an emission from `sender`.
    #[inline]
    pub(crate) fn accepts(&self, sender: Option<&Sender>) -> bool {
        accepts(self.sender.as_ref(), sender)
    }
}

/// Registration options that travel with a handler into the registry.
#[derive(Clone, Debug, Default)]
pub(crate) struct Binding {
    pub(crate) sender: Option<Sender>,
    pub(crate) uid: Option<Arc<str>>,
    pub(crate) delivery: Delivery,
}

impl Binding {
    pub(crate) fn on_commit() -> Self {
        Self {
            delivery: Delivery::OnCommit,
            ..Self::default()
        }
    }

    pub(crate) fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub(crate) fn uid(mut self, uid: Arc<str>) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl<P> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            sender: self.sender.clone(),
            uid: self.uid.clone(),
            delivery: self.delivery,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Immutable, ordered handler list for one kind.
pub(crate) type Snapshot<P> = Arc<[Entry<P>]>;

struct Slots<P> {
    by_kind: HashMap<EventKind, Snapshot<P>>,
    index: HashMap<HandlerId, EventKind>,
}

/// Outcome of an insert.
pub(crate) enum Inserted {
    /// A new entry was appended.
    New(HandlerId),
    /// An entry with the same `(kind, sender, uid)` already existed.
    Existing(HandlerId),
}

/// Registry of handlers keyed by event kind.
pub(crate) struct Registry<P> {
    slots: RwLock<Slots<P>>,
}

impl<P: 'static> Registry<P> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                by_kind: HashMap::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Appends a handler under `kind`, or returns the existing id for a known
    /// `(kind, sender, uid)`.
    pub(crate) fn insert(&self, kind: &EventKind, binding: Binding, handler: HandlerRef<P>) -> Inserted {
        let mut slots = self.write();

        let current = slots.by_kind.get(kind).cloned();
        if let (Some(uid), Some(entries)) = (binding.uid.as_deref(), current.as_deref()) {
            let dup = entries
                .iter()
                .find(|e| e.uid.as_deref() == Some(uid) && e.sender == binding.sender);
            if let Some(dup) = dup {
                return Inserted::Existing(dup.id);
            }
        }

        let id = HandlerId::next();
        let entry = Entry {
            id,
            name: Arc::from(handler.name()),
            sender: binding.sender,
            uid: binding.uid,
            delivery: binding.delivery,
            handler,
        };

        let mut next: Vec<Entry<P>> = current.as_deref().map(<[_]>::to_vec).unwrap_or_default();
        next.push(entry);
        slots.by_kind.insert(kind.clone(), Arc::from(next));
        slots.index.insert(id, kind.clone());

        Inserted::New(id)
    }

    /// Removes a handler; returns its kind and name if it was registered.
    pub(crate) fn remove(&self, id: HandlerId) -> Option<(EventKind, Arc<str>)> {
        let mut slots = self.write();
        let kind = slots.index.remove(&id)?;
        let current = slots.by_kind.get(&kind).cloned()?;

        let name = current.iter().find(|e| e.id == id).map(|e| Arc::clone(&e.name))?;
        let next: Vec<Entry<P>> = current.iter().filter(|e| e.id != id).cloned().collect();
        if next.is_empty() {
            slots.by_kind.remove(&kind);
        } else {
            slots.by_kind.insert(kind.clone(), Arc::from(next));
        }

        Some((kind, name))
    }

    /// Current handler list for `kind` (cheap `Arc` clone).
    pub(crate) fn snapshot(&self, kind: &EventKind) -> Option<Snapshot<P>> {
        self.read().by_kind.get(kind).cloned()
    }

    /// Number of handlers registered for `kind`.
    pub(crate) fn count(&self, kind: &EventKind) -> usize {
        self.read().by_kind.get(kind).map_or(0, |e| e.len())
    }

    /// Sorted list of kinds with at least one handler.
    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.read().by_kind.keys().cloned().collect();
        kinds.sort_unstable();
        kinds
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots<P>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots<P>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{Emission, HandlerFn};

    fn noop(name: &'static str) -> HandlerRef<()> {
        HandlerFn::arc(name, |_: &Emission<'_, ()>| Ok(()))
    }

    fn names(reg: &Registry<()>, kind: &EventKind) -> Vec<String> {
        reg.snapshot(kind)
            .map(|s| s.iter().map(|e| e.name.to_string()).collect())
            .unwrap_or_default()
    }

    fn id_of(ins: Inserted) -> HandlerId {
        match ins {
            Inserted::New(id) | Inserted::Existing(id) => id,
        }
    }

    #[test]
    fn keeps_registration_order() {
        let reg = Registry::new();
        let kind = EventKind::new("created");
        for n in ["a", "b", "c"] {
            reg.insert(&kind, Binding::default(), noop(n));
        }
        assert_eq!(names(&reg, &kind), ["a", "b", "c"]);
        assert_eq!(reg.count(&kind), 3);
    }

    fn audit() -> Binding {
        Binding::default().uid("audit".into())
    }

    #[test]
    fn uid_deduplicates_per_kind() {
        let reg = Registry::new();
        let created = EventKind::new("created");
        let deleted = EventKind::new("deleted");

        let first = id_of(reg.insert(&created, audit(), noop("a")));
        match reg.insert(&created, audit(), noop("b")) {
            Inserted::Existing(id) => assert_eq!(id, first),
            Inserted::New(_) => panic!("duplicate uid was inserted"),
        }
        assert!(matches!(reg.insert(&deleted, audit(), noop("c")), Inserted::New(_)));
        assert_eq!(reg.count(&created), 1);
    }

    #[test]
    fn uid_is_scoped_by_sender() {
        let reg = Registry::new();
        let kind = EventKind::POST_SAVE;
        let users = audit().sender(Sender::from("user"));
        let groups = audit().sender(Sender::from("group"));

        let first = id_of(reg.insert(&kind, users.clone(), noop("a")));
        assert!(matches!(reg.insert(&kind, groups, noop("b")), Inserted::New(_)));
        assert!(matches!(reg.insert(&kind, users, noop("c")), Inserted::Existing(id) if id == first));
        assert_eq!(names(&reg, &kind), ["a", "b"]);
    }

    #[test]
    fn entries_filter_on_sender() {
        let reg = Registry::new();
        let kind = EventKind::POST_SAVE;
        reg.insert(&kind, Binding::default().sender(Sender::from("user")), noop("users"));
        reg.insert(&kind, Binding::default(), noop("all"));

        let snap = reg.snapshot(&kind).unwrap();
        let user = Sender::from("user");
        let group = Sender::from("group");
        let seen = |s: Option<&Sender>| {
            snap.iter()
                .filter(|e| e.accepts(s))
                .map(|e| e.name.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(seen(Some(&user)), ["users", "all"]);
        assert_eq!(seen(Some(&group)), ["all"]);
        assert_eq!(seen(None), ["all"]);
    }

    #[test]
    fn remove_keeps_other_entries_and_old_snapshots() {
        let reg = Registry::new();
        let kind = EventKind::new("created");
        let a = id_of(reg.insert(&kind, Binding::default(), noop("a")));
        reg.insert(&kind, Binding::on_commit(), noop("b"));

        let before = reg.snapshot(&kind).unwrap();
        let (k, name) = reg.remove(a).unwrap();
        assert_eq!(k, kind);
        assert_eq!(&*name, "a");

        assert_eq!(before.len(), 2);
        assert_eq!(names(&reg, &kind), ["b"]);
        assert!(reg.remove(a).is_none());
    }

    #[test]
    fn empty_kinds_disappear() {
        let reg = Registry::new();
        let kind = EventKind::new("created");
        let a = id_of(reg.insert(&kind, Binding::default(), noop("a")));
        assert_eq!(reg.kinds(), vec![kind.clone()]);
        reg.remove(a);
        assert!(reg.kinds().is_empty());
        assert!(reg.snapshot(&kind).is_none());
    }
}
