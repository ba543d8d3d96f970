//! # Event kinds.
//!
//! An [`EventKind`] names a category of occurrence ("record saved", "user
//! created", ...). Handlers are registered against exactly one kind and only
//! see emissions of that kind.
//!
//! Kinds are cheap to clone and compare: well-known kinds are `'static`
//! borrowed strings, custom kinds may own their label.
//!
//! ## Example
//! ```rust
//! use signalvisor::EventKind;
//!
//! let created = EventKind::new("created");
//! assert_eq!(created.as_str(), "created");
//! assert_eq!(EventKind::POST_SAVE, EventKind::from_static("post_save"));
//! ```

use std::borrow::Cow;
use std::fmt;

/// Identifier distinguishing categories of emissions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(Cow<'static, str>);

impl EventKind {
    /// Emitted before a record is written.
    pub const PRE_SAVE: EventKind = EventKind::from_static("pre_save");
    /// Emitted after a record is written (payload usually [`Saved`](crate::Saved)).
    pub const POST_SAVE: EventKind = EventKind::from_static("post_save");
    /// Emitted before a record is deleted.
    pub const PRE_DELETE: EventKind = EventKind::from_static("pre_delete");
    /// Emitted after a record is deleted.
    pub const POST_DELETE: EventKind = EventKind::from_static("post_delete");

    /// Creates a kind from any string-like label.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Creates a kind from a `'static` label in const context.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Returns the kind label.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EventKind {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn borrowed_and_owned_labels_are_the_same_kind() {
        let a = EventKind::from_static("created");
        let b = EventKind::from(String::from("created"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn well_known_kinds_are_distinct() {
        let kinds = [
            EventKind::PRE_SAVE,
            EventKind::POST_SAVE,
            EventKind::PRE_DELETE,
            EventKind::POST_DELETE,
        ];
        let unique: HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
        assert_eq!(EventKind::POST_SAVE.to_string(), "post_save");
    }
}
