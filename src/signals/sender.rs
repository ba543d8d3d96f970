//! # Emission senders.
//!
//! A [`Sender`] names the origin of an emission, typically the record type
//! that was saved. Handlers may be registered for one sender only; they are
//! then skipped for emissions from any other sender and for emissions that
//! carry no sender at all. Handlers registered without a sender see every
//! emission of their kind.
//!
//! ```text
//! register_for(POST_SAVE, Sender::of::<User>(), h1)
//! register(POST_SAVE, h2)
//!
//! emit_from(&Sender::of::<User>(),  POST_SAVE, ..)  ─► h1, h2
//! emit_from(&Sender::of::<Group>(), POST_SAVE, ..)  ─► h2
//! emit(POST_SAVE, ..)                               ─► h2
//! ```

use std::borrow::Cow;
use std::fmt;

/// Origin of an emission.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sender(Cow<'static, str>);

impl Sender {
    /// Creates a sender from any string-like label.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Sender named after the type `T`.
    ///
    /// ```rust
    /// use signalvisor::Sender;
    ///
    /// struct User;
    /// assert_eq!(Sender::of::<User>(), Sender::of::<User>());
    /// assert_ne!(Sender::of::<User>(), Sender::of::<String>());
    /// ```
    pub fn of<T: ?Sized>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Returns the sender label.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Sender {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Sender {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// True if a handler filtered on `wanted` should see an emission from `actual`.
pub(crate) fn accepts(wanted: Option<&Sender>, actual: Option<&Sender>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted),
    }
}
