//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(&Emission<'_, P>) -> anyhow::Result<()>`.
//! Shared state belongs in explicit `Arc<...>` captures.
//!
//! ## Example
//! ```rust
//! use signalvisor::{Emission, EventKind, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef<u32> = HandlerFn::arc("double", |em: &Emission<'_, u32>| {
//!     assert_eq!(*em.payload() * 2, 84);
//!     Ok(())
//! });
//!
//! let kind = EventKind::new("answer");
//! h.handle(&Emission::new(&kind, &42)).unwrap();
//! assert_eq!(h.name(), "double");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use super::emission::Emission;
use super::handler::Handler;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](super::HandlerRef).
    pub fn new<P>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        P: 'static,
        F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc<P>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        P: 'static,
        F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self::new::<P>(name, f))
    }
}

impl<P, F> Handler<P> for HandlerFn<F>
where
    P: 'static,
    F: Fn(&Emission<'_, P>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, emission: &Emission<'_, P>) -> anyhow::Result<()> {
        (self.f)(emission)
    }
}
