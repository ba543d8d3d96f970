//! Transaction scopes.
//!
//! - [`Scope`] explicit unit of work with `on_success` callbacks and savepoints
//! - [`Callback`] boxed deferred work

mod transaction;

pub use transaction::{Callback, Scope};
