//! # Activity subscribers.
//!
//! This module provides the [`Subscribe`] trait with its [`Interest`] filter,
//! the crate-internal `SubscriberSet` fan-out and the built-in [`LogWriter`]
//! (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Dispatcher / Scope ── publish(Activity) ──► Bus ──► activity listener
//!                                                        │
//!                                                        └──► SubscriberSet
//!                                                               ├──► LogWriter
//!                                                               ├──► Metrics
//!                                                               └──► Custom ...
//! ```
//!
//! Subscribers observe dispatch after the fact; they can never delay or fail
//! an emission.

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::{Interest, Subscribe};
pub(crate) use subscriber_set::SubscriberSet;
