//! Dispatcher: registry, synchronous delivery and wiring.
//!
//! The public API from this module is [`Dispatcher`], its [`DispatcherBuilder`]
//! and [`DispatcherConfig`].
//!
//! Internal modules:
//! - [`registry`]: copy-on-write handler lists per kind;
//! - [`dispatcher`]: registration, emission, scope integration;
//! - [`builder`]: activity bus, subscriber workers and listener;
//! - [`config`]: settings and sentinel helpers.

mod builder;
mod config;
mod dispatcher;
mod registry;

pub use builder::DispatcherBuilder;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
