//! # Signal vocabulary: kinds, emissions and handlers.
//!
//! - [`EventKind`] category label handlers register against
//! - [`Emission`] transient value a handler receives
//! - [`Sender`] origin of an emission, used to filter handlers
//! - [`Saved`] canonical "record saved" payload
//! - [`Handler`] / [`HandlerFn`] / [`HandlerRef`] the callable side
//! - [`HandlerId`] registration token, [`Delivery`] immediate vs on-commit

mod emission;
mod handler;
mod handler_fn;
mod kind;
mod sender;

pub(crate) use emission::next_seq;
pub use emission::{Emission, Saved};
pub use handler::{Delivery, Handler, HandlerId, HandlerOutcome, HandlerRef};
pub use handler_fn::HandlerFn;
pub use kind::EventKind;
pub(crate) use sender::accepts;
pub use sender::Sender;
