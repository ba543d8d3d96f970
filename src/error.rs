//! Error types used by the dispatcher and transaction scopes.
//!
//! [`DispatchError`] covers every failure the crate reports:
//!
//! - a handler failed during `emit` (dispatch halted),
//! - an on-success callback failed while a scope committed,
//! - subscribers were configured without a Tokio runtime.
//!
//! The failing handler's own error is carried unchanged as an [`anyhow::Error`]
//! and stays reachable through `source()`, [`DispatchError::into_source`] or
//! [`DispatchError::downcast_ref`].

use std::sync::Arc;

use thiserror::Error;

use crate::signals::{EventKind, HandlerId};

/// # Errors produced by dispatch and scope commit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An immediate handler returned an error; remaining handlers were not invoked.
    #[error("handler '{handler}' ({id}) failed on '{kind}': {source}")]
    Handler {
        /// Kind being emitted.
        kind: EventKind,
        /// Registration token of the failing handler.
        id: HandlerId,
        /// Name of the failing handler.
        handler: Arc<str>,
        /// The handler's error, untouched.
        #[source]
        source: anyhow::Error,
    },

    /// An on-success callback failed after the scope committed; later callbacks were discarded.
    #[error("on-success callback failed in scope #{scope}: {source}")]
    Callback {
        /// Id of the committing scope.
        scope: u64,
        /// The callback's error.
        #[source]
        source: anyhow::Error,
    },

    /// Subscribers need a Tokio runtime to spawn their workers.
    #[error("subscribers configured outside of a tokio runtime")]
    NoRuntime,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use signalvisor::DispatchError;
    ///
    /// assert_eq!(DispatchError::NoRuntime.as_label(), "dispatch_no_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Handler { .. } => "dispatch_handler_failed",
            DispatchError::Callback { .. } => "dispatch_callback_failed",
            DispatchError::NoRuntime => "dispatch_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::Handler {
                kind,
                handler,
                source,
                ..
            } => format!("handler={handler} kind={kind} error={source:#}"),
            DispatchError::Callback { scope, source } => {
                format!("scope={scope} error={source:#}")
            }
            DispatchError::NoRuntime => "no tokio runtime".to_string(),
        }
    }

    /// Consumes the error and returns the handler or callback error, if any.
    pub fn into_source(self) -> Option<anyhow::Error> {
        match self {
            DispatchError::Handler { source, .. } | DispatchError::Callback { source, .. } => {
                Some(source)
            }
            DispatchError::NoRuntime => None,
        }
    }

    /// Attempts to view the underlying handler/callback error as `E`.
    ///
    /// # Example
    /// ```
    /// use signalvisor::{DispatchError, EventKind, HandlerId};
    /// # fn failing() -> DispatchError {
    /// #     let d = signalvisor::Dispatcher::<()>::default();
    /// #     d.register_fn(EventKind::new("x"), "boom", |_| Err(std::fmt::Error.into()));
    /// #     d.emit(&EventKind::new("x"), &()).unwrap_err()
    /// # }
    /// let err = failing();
    /// assert!(err.downcast_ref::<std::fmt::Error>().is_some());
    /// ```
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            DispatchError::Handler { source, .. } | DispatchError::Callback { source, .. } => {
                source.downcast_ref::<E>()
            }
            DispatchError::NoRuntime => None,
        }
    }

    /// True if an immediate handler failed.
    #[inline]
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, DispatchError::Handler { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct Quota;

    fn handler_error() -> DispatchError {
        DispatchError::Handler {
            kind: EventKind::new("created"),
            id: HandlerId::next(),
            handler: Arc::from("audit"),
            source: anyhow::Error::new(Quota),
        }
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(handler_error().as_label(), "dispatch_handler_failed");
        let cb = DispatchError::Callback {
            scope: 3,
            source: anyhow::anyhow!("smtp down"),
        };
        assert_eq!(cb.as_label(), "dispatch_callback_failed");
        assert_eq!(cb.as_message(), "scope=3 error=smtp down");
    }

    #[test]
    fn handler_error_is_preserved() {
        let err = handler_error();
        assert!(err.is_handler_failure());
        assert!(err.downcast_ref::<Quota>().is_some());
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("quota exceeded"));

        let inner = err.into_source().unwrap();
        assert!(inner.downcast::<Quota>().is_ok());
    }

    #[test]
    fn display_names_handler_and_kind() {
        let msg = handler_error().to_string();
        assert!(msg.contains("'audit'"));
        assert!(msg.contains("'created'"));
        assert!(msg.ends_with("quota exceeded"));
    }
}
