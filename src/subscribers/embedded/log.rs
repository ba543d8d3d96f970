//! # LogWriter: activity rendered through `tracing`
//!
//! A minimal subscriber that turns incoming [`Activity`] records into
//! `tracing::info!` lines (failures and drops at `warn`).
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO [emit] signal=post_save sender=myapp::User emission=3 handlers=2 thread=main
//! INFO [returned] signal=post_save handler=welcome elapsed_ms=5001 thread=main
//! WARN [failed] signal=post_save handler=audit reason=quota exceeded
//! INFO [rolled-back] scope=1 discarded=1
//! ```

use async_trait::async_trait;

use crate::activity::{Activity, ActivityKind};
use crate::subscribers::Subscribe;

/// Activity writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn or_unknown(v: Option<&str>) -> &str {
    v.unwrap_or("unknown")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_activity(&self, a: &Activity) {
        let signal = a.signal.as_ref().map(|k| k.as_str());
        let handler = a.handler.as_deref();
        match a.kind {
            ActivityKind::HandlerRegistered => {
                tracing::info!(
                    "[registered] signal={} handler={}",
                    or_unknown(signal),
                    or_unknown(handler)
                );
            }
            ActivityKind::HandlerUnregistered => {
                tracing::info!(
                    "[unregistered] signal={} handler={}",
                    or_unknown(signal),
                    or_unknown(handler)
                );
            }
            ActivityKind::EmissionStarted => {
                tracing::info!(
                    "[emit] signal={} sender={} emission={:?} handlers={:?} thread={}",
                    or_unknown(signal),
                    a.sender.as_ref().map_or("-", |s| s.as_str()),
                    a.emission,
                    a.count,
                    or_unknown(a.thread.as_deref())
                );
            }
            ActivityKind::HandlerReturned => {
                tracing::info!(
                    "[returned] signal={} handler={} elapsed_ms={:?} thread={}",
                    or_unknown(signal),
                    or_unknown(handler),
                    a.elapsed_ms,
                    or_unknown(a.thread.as_deref())
                );
            }
            ActivityKind::HandlerFailed => {
                tracing::warn!(
                    "[failed] signal={} handler={} reason={}",
                    or_unknown(signal),
                    or_unknown(handler),
                    or_unknown(a.reason.as_deref())
                );
            }
            ActivityKind::SlowHandler => {
                tracing::warn!(
                    "[slow] signal={} handler={} elapsed_ms={:?}",
                    or_unknown(signal),
                    or_unknown(handler),
                    a.elapsed_ms
                );
            }
            ActivityKind::EmissionFinished => {
                tracing::info!(
                    "[emitted] signal={} emission={:?} invoked={:?}",
                    or_unknown(signal),
                    a.emission,
                    a.count
                );
            }
            ActivityKind::CallbackQueued => {
                tracing::info!(
                    "[queued] signal={} handler={} scope={:?}",
                    or_unknown(signal),
                    or_unknown(handler),
                    a.scope
                );
            }
            ActivityKind::ScopeCommitted => {
                tracing::info!("[committed] scope={:?} callbacks={:?}", a.scope, a.count);
            }
            ActivityKind::SavepointReleased => {
                tracing::info!("[released] scope={:?} handed_over={:?}", a.scope, a.count);
            }
            ActivityKind::ScopeRolledBack => {
                tracing::info!("[rolled-back] scope={:?} discarded={:?}", a.scope, a.count);
            }
            ActivityKind::CallbackFailed => {
                tracing::warn!(
                    "[callback-failed] scope={:?} discarded={:?} reason={}",
                    a.scope,
                    a.count,
                    or_unknown(a.reason.as_deref())
                );
            }
            ActivityKind::SubscriberOverflow => {
                tracing::warn!(
                    "[subscriber-overflow] subscriber={} reason={}",
                    or_unknown(handler),
                    or_unknown(a.reason.as_deref())
                );
            }
            ActivityKind::SubscriberPanicked => {
                tracing::warn!(
                    "[subscriber-panicked] subscriber={} info={}",
                    or_unknown(handler),
                    or_unknown(a.reason.as_deref())
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
