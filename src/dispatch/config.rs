//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`], the settings shared by a [`Dispatcher`](crate::Dispatcher)
//! and the scopes it begins.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → no activity bus (nothing is published, subscribers are rejected)
//! - `slow_handler = 0s` → slow-handler reporting disabled

use std::time::Duration;

/// Configuration for a dispatcher.
///
/// ## Field semantics
/// - `bus_capacity`: activity bus ring buffer size (`0` = bus disabled)
/// - `slow_handler`: handlers running longer than this are reported (`0s` = off)
///
/// Neither field changes delivery: handlers always run synchronously, to
/// completion, on the emitting thread.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Capacity of the activity bus broadcast ring buffer.
    ///
    /// Receivers lagging more than `bus_capacity` records skip older items.
    pub bus_capacity: usize,

    /// Threshold above which a handler invocation is logged at `warn` and
    /// published as `ActivityKind::SlowHandler`.
    pub slow_handler: Duration,
}

impl DispatcherConfig {
    /// Configuration without an activity bus.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            bus_capacity: 0,
            ..Self::default()
        }
    }

    /// True if an activity bus should be created.
    #[inline]
    pub fn bus_enabled(&self) -> bool {
        self.bus_capacity > 0
    }

    /// Returns the slow-handler threshold as an `Option`.
    ///
    /// - `None` → reporting disabled
    /// - `Some(d)` → invocations longer than `d` are reported
    #[inline]
    pub fn slow_handler_threshold(&self) -> Option<Duration> {
        if self.slow_handler == Duration::ZERO {
            None
        } else {
            Some(self.slow_handler)
        }
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `slow_handler = 0s` (off)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            slow_handler: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = DispatcherConfig::default();
        assert!(cfg.bus_enabled());
        assert_eq!(cfg.slow_handler_threshold(), None);

        let quiet = DispatcherConfig::quiet();
        assert!(!quiet.bus_enabled());

        let slow = DispatcherConfig {
            slow_handler: Duration::from_millis(250),
            ..DispatcherConfig::default()
        };
        assert_eq!(slow.slow_handler_threshold(), Some(Duration::from_millis(250)));
    }
}
