//! Coordinator configuration.

use std::time::Duration;

/// Default period between predicate evaluations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Smallest accepted poll interval; shorter values are clamped to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a [`WaitCoordinator`](super::WaitCoordinator).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use testkit_wait::coordinator::{CoordinatorConfig, WaitCoordinator};
///
/// let config = CoordinatorConfig::new().with_poll_interval(Duration::from_millis(10));
/// let coordinator = WaitCoordinator::with_config(config);
/// assert_eq!(coordinator.config().poll_interval(), Duration::from_millis(10));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the minimum period between predicate polls.
    ///
    /// Values below [`MIN_POLL_INTERVAL`] are clamped.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Returns the minimum period between predicate polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
