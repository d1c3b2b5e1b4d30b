//! Manually fulfilled expectations.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::coordinator::state::{CoordinatorState, CounterState};
use crate::coordinator::WaitCoordinator;
use crate::error::{Error, Result};
use crate::expectation::ExpectationId;

/// An expectation fulfilled by explicit [`fulfill`](Self::fulfill) calls.
///
/// The expectation is fulfilled once the number of `fulfill` calls reaches
/// the expected fulfillment count (1 by default). By default fulfilling it
/// more often than that is an error; see
/// [`with_assert_for_over_fulfill`](Self::with_assert_for_over_fulfill).
///
/// Handles are cheap to clone and every clone refers to the same counter,
/// so a clone can be moved into the producer thread or callback that
/// completes the work.
///
/// # Example
///
/// ```rust
/// use testkit_wait::coordinator::WaitCoordinator;
///
/// let coordinator = WaitCoordinator::new();
/// let acks = coordinator
///     .counting("two acks received")
///     .with_expected_fulfillment_count(2);
///
/// acks.fulfill().unwrap();
/// assert!(!acks.is_fulfilled());
///
/// acks.fulfill().unwrap();
/// assert!(acks.is_fulfilled());
///
/// // A third ack is an over-fulfillment
/// assert!(acks.fulfill().is_err());
/// ```
#[derive(Clone)]
pub struct CountingExpectation {
    inner: Arc<CountingInner>,
}

struct CountingInner {
    id: ExpectationId,
    description: String,
    coordinator: WaitCoordinator,
}

impl Drop for CountingInner {
    fn drop(&mut self) {
        let listeners = {
            let mut state = self.coordinator.inner.state.lock();
            state.counters.remove(&self.id);
            state.remove_all_listeners(self.id)
        };
        // Dropped unlocked: a listener may own other expectations.
        drop(listeners);
    }
}

impl CountingExpectation {
    pub(crate) fn new(coordinator: WaitCoordinator, description: String) -> Self {
        let id = ExpectationId::new();
        coordinator.inner.state.lock().counter_mut(id);
        Self {
            inner: Arc::new(CountingInner {
                id,
                description,
                coordinator,
            }),
        }
    }

    /// Sets the number of `fulfill` calls needed, builder style.
    #[must_use]
    pub fn with_expected_fulfillment_count(self, count: usize) -> Self {
        self.set_expected_fulfillment_count(count);
        self
    }

    /// Sets whether exceeding the expected count is an error, builder style.
    #[must_use]
    pub fn with_assert_for_over_fulfill(self, assert: bool) -> Self {
        self.set_assert_for_over_fulfill(assert);
        self
    }

    /// Sets the number of `fulfill` calls needed to fulfill the expectation.
    ///
    /// Set this before the first `fulfill` call. A count of zero is accepted
    /// here but makes every later `fulfill` fail with
    /// [`Error::InvalidConfiguration`].
    pub fn set_expected_fulfillment_count(&self, count: usize) {
        self.with_counter(|counter| counter.expected = count);
    }

    /// Sets whether fulfilling past the expected count fails with
    /// [`Error::AlreadyFulfilled`] (the default) or is silently counted.
    pub fn set_assert_for_over_fulfill(&self, assert: bool) {
        self.with_counter(|counter| counter.assert_for_over_fulfill = assert);
    }

    /// Returns the expectation's unique ID.
    #[must_use]
    pub fn id(&self) -> ExpectationId {
        self.inner.id
    }

    /// Returns the description used in error messages.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Returns the number of successful `fulfill` calls so far.
    #[must_use]
    pub fn fulfillment_count(&self) -> usize {
        self.with_counter(|counter| counter.count)
    }

    /// Returns the number of `fulfill` calls needed.
    #[must_use]
    pub fn expected_fulfillment_count(&self) -> usize {
        self.with_counter(|counter| counter.expected)
    }

    /// Returns whether over-fulfillment is reported as an error.
    #[must_use]
    pub fn asserts_for_over_fulfill(&self) -> bool {
        self.with_counter(|counter| counter.assert_for_over_fulfill)
    }

    /// Returns whether the expected count has been reached.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.with_counter(|counter| counter.is_fulfilled())
    }

    /// Records one fulfillment.
    ///
    /// When this call is the one that reaches the expected count, every
    /// listener attached through the coordinator, including those of
    /// in-flight waits, is invoked on the calling thread after the
    /// coordinator lock has been released.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if the expected count is zero.
    /// - [`Error::AlreadyFulfilled`] if the expectation is already fulfilled
    ///   and over-fulfillment is asserted. The counter is left unchanged.
    pub fn fulfill(&self) -> Result<()> {
        let listeners = {
            let mut state = self.coordinator().inner.state.lock();
            let counter = state.counter_mut(self.id());
            if counter.expected == 0 {
                return Err(Error::invalid_configuration(format!(
                    "expectation '{}' expects zero fulfillments",
                    self.description()
                )));
            }
            if counter.assert_for_over_fulfill && counter.count >= counter.expected {
                return Err(Error::AlreadyFulfilled {
                    description: self.description().to_string(),
                    expected: counter.expected,
                });
            }
            counter.count += 1;
            trace!(
                expectation = %self.description(),
                count = counter.count,
                expected = counter.expected,
                "fulfilled"
            );
            if counter.count == counter.expected {
                state.listeners_for(self.id())
            } else {
                Vec::new()
            }
        };

        for listener in listeners {
            listener(self);
        }
        Ok(())
    }

    pub(crate) fn coordinator(&self) -> &WaitCoordinator {
        &self.inner.coordinator
    }

    pub(crate) fn is_fulfilled_locked(&self, state: &CoordinatorState) -> bool {
        state
            .counters
            .get(&self.id())
            .is_some_and(CounterState::is_fulfilled)
    }

    fn with_counter<R>(&self, f: impl FnOnce(&mut CounterState) -> R) -> R {
        let mut state = self.coordinator().inner.state.lock();
        f(state.counter_mut(self.id()))
    }
}

impl fmt::Debug for CountingExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.coordinator().inner.state.lock();
        let counter = state.counters.get(&self.id()).copied().unwrap_or_default();
        f.debug_struct("CountingExpectation")
            .field("id", &self.id())
            .field("description", &self.description())
            .field("fulfillment_count", &counter.count)
            .field("expected_fulfillment_count", &counter.expected)
            .field("assert_for_over_fulfill", &counter.assert_for_over_fulfill)
            .finish()
    }
}

impl fmt::Display for CountingExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
