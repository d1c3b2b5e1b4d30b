//! Expectations a test waits on.
//!
//! An expectation is a named condition that becomes true at some point after
//! the test kicks off asynchronous work. Two variants ship:
//!
//! - [`CountingExpectation`] - fulfilled by explicit [`fulfill`] calls reaching
//!   a target count.
//! - [`PredicateExpectation`] - fulfilled once a caller-supplied predicate
//!   returns `true`; the wait engine polls it.
//!
//! Both are created through a [`WaitCoordinator`](crate::coordinator::WaitCoordinator),
//! which owns the lock guarding their state, and both convert into the closed
//! [`Expectation`] enum accepted by the wait entry points.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_wait::coordinator::WaitCoordinator;
//!
//! let coordinator = WaitCoordinator::new();
//! let done = coordinator.counting("work finished");
//!
//! let producer = done.clone();
//! std::thread::spawn(move || producer.fulfill().unwrap());
//!
//! coordinator.wait_for(&done, Duration::from_secs(1)).unwrap();
//! assert!(done.is_fulfilled());
//! ```
//!
//! [`fulfill`]: CountingExpectation::fulfill

mod counting;
mod predicate;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coordinator::state::CoordinatorState;
use crate::coordinator::WaitCoordinator;

pub use counting::CountingExpectation;
pub use predicate::PredicateExpectation;

/// Unique identifier for an expectation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpectationId(u64);

impl ExpectationId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expectation({})", self.0)
    }
}

/// Any expectation the wait engine understands.
///
/// This is a closed set: the engine treats both variants uniformly through
/// [`is_fulfilled`](Expectation::is_fulfilled) and only consults
/// [`needs_polling`](Expectation::needs_polling) to decide whether a poller
/// has to run.
#[derive(Clone, Debug)]
pub enum Expectation {
    /// Manually fulfilled against a target count.
    Counting(CountingExpectation),
    /// Fulfilled once its predicate is observed `true`.
    Predicate(PredicateExpectation),
}

impl Expectation {
    /// Returns the expectation's unique ID.
    #[must_use]
    pub fn id(&self) -> ExpectationId {
        match self {
            Self::Counting(c) => c.id(),
            Self::Predicate(p) => p.id(),
        }
    }

    /// Returns the human readable description used in error messages.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Counting(c) => c.description(),
            Self::Predicate(p) => p.description(),
        }
    }

    /// Returns whether the expectation is currently fulfilled.
    ///
    /// For predicates this evaluates the predicate under the coordinator lock.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        match self {
            Self::Counting(c) => c.is_fulfilled(),
            Self::Predicate(p) => p.is_fulfilled(),
        }
    }

    /// Returns `true` if nothing notifies the engine about progress, so the
    /// expectation has to be polled while a wait is in flight.
    #[must_use]
    pub fn needs_polling(&self) -> bool {
        matches!(self, Self::Predicate(_))
    }

    pub(crate) fn coordinator(&self) -> &WaitCoordinator {
        match self {
            Self::Counting(c) => c.coordinator(),
            Self::Predicate(p) => p.coordinator(),
        }
    }

    /// Evaluates fulfillment with the coordinator lock already held.
    pub(crate) fn is_fulfilled_locked(&self, state: &CoordinatorState) -> bool {
        match self {
            Self::Counting(c) => c.is_fulfilled_locked(state),
            Self::Predicate(p) => p.is_fulfilled_locked(state),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<CountingExpectation> for Expectation {
    fn from(expectation: CountingExpectation) -> Self {
        Self::Counting(expectation)
    }
}

impl From<&CountingExpectation> for Expectation {
    fn from(expectation: &CountingExpectation) -> Self {
        Self::Counting(expectation.clone())
    }
}

impl From<PredicateExpectation> for Expectation {
    fn from(expectation: PredicateExpectation) -> Self {
        Self::Predicate(expectation)
    }
}

impl From<&PredicateExpectation> for Expectation {
    fn from(expectation: &PredicateExpectation) -> Self {
        Self::Predicate(expectation.clone())
    }
}

impl From<&Expectation> for Expectation {
    fn from(expectation: &Expectation) -> Self {
        expectation.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ExpectationId::new();
        let b = ExpectationId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_id_display() {
        let id = ExpectationId(7);
        assert_eq!(id.to_string(), "Expectation(7)");
    }

    #[test]
    fn test_variant_dispatch() {
        let coordinator = WaitCoordinator::new();
        let counting = coordinator.counting("counted");
        let predicate = coordinator.predicate("polled", || true);

        let a = Expectation::from(&counting);
        let b = Expectation::from(&predicate);

        assert_eq!(a.id(), counting.id());
        assert_eq!(a.description(), "counted");
        assert_eq!(b.to_string(), "polled");
        assert!(!a.needs_polling());
        assert!(b.needs_polling());

        assert!(!a.is_fulfilled());
        assert!(b.is_fulfilled());
        counting.fulfill().unwrap();
        assert!(a.is_fulfilled());
    }
}
