//! Polled expectations.

use std::fmt;
use std::sync::Arc;

use crate::coordinator::state::CoordinatorState;
use crate::coordinator::WaitCoordinator;
use crate::expectation::ExpectationId;

type Predicate = dyn Fn() -> bool + Send + Sync;

/// An expectation fulfilled once its predicate returns `true`.
///
/// The predicate is always evaluated while the coordinator lock is held.
/// Producers that mutate the state the predicate reads should do so inside
/// [`WaitCoordinator::critical_section`] so an evaluation never observes a
/// half-applied update. The predicate itself must not block indefinitely
/// and must not call back into the coordinator.
///
/// Once a wait call has seen the predicate return `true` it stops polling
/// it; predicates are expected to stay true after they first become true.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use testkit_wait::coordinator::WaitCoordinator;
///
/// let coordinator = WaitCoordinator::new();
/// let flag = Arc::new(AtomicBool::new(false));
///
/// let observed = Arc::clone(&flag);
/// let ready = coordinator.predicate("flag raised", move || observed.load(Ordering::SeqCst));
/// assert!(!ready.is_fulfilled());
///
/// flag.store(true, Ordering::SeqCst);
/// assert!(ready.is_fulfilled());
/// ```
#[derive(Clone)]
pub struct PredicateExpectation {
    inner: Arc<PredicateInner>,
}

struct PredicateInner {
    id: ExpectationId,
    description: String,
    predicate: Box<Predicate>,
    coordinator: WaitCoordinator,
}

impl PredicateExpectation {
    pub(crate) fn new<F>(coordinator: WaitCoordinator, description: String, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PredicateInner {
                id: ExpectationId::new(),
                description,
                predicate: Box::new(predicate),
                coordinator,
            }),
        }
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

    /// Evaluates the predicate under the coordinator lock.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        let state = self.coordinator().inner.state.lock();
        self.is_fulfilled_locked(&state)
    }

    pub(crate) fn coordinator(&self) -> &WaitCoordinator {
        &self.inner.coordinator
    }

    /// The state reference is proof the coordinator lock is held.
    pub(crate) fn is_fulfilled_locked(&self, _state: &CoordinatorState) -> bool {
        (self.inner.predicate)()
    }
}

impl fmt::Debug for PredicateExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateExpectation")
            .field("id", &self.id())
            .field("description", &self.description())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PredicateExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_evaluates_predicate_each_call() {
        let coordinator = WaitCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let expectation = coordinator.predicate("counted", move || {
            calls2.fetch_add(1, Ordering::SeqCst) >= 2
        });

        assert!(!expectation.is_fulfilled());
        assert!(!expectation.is_fulfilled());
        assert!(expectation.is_fulfilled());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_caching_in_expectation() {
        let coordinator = WaitCoordinator::new();
        let flag = Arc::new(AtomicBool::new(true));
        let flag2 = Arc::clone(&flag);
        let expectation = coordinator.predicate("flag", move || flag2.load(Ordering::SeqCst));

        assert!(expectation.is_fulfilled());
        flag.store(false, Ordering::SeqCst);
        assert!(!expectation.is_fulfilled());
    }

    #[test]
    fn test_clones_share_predicate() {
        let coordinator = WaitCoordinator::new();
        let expectation = coordinator.predicate("shared", || true);
        let clone = expectation.clone();
        assert_eq!(clone.id(), expectation.id());
        assert!(clone.is_fulfilled());
    }

    #[test]
    fn test_debug_and_display() {
        let coordinator = WaitCoordinator::new();
        let expectation = coordinator.predicate("ready", || false);
        assert_eq!(expectation.to_string(), "ready");
        assert!(format!("{expectation:?}").contains("PredicateExpectation"));
    }
}
