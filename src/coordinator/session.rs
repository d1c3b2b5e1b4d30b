//! Bookkeeping for a single wait call.

use std::sync::atomic::{AtomicBool, Ordering};

use super::state::CoordinatorState;
use crate::expectation::{CountingExpectation, Expectation};

/// The expectation set of one wait call, in input order.
///
/// Every method takes the locked [`CoordinatorState`], so evaluation always
/// happens under the coordinator lock. Predicates seen `true` are latched and
/// never evaluated again for the rest of the call.
pub(crate) struct WaitSession {
    entries: Vec<Entry>,
}

struct Entry {
    expectation: Expectation,
    latched: AtomicBool,
}

impl Entry {
    fn check(&self, state: &CoordinatorState) -> bool {
        match &self.expectation {
            Expectation::Counting(_) => self.expectation.is_fulfilled_locked(state),
            Expectation::Predicate(_) => {
                if self.latched.load(Ordering::Acquire) {
                    return true;
                }
                let fulfilled = self.expectation.is_fulfilled_locked(state);
                if fulfilled {
                    self.latched.store(true, Ordering::Release);
                }
                fulfilled
            }
        }
    }

    fn is_pending_predicate(&self) -> bool {
        self.expectation.needs_polling() && !self.latched.load(Ordering::Acquire)
    }
}

impl WaitSession {
    pub(crate) fn new(expectations: Vec<Expectation>) -> Self {
        Self {
            entries: expectations
                .into_iter()
                .map(|expectation| Entry {
                    expectation,
                    latched: AtomicBool::new(false),
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Re-evaluates every expectation and reports whether all are fulfilled.
    ///
    /// Does not short-circuit, so every predicate that is already true gets
    /// latched.
    pub(crate) fn refresh(&self, state: &CoordinatorState) -> bool {
        let mut all = true;
        for entry in &self.entries {
            all &= entry.check(state);
        }
        all
    }

    /// Evaluates only the predicates not yet latched.
    ///
    /// Returns `true` once every predicate in the session is latched.
    pub(crate) fn poll_predicates(&self, state: &CoordinatorState) -> bool {
        let mut all = true;
        for entry in self.entries.iter().filter(|e| e.is_pending_predicate()) {
            all &= entry.check(state);
        }
        all
    }

    /// Returns whether every counting expectation is fulfilled.
    pub(crate) fn counting_fulfilled(&self, state: &CoordinatorState) -> bool {
        self.entries.iter().all(|entry| match &entry.expectation {
            Expectation::Counting(c) => c.is_fulfilled_locked(state),
            Expectation::Predicate(_) => true,
        })
    }

    /// Returns whether any predicate still has to be polled.
    pub(crate) fn needs_polling(&self) -> bool {
        self.entries.iter().any(Entry::is_pending_predicate)
    }

    /// Counting expectations that are not fulfilled yet.
    pub(crate) fn pending_counting(&self, state: &CoordinatorState) -> Vec<&CountingExpectation> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.expectation {
                Expectation::Counting(c) if !c.is_fulfilled_locked(state) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Descriptions of the unfulfilled expectations, in input order.
    pub(crate) fn unfulfilled(&self, state: &CoordinatorState) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.check(state))
            .map(|entry| entry.expectation.description().to_string())
            .collect()
    }

    /// IDs of every expectation in the session.
    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<crate::expectation::ExpectationId> {
        self.entries.iter().map(|e| e.expectation.id()).collect()
    }
}
