//! State guarded by the coordinator lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::config::CoordinatorConfig;
use crate::expectation::{CountingExpectation, ExpectationId};

/// Callback invoked when a counting expectation becomes fulfilled.
pub(crate) type Listener = Arc<dyn Fn(&CountingExpectation) + Send + Sync>;

/// Fulfillment bookkeeping for one counting expectation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CounterState {
    pub(crate) count: usize,
    pub(crate) expected: usize,
    pub(crate) assert_for_over_fulfill: bool,
}

impl Default for CounterState {
    fn default() -> Self {
        Self {
            count: 0,
            expected: 1,
            assert_for_over_fulfill: true,
        }
    }
}

impl CounterState {
    pub(crate) fn is_fulfilled(&self) -> bool {
        self.expected >= 1 && self.count >= self.expected
    }
}

/// Identifies the listener registrations of one wait call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct WaitToken(u64);

impl WaitToken {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything the coordinator lock protects.
#[derive(Default)]
pub(crate) struct CoordinatorState {
    pub(crate) counters: HashMap<ExpectationId, CounterState>,
    /// Listeners attached through the public observer API, one per expectation.
    pub(crate) listeners: HashMap<ExpectationId, Listener>,
    /// Listeners registered by in-flight wait calls.
    pub(crate) waiters: HashMap<ExpectationId, Vec<(WaitToken, Listener)>>,
}

impl CoordinatorState {
    pub(crate) fn counter_mut(&mut self, id: ExpectationId) -> &mut CounterState {
        self.counters.entry(id).or_default()
    }

    /// Registers a wait call's listener, at most once per token.
    ///
    /// Returns `false` if `token` already has a listener on `id`.
    pub(crate) fn register_waiter(
        &mut self,
        id: ExpectationId,
        token: WaitToken,
        listener: Listener,
    ) -> bool {
        let registrations = self.waiters.entry(id).or_default();
        if registrations.iter().any(|(t, _)| *t == token) {
            return false;
        }
        registrations.push((token, listener));
        true
    }

    /// Removes the listener `token` registered on `id`, if any.
    pub(crate) fn unregister_waiter(&mut self, id: ExpectationId, token: WaitToken) -> Option<Listener> {
        let registrations = self.waiters.get_mut(&id)?;
        let index = registrations.iter().position(|(t, _)| *t == token)?;
        let (_, listener) = registrations.remove(index);
        if registrations.is_empty() {
            self.waiters.remove(&id);
        }
        Some(listener)
    }

    /// Every listener to notify when `id` becomes fulfilled.
    pub(crate) fn listeners_for(&self, id: ExpectationId) -> Vec<Listener> {
        self.listeners
            .get(&id)
            .into_iter()
            .chain(self.waiters.get(&id).into_iter().flatten().map(|(_, l)| l))
            .cloned()
            .collect()
    }

    pub(crate) fn has_listener(&self, id: ExpectationId) -> bool {
        self.listeners.contains_key(&id) || self.waiters.contains_key(&id)
    }

    /// Drops every registration for `id`, returning them for unlocked disposal.
    pub(crate) fn remove_all_listeners(&mut self, id: ExpectationId) -> Vec<Listener> {
        let mut removed: Vec<Listener> = self.listeners.remove(&id).into_iter().collect();
        if let Some(registrations) = self.waiters.remove(&id) {
            removed.extend(registrations.into_iter().map(|(_, l)| l));
        }
        removed
    }
}

pub(crate) struct CoordinatorInner {
    pub(crate) state: Mutex<CoordinatorState>,
    /// Signalled whenever a wait may have become satisfiable.
    pub(crate) progress: Condvar,
    pub(crate) config: CoordinatorConfig,
}

impl CoordinatorInner {
    pub(crate) fn new(config: CoordinatorConfig) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            progress: Condvar::new(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_fulfillment() {
        let mut counter = CounterState::default();
        assert!(!counter.is_fulfilled());

        counter.count = 1;
        assert!(counter.is_fulfilled());

        counter.count = 5;
        assert!(counter.is_fulfilled());
    }

    fn noop() -> Listener {
        Arc::new(|_: &CountingExpectation| {})
    }

    #[test]
    fn test_waiter_registered_once_per_token() {
        let mut state = CoordinatorState::default();
        let id = ExpectationId::new();
        let token = WaitToken::new();

        assert!(state.register_waiter(id, token, noop()));
        assert!(!state.register_waiter(id, token, noop()));
        assert_eq!(state.listeners_for(id).len(), 1);

        assert!(state.unregister_waiter(id, token).is_some());
        assert!(state.unregister_waiter(id, token).is_none());
        assert!(!state.has_listener(id));
    }

    #[test]
    fn test_waiters_are_independent() {
        let mut state = CoordinatorState::default();
        let id = ExpectationId::new();
        let (a, b) = (WaitToken::new(), WaitToken::new());
        state.listeners.insert(id, noop());

        state.register_waiter(id, a, noop());
        state.register_waiter(id, b, noop());
        assert_eq!(state.listeners_for(id).len(), 3);

        state.unregister_waiter(id, a);
        assert_eq!(state.listeners_for(id).len(), 2);
        assert_eq!(state.waiters[&id][0].0, b);

        assert_eq!(state.remove_all_listeners(id).len(), 2);
        assert!(!state.has_listener(id));
    }

    #[test]
    fn test_zero_expected_is_never_fulfilled() {
        let counter = CounterState {
            count: 3,
            expected: 0,
            assert_for_over_fulfill: false,
        };
        assert!(!counter.is_fulfilled());
    }
}
