//! The `WaitCoordinator` implementation.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::config::CoordinatorConfig;
use super::poller::PredicatePoller;
use super::session::WaitSession;
use super::state::{CoordinatorInner, Listener, WaitToken};
use crate::error::{Error, Result};
use crate::expectation::{CountingExpectation, Expectation, ExpectationId, PredicateExpectation};

/// Blocks a thread until a set of expectations is fulfilled.
///
/// The coordinator creates expectations, owns the lock guarding their state
/// and runs the wait engine. Clones share the same lock, so a clone can be
/// handed to producer code that needs
/// [`critical_section`](Self::critical_section).
///
/// Independent tests should use independent coordinators; waits on one
/// coordinator never contend with waits on another.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use testkit_wait::coordinator::WaitCoordinator;
/// use testkit_wait::Error;
///
/// let coordinator = WaitCoordinator::new();
/// let first = coordinator.counting("first");
/// let second = coordinator.counting("second");
///
/// first.fulfill().unwrap();
///
/// let err = coordinator
///     .wait_for_all([&first, &second], Duration::from_millis(100))
///     .unwrap_err();
/// assert!(matches!(err, Error::Timeout { .. }));
/// assert_eq!(err.unfulfilled(), ["second"]);
/// ```
#[derive(Clone)]
pub struct WaitCoordinator {
    pub(crate) inner: Arc<CoordinatorInner>,
}

impl Default for WaitCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitCoordinator {
    /// Creates a coordinator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Creates a coordinator with the given configuration.
    #[must_use]
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner::new(config)),
        }
    }

    /// Returns the coordinator's configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Creates a counting expectation expecting one fulfillment.
    #[must_use]
    pub fn counting(&self, description: impl Into<String>) -> CountingExpectation {
        CountingExpectation::new(self.clone(), description.into())
    }

    /// Creates an expectation fulfilled once `predicate` returns `true`.
    #[must_use]
    pub fn predicate<F>(&self, description: impl Into<String>, predicate: F) -> PredicateExpectation
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        PredicateExpectation::new(self.clone(), description.into(), predicate)
    }

    /// Runs `f` while holding the coordinator lock.
    ///
    /// Predicates are evaluated under the same lock, so state mutated here is
    /// never observed half-updated by a predicate. `f` must not call back into
    /// this coordinator or any expectation it created.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use testkit_wait::coordinator::WaitCoordinator;
    ///
    /// let coordinator = WaitCoordinator::new();
    /// let items = Arc::new(AtomicUsize::new(0));
    /// let seen = Arc::clone(&items);
    /// let full = coordinator.predicate("queue full", move || seen.load(Ordering::SeqCst) == 2);
    ///
    /// coordinator.critical_section(|| {
    ///     items.fetch_add(1, Ordering::SeqCst);
    ///     items.fetch_add(1, Ordering::SeqCst);
    /// });
    /// assert!(full.is_fulfilled());
    /// ```
    pub fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        let _state = self.inner.state.lock();
        f()
    }

    /// Attaches a listener invoked when `expectation` becomes fulfilled.
    ///
    /// The listener runs on the thread whose `fulfill` call reached the
    /// expected count, after the coordinator lock is released, and only on
    /// that transition. An expectation holds at most one attached listener;
    /// attaching replaces the previous one. Wait calls register their own
    /// listeners separately and never displace this one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if `expectation` was created by a
    /// different coordinator.
    pub fn attach<F>(&self, expectation: &CountingExpectation, on_progress: F) -> Result<()>
    where
        F: Fn(&CountingExpectation) + Send + Sync + 'static,
    {
        self.ensure_owned(&Expectation::from(expectation))?;
        let previous = self
            .inner
            .state
            .lock()
            .listeners
            .insert(expectation.id(), Arc::new(on_progress));
        trace!(expectation = %expectation.description(), "listener attached");
        drop(previous);
        Ok(())
    }

    /// Detaches the listener of `expectation`.
    ///
    /// Returns `true` if a listener was attached.
    pub fn detach(&self, expectation: &CountingExpectation) -> bool {
        if !self.owns(expectation.coordinator()) {
            return false;
        }
        let previous = self.inner.state.lock().listeners.remove(&expectation.id());
        trace!(expectation = %expectation.description(), "listener detached");
        previous.is_some()
    }

    /// Returns whether any listener is attached to `expectation`, either
    /// through [`attach`](Self::attach) or by a wait call in progress.
    #[must_use]
    pub fn has_listener(&self, expectation: &CountingExpectation) -> bool {
        self.owns(expectation.coordinator())
            && self.inner.state.lock().has_listener(expectation.id())
    }

    /// Waits until `expectation` is fulfilled or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// See [`wait_for_all`](Self::wait_for_all).
    pub fn wait_for(&self, expectation: impl Into<Expectation>, timeout: Duration) -> Result<()> {
        self.wait_for_all([expectation.into()], timeout)
    }

    /// Waits until every expectation is fulfilled or `timeout` elapses.
    ///
    /// Returns immediately if all expectations are already fulfilled.
    /// Otherwise unfulfilled counting expectations get a listener that wakes
    /// this thread on progress, and unfulfilled predicates are polled on a
    /// separate thread. Both are removed before this method returns, on
    /// every path.
    ///
    /// # Errors
    ///
    /// - [`Error::NoExpectationsProvided`] if `expectations` is empty.
    /// - [`Error::InvalidConfiguration`] if an expectation was created by a
    ///   different coordinator.
    /// - [`Error::Spawn`] if the predicate poller cannot be started.
    /// - [`Error::Timeout`] if expectations are still unfulfilled when the
    ///   timeout elapses. It lists their descriptions in input order.
    ///
    /// # Panics
    ///
    /// Propagates a panic raised by a predicate evaluated on this thread.
    pub fn wait_for_all<I>(&self, expectations: I, timeout: Duration) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Expectation>,
    {
        let expectations: Vec<Expectation> = expectations.into_iter().map(Into::into).collect();
        if expectations.is_empty() {
            return Err(Error::NoExpectationsProvided);
        }
        for expectation in &expectations {
            self.ensure_owned(expectation)?;
        }

        let deadline = Instant::now().checked_add(timeout);
        let session = Arc::new(WaitSession::new(expectations));
        debug!(expectations = session.len(), ?timeout, "waiting for expectations");

        let mut teardown = {
            let mut state = self.inner.state.lock();
            if session.refresh(&state) {
                debug!("expectations already fulfilled");
                return Ok(());
            }

            let token = WaitToken::new();
            let listener = self.progress_listener(&session);
            let mut registered = Vec::new();
            for expectation in session.pending_counting(&state) {
                // The same expectation may appear more than once in the set
                if state.register_waiter(expectation.id(), token, Arc::clone(&listener)) {
                    registered.push(expectation.id());
                    trace!(expectation = %expectation.description(), "listener attached");
                }
            }
            Teardown {
                inner: &self.inner,
                token,
                registered,
                poller: None,
            }
        };

        if session.needs_polling() {
            teardown.poller = Some(PredicatePoller::spawn(
                Arc::clone(&self.inner),
                Arc::clone(&session),
                self.inner.config.poll_interval(),
            )?);
            trace!(interval = ?self.inner.config.poll_interval(), "predicate poller started");
        }

        // Declared after `teardown` so the lock is released before teardown runs.
        let mut state = self.inner.state.lock();
        loop {
            if session.refresh(&state) {
                break;
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.progress.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.progress.wait(&mut state),
            }
        }
        let unfulfilled = session.unfulfilled(&state);
        drop(state);
        drop(teardown);

        if unfulfilled.is_empty() {
            debug!("expectations fulfilled");
            Ok(())
        } else {
            debug!(?unfulfilled, ?timeout, "wait timed out");
            Err(Error::Timeout {
                timeout,
                unfulfilled,
            })
        }
    }

    /// Builds the listener a wait call attaches to its counting expectations.
    ///
    /// It re-checks the whole session, not just the fulfilled expectation,
    /// and signals the waiter only once everything is fulfilled.
    fn progress_listener(&self, session: &Arc<WaitSession>) -> Listener {
        let inner: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
        let session: Weak<WaitSession> = Arc::downgrade(session);
        Arc::new(move |_: &CountingExpectation| {
            let (Some(inner), Some(session)) = (inner.upgrade(), session.upgrade()) else {
                return;
            };
            let state = inner.state.lock();
            if session.refresh(&state) {
                inner.progress.notify_all();
            }
        })
    }

    fn owns(&self, other: &WaitCoordinator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_owned(&self, expectation: &Expectation) -> Result<()> {
        if self.owns(expectation.coordinator()) {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "expectation '{}' was created by a different coordinator",
                expectation.description()
            )))
        }
    }
}

impl fmt::Debug for WaitCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitCoordinator")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Undoes a wait call's listener and poller setup when dropped.
///
/// Must be dropped without the coordinator lock held: it joins the poller
/// thread, which may be waiting for the lock.
struct Teardown<'a> {
    inner: &'a CoordinatorInner,
    token: WaitToken,
    /// Expectations this wait registered a listener on.
    registered: Vec<ExpectationId>,
    poller: Option<PredicatePoller>,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }

        let detached: Vec<Listener> = {
            let mut state = self.inner.state.lock();
            self.registered
                .drain(..)
                .filter_map(|id| state.unregister_waiter(id, self.token))
                .collect()
        };
        trace!(listeners = detached.len(), "wait torn down");
    }
}
