//! Periodic predicate polling on a dedicated thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::session::WaitSession;
use super::state::CoordinatorInner;

/// Cancellation signal shared between a poller and its owner.
#[derive(Default)]
struct Cancellation {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl Cancellation {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.signal.notify_all();
    }

    /// Sleeps for `interval` unless cancelled first. Returns `true` if cancelled.
    fn sleep(&self, interval: Duration) -> bool {
        let deadline = Instant::now().checked_add(interval);
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.signal.wait(&mut cancelled),
            }
        }
        *cancelled
    }
}

/// Handle to a running predicate poller.
///
/// Each tick evaluates the session's predicates that have not been seen
/// `true` yet and wakes the waiter when the whole session is fulfilled. The
/// thread exits on its own once every predicate is latched. Dropping the
/// handle cancels the poller and joins its thread, so the caller must not
/// hold the coordinator lock at that point.
pub(crate) struct PredicatePoller {
    cancellation: Arc<Cancellation>,
    handle: Option<JoinHandle<()>>,
}

impl PredicatePoller {
    pub(crate) fn spawn(
        coordinator: Arc<CoordinatorInner>,
        session: Arc<WaitSession>,
        interval: Duration,
    ) -> io::Result<Self> {
        let cancellation = Arc::new(Cancellation::default());
        let handle = thread::Builder::new()
            .name("testkit-wait-poller".to_string())
            .spawn({
                let cancellation = Arc::clone(&cancellation);
                move || run(&coordinator, &session, &cancellation, interval)
            })?;

        Ok(Self {
            cancellation,
            handle: Some(handle),
        })
    }

    /// Stops the poller and waits for its thread to exit.
    pub(crate) fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            // A panicking predicate already unwound the poller; the waiter
            // reports the expectation as unfulfilled.
            let _ = handle.join();
        }
    }
}

impl Drop for PredicatePoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    coordinator: &CoordinatorInner,
    session: &WaitSession,
    cancellation: &Cancellation,
    interval: Duration,
) {
    let mut ticks: u64 = 0;
    loop {
        if cancellation.sleep(interval) {
            trace!(ticks, "predicate poller cancelled");
            return;
        }
        ticks += 1;

        let state = coordinator.state.lock();
        let predicates_done = session.poll_predicates(&state);
        if predicates_done && session.counting_fulfilled(&state) {
            coordinator.progress.notify_all();
        }
        drop(state);

        trace!(ticks, predicates_done, "predicate poller tick");
        if predicates_done {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::WaitCoordinator;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_cancellation_sleep_times_out() {
        let cancellation = Cancellation::default();
        let start = Instant::now();
        assert!(!cancellation.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancelled_sleep_returns_immediately() {
        let cancellation = Cancellation::default();
        cancellation.cancel();
        assert!(cancellation.sleep(Duration::from_secs(60)));
    }

    #[test]
    fn test_poller_stops_once_predicates_latched() {
        let coordinator = WaitCoordinator::new();
        let flag = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let (flag2, calls2) = (Arc::clone(&flag), Arc::clone(&calls));
        let predicate = coordinator.predicate("flag", move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            flag2.load(Ordering::SeqCst)
        });

        let session = Arc::new(WaitSession::new(vec![(&predicate).into()]));
        let poller = PredicatePoller::spawn(
            Arc::clone(&coordinator.inner),
            Arc::clone(&session),
            Duration::from_millis(5),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        flag.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60));

        let after_latch = calls.load(Ordering::SeqCst);
        flag.store(false, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after_latch);
        assert!(!session.needs_polling());

        poller.cancel();
    }

    #[test]
    fn test_drop_cancels_poller() {
        let coordinator = WaitCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let predicate = coordinator.predicate("never", move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            false
        });

        let session = Arc::new(WaitSession::new(vec![(&predicate).into()]));
        let poller = PredicatePoller::spawn(
            Arc::clone(&coordinator.inner),
            session,
            Duration::from_millis(5),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        drop(poller);

        let after_drop = calls.load(Ordering::SeqCst);
        assert!(after_drop > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }
}
