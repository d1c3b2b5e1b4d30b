//! Blocking waits over sets of expectations.
//!
//! A [`WaitCoordinator`] owns one mutex and one condition variable shared by
//! every expectation it creates. A wait call blocks the calling thread on
//! that condition variable until all of its expectations are fulfilled or
//! the timeout elapses:
//!
//! - counting expectations wake the waiter through a listener that runs on
//!   the thread calling [`fulfill`](crate::expectation::CountingExpectation::fulfill);
//! - predicate expectations are evaluated by a poller thread at most once per
//!   [`poll_interval`](CoordinatorConfig::poll_interval).
//!
//! Listeners and the poller only live for the duration of one wait call.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//! use testkit_wait::coordinator::WaitCoordinator;
//! use testkit_wait::expectation::Expectation;
//!
//! let coordinator = WaitCoordinator::new();
//! let response = coordinator.counting("response received");
//! let flag = Arc::new(AtomicBool::new(false));
//! let observed = Arc::clone(&flag);
//! let cache = coordinator.predicate("cache warmed", move || observed.load(Ordering::SeqCst));
//!
//! let producer = response.clone();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_millis(20));
//!     flag.store(true, Ordering::SeqCst);
//!     producer.fulfill().unwrap();
//! });
//!
//! coordinator
//!     .wait_for_all(
//!         [Expectation::from(&response), Expectation::from(&cache)],
//!         Duration::from_secs(2),
//!     )
//!     .unwrap();
//! ```

mod config;
mod poller;
mod session;
pub(crate) mod state;
mod wait_coordinator;

pub use config::{CoordinatorConfig, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use wait_coordinator::WaitCoordinator;
