//! # testkit-wait
//!
//! > Block a test thread until asynchronous work has happened
//!
//! **testkit-wait** lets a test wait for callbacks, timers or background
//! threads to finish without sleeping for a fixed amount of time and without
//! an async runtime. The test creates expectations, starts the asynchronous
//! work and then blocks until every expectation is fulfilled or a timeout
//! elapses.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::thread;
//! use std::time::Duration;
//! use testkit_wait::prelude::*;
//!
//! let coordinator = WaitCoordinator::new();
//! let saved = coordinator.counting("record saved");
//!
//! let callback = saved.clone();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_millis(10));
//!     callback.fulfill().unwrap();
//! });
//!
//! coordinator.wait_for(&saved, Duration::from_secs(1)).unwrap();
//! ```
//!
//! ## Features
//!
//! - **Counting expectations** - fulfilled by explicit `fulfill` calls
//! - **Predicate expectations** - polled until a condition holds
//! - **Multi-expectation waits** - woken exactly when progress is made
//! - **Descriptive timeouts** - errors name every unfulfilled expectation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod error;
pub mod expectation;

/// Prelude for convenient imports
///
/// ```rust
/// use testkit_wait::prelude::*;
/// ```
pub mod prelude {
    pub use crate::coordinator::{CoordinatorConfig, WaitCoordinator};
    pub use crate::error::{Error, Result};
    pub use crate::expectation::{
        CountingExpectation, Expectation, ExpectationId, PredicateExpectation,
    };
}

// Re-exports
pub use coordinator::{CoordinatorConfig, WaitCoordinator};
pub use error::{Error, Result};
pub use expectation::{CountingExpectation, Expectation, ExpectationId, PredicateExpectation};
