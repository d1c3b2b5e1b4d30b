//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Installs a test-writer tracing subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runs `f` on a background thread after `delay`.
pub fn schedule_after<F>(delay: Duration, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(move || {
        thread::sleep(delay);
        f();
    })
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
