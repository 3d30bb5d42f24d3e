//! Utilities shared by the integration tests
#![allow(dead_code)]
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

pub fn init_logger() {
    // `is_test(true)` would drop log messages from other threads
    let _ = env_logger::try_init();
}

/// Give the other threads enough time to reach a blocking call.
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}

/// Leak a value to obtain a `'static` reference shareable between threads.
pub fn leak<T>(x: T) -> &'static T {
    Box::leak(Box::new(x))
}

/// Tracks the progress of a test across threads.
#[derive(Debug)]
pub struct SeqTracker {
    counter: AtomicUsize,
}

impl SeqTracker {
    pub const fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    /// Assert that the counter is equal to `old` and then replace it with
    /// `new`.
    #[track_caller]
    pub fn expect_and_replace(&self, old: usize, new: usize) {
        let result = self
            .counter
            .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire);
        log::debug!("{:?} (expected: {}) → {}", result, old, new);
        if let Err(got) = result {
            panic!("expected {}, got {}", old, got);
        }
    }
}
