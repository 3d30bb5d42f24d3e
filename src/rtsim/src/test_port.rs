//! An instrumented [`Port`] for unit tests.
//!
//! The clock is virtual and per-thread: a wait that isn't satisfied advances
//! the clock by the whole timeout and reports `TimedOut`, so timeout paths are
//! deterministic. Before giving up, a blocked wait runs the thread's
//! *interleave hook*, which stands in for "another thread did something while
//! we were blocked".
use std::{
    cell::{Cell, RefCell},
    num::NonZeroU64,
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};

use crate::{
    error::ReleaseSemaphoreError,
    port::{Port, RawNotify, RawSemaphore, ThreadKey, WaitOutcome},
    time::Timeout,
};

pub(crate) enum TestPort {}

thread_local! {
    static CLOCK: Cell<u64> = Cell::new(1_000_000);
    static BLOCKING_ALLOWED: Cell<bool> = Cell::new(true);
    static FAIL_NEXT_WAIT: Cell<bool> = Cell::new(false);
    static WAIT_CALLS: Cell<usize> = Cell::new(0);
    static INTERLEAVE: RefCell<Option<Box<dyn FnMut()>>> = RefCell::new(None);
    static BEFORE_RESET: RefCell<Option<Box<dyn FnMut()>>> = RefCell::new(None);
    static AFTER_TIMEOUT: RefCell<Option<Box<dyn FnMut()>>> = RefCell::new(None);
    static THREAD_KEY: ThreadKey = {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NonZeroU64::new(NEXT.fetch_add(1, Ordering::Relaxed)).unwrap()
    };
}

/// Panic if anything calls a blocking port primitive on this thread.
pub(crate) fn forbid_blocking() {
    BLOCKING_ALLOWED.with(|c| c.set(false));
}

/// Make the next blocking wait on this thread report a platform failure.
pub(crate) fn fail_next_wait() {
    FAIL_NEXT_WAIT.with(|c| c.set(true));
}

/// The number of blocking waits issued by this thread so far.
pub(crate) fn wait_calls() -> usize {
    WAIT_CALLS.with(|c| c.get())
}

/// The virtual clock of this thread.
pub(crate) fn now() -> u64 {
    CLOCK.with(|c| c.get())
}

pub(crate) fn advance(micros: u64) {
    CLOCK.with(|c| c.set(c.get() + micros));
}

/// Run `f` the next time a wait on this thread would block. The hook is
/// consumed by that wait.
pub(crate) fn on_next_block(f: impl FnMut() + 'static) {
    INTERLEAVE.with(|c| *c.borrow_mut() = Some(Box::new(f)));
}

/// Run `f` the next time this thread resets a notification object, just
/// before the reset takes effect.
pub(crate) fn on_next_reset(f: impl FnMut() + 'static) {
    BEFORE_RESET.with(|c| *c.borrow_mut() = Some(Box::new(f)));
}

/// Run `f` the next time a wait on this thread times out, after the wait has
/// given up on the object.
pub(crate) fn on_next_timeout(f: impl FnMut() + 'static) {
    AFTER_TIMEOUT.with(|c| *c.borrow_mut() = Some(Box::new(f)));
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Common prologue of a blocking wait. Returns `Some` if the wait should end
/// without inspecting the object.
fn enter_wait() -> Option<WaitOutcome> {
    assert!(
        BLOCKING_ALLOWED.with(|c| c.get()),
        "a blocking port primitive was called"
    );
    WAIT_CALLS.with(|c| c.set(c.get() + 1));
    if FAIL_NEXT_WAIT.with(|c| c.replace(false)) {
        Some(WaitOutcome::Failed)
    } else {
        None
    }
}

/// Common epilogue of a wait that found its object unavailable.
fn block(timeout: Timeout, mut poll: impl FnMut() -> bool) -> WaitOutcome {
    let hook = INTERLEAVE.with(|c| c.borrow_mut().take());
    if let Some(mut hook) = hook {
        hook();
        if poll() {
            return WaitOutcome::Signaled;
        }
    }
    match timeout.as_micros() {
        Some(micros) => {
            advance(micros);
            let hook = AFTER_TIMEOUT.with(|c| c.borrow_mut().take());
            if let Some(mut hook) = hook {
                hook();
            }
            WaitOutcome::TimedOut
        }
        None => panic!("the test would block forever"),
    }
}

impl Port for TestPort {
    type Notify = TestNotify;
    type Semaphore = TestSemaphore;

    fn now_us() -> u64 {
        now()
    }

    fn current_thread_key() -> ThreadKey {
        THREAD_KEY.with(|k| *k)
    }
}

pub(crate) struct TestNotify {
    signaled: AtomicBool,
}

impl RawNotify for TestNotify {
    fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
        }
    }

    fn set(&self) {
        self.signaled.store(true, Ordering::SeqCst);
    }

    fn reset(&self) {
        let hook = BEFORE_RESET.with(|c| c.borrow_mut().take());
        if let Some(mut hook) = hook {
            hook();
        }
        self.signaled.store(false, Ordering::SeqCst);
    }

    fn wait(&self, timeout: Timeout) -> WaitOutcome {
        if let Some(outcome) = enter_wait() {
            return outcome;
        }
        if self.signaled.load(Ordering::SeqCst) {
            return WaitOutcome::Signaled;
        }
        block(timeout, || self.signaled.load(Ordering::SeqCst))
    }
}

impl TestNotify {
    pub(crate) fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestSemaphore {
    count: AtomicU32,
    max: u32,
}

impl TestSemaphore {
    fn try_take(&self) -> bool {
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .is_ok()
    }

    pub(crate) fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl RawSemaphore for TestSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            max,
        }
    }

    fn acquire(&self, timeout: Timeout) -> WaitOutcome {
        if let Some(outcome) = enter_wait() {
            return outcome;
        }
        if self.try_take() {
            return WaitOutcome::Signaled;
        }
        block(timeout, || self.try_take())
    }

    fn release(&self, count: u32) -> Result<(), ReleaseSemaphoreError> {
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                c.checked_add(count).filter(|&new| new <= self.max)
            })
            .map(drop)
            .map_err(|_| ReleaseSemaphoreError::QueueOverflow)
    }
}
