//! Mutexes with an atomic fast path
use core::{
    fmt,
    sync::atomic::{AtomicI32, Ordering},
};

use crate::{
    error::{LockMutexError, UnlockMutexError},
    port::{Port, RawSemaphore, WaitOutcome},
    time::Timeout,
};

/// The value of `FastMutex::state` when nobody owns the mutex.
const UNLOCKED: i32 = -1;

/// The value of `FastMutex::state` when the mutex is owned and nobody is
/// queued behind the owner.
const LOCKED: i32 = 0;

/// A non-recursive mutex that doesn't issue a blocking port call unless there
/// is contention.
///
/// `state` counts the threads interested in the mutex, offset by one:
///
/// | `state` | Meaning                                     |
/// | ------- | ------------------------------------------- |
/// | `-1`    | Unlocked                                    |
/// | `0`     | Locked, no waiters                          |
/// | `n > 0` | Locked, `n` threads waiting on `gate`       |
///
/// Ownership is handed from the releasing thread to exactly one waiter through
/// `gate`, a semaphore of capacity one.
///
/// The mutex doesn't track its owner. Locking it again from the owning thread
/// deadlocks (or times out), and any thread can release it.
pub struct FastMutex<P: Port> {
    state: AtomicI32,
    gate: P::Semaphore,
}

impl<P: Port> FastMutex<P> {
    /// Construct an unlocked `FastMutex`.
    pub fn new() -> Self {
        Self {
            state: AtomicI32::new(UNLOCKED),
            gate: P::Semaphore::new(0, 1),
        }
    }

    /// Acquire the mutex, blocking for at most `timeout` if it's owned by
    /// another thread.
    ///
    /// A waiter that times out stays accounted for in the contention count
    /// ([tag:timed_out_waiter_keeps_slot]). The next release then hands the
    /// ownership to nobody in particular; it's picked up by whichever thread
    /// reaches `gate` next. As a result, the mutex never returns to the
    /// uncontended state, and every subsequent acquisition goes through
    /// `gate`. Mutual exclusion is preserved.
    pub fn acquire(&self, timeout: Timeout) -> Result<(), LockMutexError> {
        let state = self.state.fetch_add(1, Ordering::AcqRel) + 1;
        if state == LOCKED {
            return Ok(());
        }

        log::trace!(
            "FastMutex({:p}) contended (state = {}), waiting for {:?}",
            self,
            state,
            timeout
        );

        match self.gate.acquire(timeout) {
            WaitOutcome::Signaled => Ok(()),
            WaitOutcome::TimedOut => {
                // FIXME: Decide whether a timed-out waiter should give its
                //        slot back. Doing it with a plain decrement races
                //        with a concurrent handoff through `gate`.
                //        [ref:timed_out_waiter_keeps_slot]
                log::trace!("FastMutex({:p}) timed out", self);
                Err(LockMutexError::Timeout)
            }
            WaitOutcome::Failed => {
                log::error!("FastMutex({:p}) failed to wait for the handoff", self);
                Err(LockMutexError::PlatformWait)
            }
        }
    }

    /// Release the mutex. If any thread is waiting for it, the ownership is
    /// handed to exactly one of them.
    pub fn release(&self) -> Result<(), UnlockMutexError> {
        let state = self.state.fetch_sub(1, Ordering::AcqRel) - 1;
        if state == UNLOCKED {
            return Ok(());
        }

        log::trace!("FastMutex({:p}) handing off (waiters = {})", self, state + 1);

        self.gate.release(1).map_err(|e| {
            log::error!("FastMutex({:p}) failed to hand off: {:?}", self, e);
            UnlockMutexError::PlatformWait
        })
    }

    /// Acquire the mutex, waiting as long as it takes.
    #[inline]
    pub fn lock(&self) -> Result<(), LockMutexError> {
        self.acquire(Timeout::FOREVER)
    }

    /// Equivalent to [`Self::release`].
    #[inline]
    pub fn unlock(&self) -> Result<(), UnlockMutexError> {
        self.release()
    }

    /// Get a flag indicating whether the mutex is currently owned (or was
    /// left looking owned by a timed-out waiter).
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }
}

impl<P: Port> Default for FastMutex<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> fmt::Debug for FastMutex<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FastMutex")
            .field("self", &(self as *const _))
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_port::{self, TestPort};
    use quickcheck_macros::quickcheck;

    type Mutex = FastMutex<TestPort>;

    #[test]
    fn uncontended_never_blocks() {
        test_port::forbid_blocking();
        let m = Mutex::new();
        for _ in 0..1000 {
            m.acquire(Timeout::ZERO).unwrap();
            assert!(m.is_locked());
            m.release().unwrap();
            assert!(!m.is_locked());
        }
        m.lock().unwrap();
        m.unlock().unwrap();
        assert_eq!(test_port::wait_calls(), 0);
    }

    /// Any single-threaded sequence of acquire/release pairs on any number of
    /// mutexes stays on the fast path.
    #[quickcheck]
    fn qc_fast_path(ops: Vec<u8>) {
        test_port::forbid_blocking();
        let mutexes: [Mutex; 4] = Default::default();
        let mut held = [false; 4];
        for op in ops {
            let i = (op % 4) as usize;
            if held[i] {
                mutexes[i].release().unwrap();
            } else {
                mutexes[i].acquire(Timeout::from_millis(10)).unwrap();
            }
            held[i] = !held[i];
            assert_eq!(mutexes[i].is_locked(), held[i]);
        }
    }

    #[test]
    fn contended_acquire_times_out() {
        let m = Mutex::new();
        m.lock().unwrap();

        let start = test_port::now();
        assert_eq!(
            m.acquire(Timeout::from_millis(50)),
            Err(LockMutexError::Timeout)
        );
        assert_eq!(test_port::now() - start, 50_000);
        assert_eq!(test_port::wait_calls(), 1);
    }

    /// Pins the current behavior of [ref:timed_out_waiter_keeps_slot].
    #[test]
    fn timed_out_waiter_keeps_its_slot() {
        let m = Mutex::new();
        m.lock().unwrap();
        assert_eq!(
            m.acquire(Timeout::from_millis(1)),
            Err(LockMutexError::Timeout)
        );
        assert_eq!(m.state.load(Ordering::Relaxed), 1);

        // The release hands off to the (departed) waiter
        m.release().unwrap();
        assert_eq!(m.state.load(Ordering::Relaxed), LOCKED);
        assert_eq!(m.gate.count(), 1);
        assert!(m.is_locked());

        // The next acquisition takes the orphaned handoff via `gate`, which
        // doesn't block
        let waits = test_port::wait_calls();
        m.acquire(Timeout::ZERO).unwrap();
        assert_eq!(test_port::wait_calls(), waits + 1);
        assert_eq!(m.gate.count(), 0);

        // ...and the mutex stays on the slow path from now on
        m.release().unwrap();
        assert_eq!(m.state.load(Ordering::Relaxed), LOCKED);
        m.acquire(Timeout::ZERO).unwrap();
        assert_eq!(test_port::wait_calls(), waits + 2);

        // Exclusion still holds
        assert_eq!(
            m.acquire(Timeout::from_millis(1)),
            Err(LockMutexError::Timeout)
        );
    }

    #[test]
    fn release_hands_off_to_waiter() {
        let m: &'static Mutex = Box::leak(Box::new(Mutex::new()));
        m.lock().unwrap();

        // While we are blocked, the owner releases the mutex
        test_port::on_next_block(move || m.release().unwrap());
        let start = test_port::now();
        m.lock().unwrap();
        assert_eq!(test_port::now(), start);

        // We own it now, with no one else queued
        assert_eq!(m.state.load(Ordering::Relaxed), LOCKED);
        assert_eq!(m.gate.count(), 0);
        m.release().unwrap();
        assert!(!m.is_locked());
    }

    #[test]
    fn platform_wait_failure() {
        let m = Mutex::new();
        m.lock().unwrap();
        test_port::fail_next_wait();
        assert_eq!(
            m.acquire(Timeout::FOREVER),
            Err(LockMutexError::PlatformWait)
        );
    }

    #[test]
    fn platform_handoff_failure() {
        let m = Mutex::new();
        // One waiter queued, and `gate` already holds its only token
        m.state.store(1, Ordering::Relaxed);
        m.gate.release(1).unwrap();
        assert_eq!(m.release(), Err(UnlockMutexError::PlatformWait));
    }
}
