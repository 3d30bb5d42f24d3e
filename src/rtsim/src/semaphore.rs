//! Counting semaphores with an atomic fast path
use core::{
    fmt,
    sync::atomic::{AtomicI32, Ordering},
};

use crate::{
    error::{SignalSemaphoreError, WaitSemaphoreError},
    port::{Port, RawSemaphore, WaitOutcome},
    time::Timeout,
};

/// A bounded counting semaphore that only reaches for the port's semaphore
/// when a thread has to block.
///
/// A non-negative `count` is the number of available tokens. A negative
/// `count` is the number of threads waiting on `gate`, negated. Unlike
/// [`FastMutex`](crate::mutex::FastMutex), whose timed-out waiters keep their
/// place ([ref:timed_out_waiter_keeps_slot]), a waiter that times out gives
/// its place back, because any thread may release a semaphore and an orphaned
/// place would let the tokens exceed `max`.
pub struct Semaphore<P: Port> {
    count: AtomicI32,
    max: u32,
    gate: P::Semaphore,
}

impl<P: Port> Semaphore<P> {
    /// Construct a `Semaphore` holding `initial` tokens out of `max`.
    ///
    /// `initial` is clamped to `max`, and `max` to `i32::MAX`.
    pub fn new(initial: u32, max: u32) -> Self {
        let max = max.min(i32::MAX as u32);
        Self {
            count: AtomicI32::new(initial.min(max) as i32),
            max,
            gate: P::Semaphore::new(0, i32::MAX as u32),
        }
    }

    /// Take a token, blocking for at most `timeout` if none is available.
    ///
    /// Returns the number of tokens left.
    pub fn wait(&self, timeout: Timeout) -> Result<u32, WaitSemaphoreError> {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        if prev > 0 {
            return Ok((prev - 1) as u32);
        }

        log::trace!(
            "Semaphore({:p}) exhausted (count = {}), waiting for {:?}",
            self,
            prev - 1,
            timeout
        );

        match self.gate.acquire(timeout) {
            WaitOutcome::Signaled => Ok(self.count()),
            WaitOutcome::TimedOut => self.withdraw(),
            WaitOutcome::Failed => {
                log::error!("Semaphore({:p}) failed to wait for a token", self);
                Err(WaitSemaphoreError::PlatformWait)
            }
        }
    }

    /// Give back the place of a waiter that timed out.
    ///
    /// If a `release` has already counted this waiter in, a token is in
    /// `gate` (or about to be), and the waiter takes it after all. If a newer
    /// waiter took that token from `gate` first, the newer waiter's place is
    /// the one given back.
    fn withdraw(&self) -> Result<u32, WaitSemaphoreError> {
        loop {
            let withdrawn = self
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                    (c < 0).then(|| c + 1)
                })
                .is_ok();

            if withdrawn {
                log::trace!("Semaphore({:p}) timed out", self);
                return Err(WaitSemaphoreError::Timeout);
            }

            match self.gate.acquire(Timeout::ZERO) {
                WaitOutcome::Signaled => {
                    log::trace!(
                        "Semaphore({:p}) timed out racing with a release, took the token",
                        self
                    );
                    return Ok(self.count());
                }
                WaitOutcome::Failed => {
                    log::error!("Semaphore({:p}) failed to take a released token", self);
                    return Err(WaitSemaphoreError::PlatformWait);
                }
                // The releaser hasn't reached `gate` yet
                WaitOutcome::TimedOut => core::hint::spin_loop(),
            }
        }
    }

    /// Take a token if one is available, without blocking and without
    /// leaving a waiter slot behind.
    ///
    /// Returns the number of tokens left.
    pub fn poll(&self) -> Result<u32, WaitSemaphoreError> {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c > 0).then(|| c - 1)
            }) {
            Ok(prev) => Ok((prev - 1) as u32),
            Err(_) => Err(WaitSemaphoreError::Timeout),
        }
    }

    /// Return a token. If any thread is waiting, the token is handed to
    /// exactly one of them.
    pub fn release(&self) -> Result<(), SignalSemaphoreError> {
        let max = self.max as i32;
        let prev = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c < max).then(|| c + 1)
            })
            .map_err(|_| SignalSemaphoreError::QueueOverflow)?;

        if prev < 0 {
            log::trace!("Semaphore({:p}) handing off (waiters = {})", self, -prev);
            self.gate.release(1).map_err(|e| {
                log::error!("Semaphore({:p}) failed to hand off: {:?}", self, e);
                SignalSemaphoreError::PlatformWait
            })?;
        }

        Ok(())
    }

    /// Get the number of available tokens.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed).max(0) as u32
    }

    /// Get the maximum number of tokens.
    #[inline]
    pub fn max(&self) -> u32 {
        self.max
    }
}

impl<P: Port> fmt::Debug for Semaphore<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("self", &(self as *const _))
            .field("count", &self.count.load(Ordering::Relaxed))
            .field("max", &self.max)
            .finish()
    }
}
