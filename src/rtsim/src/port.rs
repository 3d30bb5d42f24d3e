//! The platform surface required from a host environment.
//!
//! The primitives in this crate only need four things from their host: a
//! monotonic microsecond clock, a way to identify the calling thread, a
//! manual-reset notification object, and a counting semaphore. A port bundles
//! these as a [`Port`] implementation, and every primitive is instantiated over
//! one (e.g., `FlagSet<StdPort>`).
use core::num::NonZeroU64;

use crate::{error::ReleaseSemaphoreError, time::Timeout};

/// Implemented by a port.
///
/// `Port` types are never instantiated; they only select the platform
/// bindings through their associated items.
pub trait Port: Sized + 'static {
    /// The manual-reset notification object.
    type Notify: RawNotify;

    /// The counting semaphore.
    type Semaphore: RawSemaphore;

    /// Get the current time in microseconds.
    ///
    /// The returned value must never decrease across calls from any thread.
    /// The origin is unspecified.
    fn now_us() -> u64;

    /// Get a key identifying the calling thread.
    ///
    /// Two threads that are alive at the same time must never have the same
    /// key. A thread's key must not change during its lifetime.
    fn current_thread_key() -> ThreadKey;
}

/// A non-zero identifier of a host thread, assigned by [`Port`].
pub type ThreadKey = NonZeroU64;

/// The result of a blocking wait on a port primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The object was signaled (or, for a semaphore, a token was taken).
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
    /// The platform failed to perform the wait.
    Failed,
}

/// A binary signaled/unsignaled wait object that stays signaled until it's
/// explicitly reset (a Win32 manual-reset event).
pub trait RawNotify: Send + Sync {
    /// Construct an unsignaled object.
    fn new() -> Self;

    /// Put the object into the signaled state, releasing every thread that is
    /// currently blocked in [`Self::wait`].
    fn set(&self);

    /// Put the object into the unsignaled state.
    fn reset(&self);

    /// Block the calling thread until the object is signaled or `timeout`
    /// elapses. Returns immediately if the object is already signaled.
    ///
    /// Implementations may return `Signaled` spuriously; callers re-check
    /// their own predicate.
    fn wait(&self, timeout: Timeout) -> WaitOutcome;
}

/// A counting semaphore with an upper bound.
pub trait RawSemaphore: Send + Sync {
    /// Construct a semaphore holding `initial` tokens, with capacity `max`.
    fn new(initial: u32, max: u32) -> Self;

    /// Take one token, blocking until one becomes available or `timeout`
    /// elapses.
    fn acquire(&self, timeout: Timeout) -> WaitOutcome;

    /// Return `count` tokens, waking up to `count` blocked acquirers.
    ///
    /// Fails without changing the count if the result would exceed the
    /// capacity.
    fn release(&self, count: u32) -> Result<(), ReleaseSemaphoreError>;
}
