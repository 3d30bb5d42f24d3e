//! Event flags
use core::{
    fmt,
    sync::atomic::{self, AtomicU32, Ordering},
};

use crate::{
    error::WaitFlagsError,
    port::{Port, RawNotify, WaitOutcome},
    time::{Deadline, Timeout},
};

/// Unsigned integer type backing event flags.
pub type EventBits = u32;

/// The bit set in the raw form of a failed wait (`osFlagsError`).
pub const FLAGS_ERROR: EventBits = 0x8000_0000;

bitflags::bitflags! {
    /// Options for [`FlagSet::wait`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct WaitFlags: u8 {
        /// Wait for all of the specified bits to be set.
        const ALL = 1 << 0;

        /// Clear the specified bits after waiting for them.
        const CLEAR = 1 << 1;
    }
}

impl WaitFlags {
    #[inline]
    fn is_satisfied_by(self, bits: EventBits, mask: EventBits) -> bool {
        if self.contains(Self::ALL) {
            bits & mask == mask
        } else {
            bits & mask != 0
        }
    }
}

/// A failed wait, along with the flag word observed when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitFailure<E> {
    pub error: E,
    pub bits: EventBits,
}

impl<E> WaitFailure<E> {
    /// Get the CMSIS-style raw form of the failure (`bits | osFlagsError`).
    #[inline]
    pub fn into_raw(self) -> EventBits {
        self.bits | FLAGS_ERROR
    }

    /// Convert the error code into a wider error type.
    #[inline]
    pub fn cast<F: From<E>>(self) -> WaitFailure<F> {
        WaitFailure {
            error: self.error.into(),
            bits: self.bits,
        }
    }
}

/// A 32-bit word of independent boolean conditions that threads can wait on.
///
/// Waiters block on a single manual-reset notification object, `notify`, which
/// [`Self::set`] signals on every call. The notification is reset only by a
/// waiter that observes itself leaving `waiters` at zero after a signaled
/// wakeup. If a `set` lands between that departure and the reset, the
/// departing waiter signals `notify` again (detected through `generation`),
/// so a signal is never withdrawn from a thread that registered in between.
pub struct FlagSet<P: Port> {
    bits: AtomicU32,
    notify: P::Notify,
    /// The number of threads between registering as a waiter and departing.
    waiters: AtomicU32,
    /// Incremented by every `set` before signaling `notify`.
    generation: AtomicU32,
}

impl<P: Port> FlagSet<P> {
    /// Construct a `FlagSet` with all bits cleared.
    pub fn new() -> Self {
        Self::with_bits(0)
    }

    /// Construct a `FlagSet` with the specified initial bits.
    pub fn with_bits(bits: EventBits) -> Self {
        Self {
            bits: AtomicU32::new(bits),
            notify: P::Notify::new(),
            waiters: AtomicU32::new(0),
            generation: AtomicU32::new(0),
        }
    }

    /// Set the specified bits and wake up the waiters, returning the previous
    /// flag word.
    ///
    /// The waiters are woken up even if no bit changed.
    pub fn set(&self, mask: EventBits) -> EventBits {
        let prev = self.bits.fetch_or(mask, Ordering::AcqRel);
        self.generation.fetch_add(1, Ordering::SeqCst);
        // Pairs with the fence in `reset_notify`
        atomic::fence(Ordering::SeqCst);
        self.notify.set();
        prev
    }

    /// Clear the specified bits, returning the previous flag word.
    pub fn clear(&self, mask: EventBits) -> EventBits {
        self.bits.fetch_and(!mask, Ordering::AcqRel)
    }

    /// Get the current flag word.
    #[inline]
    pub fn get(&self) -> EventBits {
        self.bits.load(Ordering::Acquire)
    }

    /// Wait until all of the bits in `mask` are set.
    #[inline]
    pub fn wait_all(
        &self,
        mask: EventBits,
        timeout: Timeout,
        auto_clear: bool,
    ) -> Result<EventBits, WaitFailure<WaitFlagsError>> {
        let mut flags = WaitFlags::ALL;
        flags.set(WaitFlags::CLEAR, auto_clear);
        self.wait(mask, flags, timeout)
    }

    /// Wait until any of the bits in `mask` is set.
    #[inline]
    pub fn wait_any(
        &self,
        mask: EventBits,
        timeout: Timeout,
        auto_clear: bool,
    ) -> Result<EventBits, WaitFailure<WaitFlagsError>> {
        let flags = if auto_clear {
            WaitFlags::CLEAR
        } else {
            WaitFlags::empty()
        };
        self.wait(mask, flags, timeout)
    }

    /// Wait until the flag word satisfies the condition specified by `mask`
    /// and `flags`, for at most `timeout`.
    ///
    /// Returns the flag word observed when the condition was satisfied. With
    /// [`WaitFlags::CLEAR`], the bits in `mask` are cleared afterwards, but
    /// only by the last of the threads that were waiting together. That is,
    /// the thread whose departure brought the waiter count to zero, or, if the
    /// calling thread didn't have to wait at all, only if nobody else is
    /// waiting.
    ///
    /// On failure, the flag word observed at that point is returned along
    /// with the error.
    pub fn wait(
        &self,
        mask: EventBits,
        flags: WaitFlags,
        timeout: Timeout,
    ) -> Result<EventBits, WaitFailure<WaitFlagsError>> {
        let deadline = Deadline::after::<P>(timeout);
        let mut bits = self.bits.load(Ordering::Acquire);

        // The value of `waiters` left by our most recent departure
        let mut departure = None;

        while !flags.is_satisfied_by(bits, mask) {
            let Some(remaining) = deadline.remaining::<P>() else {
                log::trace!("FlagSet({:p}) timed out waiting for {:#x}", self, mask);
                return Err(WaitFailure {
                    error: WaitFlagsError::Timeout,
                    bits,
                });
            };

            self.waiters.fetch_add(1, Ordering::AcqRel);

            // `set` might have happened between the check and the
            // registration. It can't have missed us after this point.
            bits = self.bits.load(Ordering::Acquire);
            let outcome = if flags.is_satisfied_by(bits, mask) {
                None
            } else {
                log::trace!(
                    "FlagSet({:p}) blocking on {:#x} ({:?}), bits = {:#x}, remaining = {:?}",
                    self,
                    mask,
                    flags,
                    bits,
                    remaining
                );
                Some(self.notify.wait(remaining))
            };

            // Observe the bits before departing. The last waiter to depart
            // may clear them as soon as we are gone.
            bits = self.bits.load(Ordering::Acquire);
            let generation = self.generation.load(Ordering::SeqCst);
            let left = self.waiters.fetch_sub(1, Ordering::AcqRel) - 1;
            departure = Some(left);

            match outcome {
                Some(WaitOutcome::Signaled) if left == 0 => self.reset_notify(generation),
                Some(WaitOutcome::Failed) => {
                    log::error!("FlagSet({:p}) failed to wait for the notification", self);
                    return Err(WaitFailure {
                        error: WaitFlagsError::PlatformWait,
                        bits,
                    });
                }
                _ => {}
            }
        }

        if flags.contains(WaitFlags::CLEAR) {
            let is_last = match departure {
                Some(left) => left == 0,
                // Never blocked: a lone caller still consumes the bits
                None => self.waiters.load(Ordering::Acquire) == 0,
            };
            if is_last {
                self.bits.fetch_and(!mask, Ordering::AcqRel);
            } else {
                log::trace!(
                    "FlagSet({:p}) leaving {:#x} for the remaining waiters",
                    self,
                    mask
                );
            }
        }

        Ok(bits)
    }

    /// Reset `notify` on behalf of the last departing waiter, which read
    /// `generation` before departing.
    fn reset_notify(&self, generation: u32) {
        self.notify.reset();
        atomic::fence(Ordering::SeqCst);

        // A new waiter may have registered after our departure and missed
        // a `set` that our reset just withdrew
        if self.generation.load(Ordering::SeqCst) != generation {
            log::trace!("FlagSet({:p}) re-signaling after a late reset", self);
            self.notify.set();
        }
    }

    /// Get the number of threads currently waiting.
    #[inline]
    pub fn waiter_count(&self) -> u32 {
        self.waiters.load(Ordering::Relaxed)
    }
}

impl<P: Port> Default for FlagSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> fmt::Debug for FlagSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("self", &(self as *const _))
            .field("bits", &format_args!("{:#x}", self.get()))
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
