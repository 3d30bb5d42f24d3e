//! Per-thread signals
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    error::{ClearSignalError, WaitSignalError},
    event_flags::{EventBits, FlagSet, WaitFailure, WaitFlags},
    port::{Port, ThreadKey},
    time::Timeout,
};

/// The value of `ThreadSignal::owner` before [`ThreadSignal::bind_current`].
const UNBOUND: u64 = 0;

/// A [`FlagSet`] owned by a single thread.
///
/// Any thread can [`set`] bits, but only the owning thread can [`wait`] for
/// them or [`clear`] them. Waiting always consumes the bits it was waiting
/// for.
///
/// [`set`]: Self::set
/// [`wait`]: Self::wait
/// [`clear`]: Self::clear
pub struct ThreadSignal<P: Port> {
    flags: FlagSet<P>,
    owner: AtomicU64,
}

impl<P: Port> ThreadSignal<P> {
    /// Construct a `ThreadSignal` that isn't bound to any thread yet.
    pub fn new() -> Self {
        Self {
            flags: FlagSet::new(),
            owner: AtomicU64::new(UNBOUND),
        }
    }

    /// Make the calling thread the owner.
    ///
    /// This is meant to be called once by the thread's entry point, before
    /// running the thread body.
    pub fn bind_current(&self) {
        let key = P::current_thread_key();
        let prev = self.owner.swap(key.get(), Ordering::AcqRel);
        log::debug!(
            "ThreadSignal({:p}) bound to thread {} (was {})",
            self,
            key,
            prev
        );
    }

    /// Get the key of the owning thread.
    pub fn owner(&self) -> Option<ThreadKey> {
        ThreadKey::new(self.owner.load(Ordering::Acquire))
    }

    fn expect_owner(&self) -> Result<(), ClearSignalError> {
        if self.owner.load(Ordering::Acquire) == P::current_thread_key().get() {
            Ok(())
        } else {
            Err(ClearSignalError::NoSuchThread)
        }
    }

    /// Set the specified bits, returning the previous value. Can be called
    /// from any thread.
    #[inline]
    pub fn set(&self, mask: EventBits) -> EventBits {
        self.flags.set(mask)
    }

    /// Clear the specified bits, returning the previous value.
    pub fn clear(&self, mask: EventBits) -> Result<EventBits, ClearSignalError> {
        self.expect_owner()?;
        Ok(self.flags.clear(mask))
    }

    /// Get the current bits.
    #[inline]
    pub fn get(&self) -> EventBits {
        self.flags.get()
    }

    /// Wait for signals and consume them.
    ///
    /// If `mask` is zero, this waits until any bit is set and clears every
    /// bit. Otherwise, this waits until all of the bits in `mask` are set and
    /// clears them. Returns the bits observed before clearing.
    pub fn wait(
        &self,
        mask: EventBits,
        timeout: Timeout,
    ) -> Result<EventBits, WaitFailure<WaitSignalError>> {
        if let Err(e) = self.expect_owner() {
            return Err(WaitFailure {
                error: e.into(),
                bits: self.flags.get(),
            });
        }

        let (mask, flags) = if mask == 0 {
            (EventBits::MAX, WaitFlags::CLEAR)
        } else {
            (mask, WaitFlags::ALL | WaitFlags::CLEAR)
        };

        self.flags.wait(mask, flags, timeout).map_err(WaitFailure::cast)
    }
}

impl<P: Port> Default for ThreadSignal<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> fmt::Debug for ThreadSignal<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ThreadSignal")
            .field("flags", &self.flags)
            .field("owner", &self.owner())
            .finish()
    }
}
