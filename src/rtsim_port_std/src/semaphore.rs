//! Counting semaphore
use parking_lot_core as plc;
use rtsim::{error::ReleaseSemaphoreError, RawSemaphore, Timeout, WaitOutcome};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::notify::park_deadline;

/// A bounded counting semaphore built on the global parking lot.
#[derive(Debug)]
pub struct StdSemaphore {
    count: AtomicU32,
    max: u32,
}

impl StdSemaphore {
    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn try_take(&self) -> bool {
        self.count
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |c| c.checked_sub(1))
            .is_ok()
    }

    /// Get the number of available tokens.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl RawSemaphore for StdSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        Self {
            count: AtomicU32::new(initial.min(max)),
            max,
        }
    }

    fn acquire(&self, timeout: Timeout) -> WaitOutcome {
        let deadline = park_deadline(timeout);
        loop {
            if self.try_take() {
                return WaitOutcome::Signaled;
            }

            // Safety: The callbacks don't panic and don't call into the
            // parking lot
            let result = unsafe {
                plc::park(
                    self.key(),
                    || self.count.load(Ordering::Relaxed) == 0,
                    || {},
                    |_, _| {},
                    plc::DEFAULT_PARK_TOKEN,
                    deadline,
                )
            };

            if result == plc::ParkResult::TimedOut {
                // Last chance
                return if self.try_take() {
                    WaitOutcome::Signaled
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }

    fn release(&self, count: u32) -> Result<(), ReleaseSemaphoreError> {
        let max = self.max;
        self.count
            .fetch_update(Ordering::Release, Ordering::Relaxed, |c| {
                c.checked_add(count).filter(|&new| new <= max)
            })
            .map_err(|_| ReleaseSemaphoreError::QueueOverflow)?;

        // Safety: The key is unique to this object, and nothing else parks on
        // it
        unsafe {
            if count == 1 {
                plc::unpark_one(self.key(), |_| plc::DEFAULT_UNPARK_TOKEN);
            } else if count > 1 {
                plc::unpark_all(self.key(), plc::DEFAULT_UNPARK_TOKEN);
            }
        }

        Ok(())
    }
}
