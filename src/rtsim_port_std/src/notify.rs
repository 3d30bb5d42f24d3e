//! Manual-reset notification object
use parking_lot_core as plc;
use rtsim::{RawNotify, Timeout, WaitOutcome};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

/// A manual-reset event built on the global parking lot.
///
/// Waiters are parked with the object's address as the key. The park is
/// validated against `signaled` while the parking lot's queue is locked, so a
/// [`set`](RawNotify::set) can't slip between the check and the park.
#[derive(Debug)]
pub struct StdNotify {
    signaled: AtomicBool,
}

impl StdNotify {
    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }
}

/// Convert a relative timeout to a parking lot deadline. `None` means no
/// deadline.
pub(crate) fn park_deadline(timeout: Timeout) -> Option<Instant> {
    timeout
        .as_duration()
        .and_then(|d| Instant::now().checked_add(d))
}

impl RawNotify for StdNotify {
    fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
        }
    }

    fn set(&self) {
        if !self.signaled.swap(true, Ordering::Release) {
            // Safety: The key is unique to this object, and nothing else parks
            // on it
            unsafe { plc::unpark_all(self.key(), plc::DEFAULT_UNPARK_TOKEN) };
        }
    }

    fn reset(&self) {
        self.signaled.store(false, Ordering::Relaxed);
    }

    fn wait(&self, timeout: Timeout) -> WaitOutcome {
        let deadline = park_deadline(timeout);
        // Safety: The callbacks don't panic and don't call into the parking
        // lot
        let result = unsafe {
            plc::park(
                self.key(),
                || !self.signaled.load(Ordering::Acquire),
                || {},
                |_, _| {},
                plc::DEFAULT_PARK_TOKEN,
                deadline,
            )
        };

        match result {
            plc::ParkResult::Unparked(_) | plc::ParkResult::Invalid => WaitOutcome::Signaled,
            plc::ParkResult::TimedOut => {
                // `set` might have raced with the timeout
                if self.signaled.load(Ordering::Acquire) {
                    WaitOutcome::Signaled
                } else {
                    WaitOutcome::TimedOut
                }
            }
        }
    }
}
