//! Timeouts, deadlines, and the port clock.
//!
//! All blocking operations take a [`Timeout`]. The deadline is computed once on
//! entry from [`Port::now_us`], and every retry of the wait recomputes the
//! remaining span from that deadline, so spurious wakeups never extend the
//! total time a caller can be blocked.
use core::{fmt, time::Duration};

use crate::port::Port;

/// The CMSIS-RTOS2 `osWaitForever` sentinel for millisecond timeouts.
pub const OS_WAIT_FOREVER: u32 = 0xffff_ffff;

/// A relative timeout with microsecond precision, or [`Timeout::FOREVER`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Timeout {
    /// `u64::MAX` represents an infinite timeout.
    micros: u64,
}

impl Timeout {
    /// Don't wait at all. A blocking operation with this timeout only polls.
    pub const ZERO: Self = Self { micros: 0 };

    /// Wait without a bound.
    pub const FOREVER: Self = Self { micros: u64::MAX };

    /// Construct a `Timeout` from the specified number of microseconds.
    ///
    /// `u64::MAX` is indistinguishable from [`Self::FOREVER`].
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Construct a `Timeout` from a CMSIS-style millisecond count, mapping
    /// [`OS_WAIT_FOREVER`] to [`Self::FOREVER`].
    #[inline]
    pub const fn from_millis(millis: u32) -> Self {
        if millis == OS_WAIT_FOREVER {
            Self::FOREVER
        } else {
            Self {
                micros: millis as u64 * 1_000,
            }
        }
    }

    /// Construct a `Timeout` from a [`Duration`], saturating to
    /// [`Self::FOREVER`] if it doesn't fit.
    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            micros: u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
        }
    }

    /// Return `true` if this timeout never expires.
    #[inline]
    pub const fn is_forever(self) -> bool {
        self.micros == u64::MAX
    }

    /// Get the span in microseconds, or `None` for [`Self::FOREVER`].
    #[inline]
    pub const fn as_micros(self) -> Option<u64> {
        if self.is_forever() {
            None
        } else {
            Some(self.micros)
        }
    }

    /// Get the span as a [`Duration`], or `None` for [`Self::FOREVER`].
    #[inline]
    pub const fn as_duration(self) -> Option<Duration> {
        match self.as_micros() {
            Some(micros) => Some(Duration::from_micros(micros)),
            None => None,
        }
    }

    /// Convert this timeout to an absolute deadline relative to `now_us`.
    #[inline]
    pub const fn deadline_from(self, now_us: u64) -> Deadline {
        if self.is_forever() {
            Deadline::NEVER
        } else {
            match now_us.checked_add(self.micros) {
                Some(at) => Deadline { at },
                // Beyond the representable range; the clock won't get there
                None => Deadline::NEVER,
            }
        }
    }
}

impl From<Duration> for Timeout {
    #[inline]
    fn from(x: Duration) -> Self {
        Self::from_duration(x)
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_micros() {
            Some(micros) => write!(f, "{micros}μs"),
            None => f.write_str("FOREVER"),
        }
    }
}

/// An absolute point on the port clock by which a wait must complete.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline {
    /// `u64::MAX` represents "never".
    at: u64,
}

impl Deadline {
    /// A deadline that is never reached.
    pub const NEVER: Self = Self { at: u64::MAX };

    /// Compute the deadline for `timeout` starting now.
    #[inline]
    pub fn after<P: Port>(timeout: Timeout) -> Self {
        if timeout.is_forever() {
            // Don't bother reading the clock
            Self::NEVER
        } else {
            timeout.deadline_from(P::now_us())
        }
    }

    /// Return `true` if this deadline is never reached.
    #[inline]
    pub const fn is_never(self) -> bool {
        self.at == u64::MAX
    }

    /// Get the time left until the deadline as of `now_us`.
    ///
    /// Returns `None` if the deadline has been reached (the remaining span is
    /// zero or negative).
    #[inline]
    pub const fn remaining_at(self, now_us: u64) -> Option<Timeout> {
        if self.is_never() {
            Some(Timeout::FOREVER)
        } else if self.at <= now_us {
            None
        } else {
            Some(Timeout::from_micros(self.at - now_us))
        }
    }

    /// Get the time left until the deadline, reading the port clock.
    #[inline]
    pub fn remaining<P: Port>(self) -> Option<Timeout> {
        if self.is_never() {
            Some(Timeout::FOREVER)
        } else {
            self.remaining_at(P::now_us())
        }
    }
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_never() {
            f.write_str("Deadline(NEVER)")
        } else {
            write!(f, "Deadline({}μs)", self.at)
        }
    }
}

/// Get the current value of the port's monotonic microsecond clock.
#[inline]
pub fn now_us<P: Port>() -> u64 {
    P::now_us()
}

/// Get the number of milliseconds elapsed on the port clock
/// (`Kernel::get_ms_count`).
#[inline]
pub fn ms_count<P: Port>() -> u64 {
    P::now_us() / 1_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn millis_sentinel() {
        assert_eq!(Timeout::from_millis(OS_WAIT_FOREVER), Timeout::FOREVER);
        assert_eq!(Timeout::from_millis(50).as_micros(), Some(50_000));
        assert_eq!(Timeout::from_millis(0), Timeout::ZERO);
    }

    #[test]
    fn duration_saturates() {
        assert!(Timeout::from_duration(Duration::MAX).is_forever());
        assert_eq!(
            Timeout::from(Duration::from_millis(3)).as_duration(),
            Some(Duration::from_millis(3))
        );
        assert_eq!(Timeout::FOREVER.as_duration(), None);
    }

    #[test]
    fn deadline_saturates_to_never() {
        assert!(Timeout::FOREVER.deadline_from(123).is_never());
        assert!(Timeout::from_micros(u64::MAX - 1)
            .deadline_from(5)
            .is_never());
        assert_eq!(
            Deadline::NEVER.remaining_at(u64::MAX - 1),
            Some(Timeout::FOREVER)
        );
    }

    #[test]
    fn deadline_remaining() {
        let deadline = Timeout::from_micros(100).deadline_from(1_000);
        assert_eq!(deadline.remaining_at(1_000), Some(Timeout::from_micros(100)));
        assert_eq!(deadline.remaining_at(1_099), Some(Timeout::from_micros(1)));
        assert_eq!(deadline.remaining_at(1_100), None);
        assert_eq!(deadline.remaining_at(5_000), None);
    }

    #[test]
    fn zero_timeout_is_already_elapsed() {
        assert_eq!(Timeout::ZERO.deadline_from(42).remaining_at(42), None);
    }

    /// The remaining span never exceeds the requested timeout and shrinks as
    /// the clock advances.
    #[quickcheck]
    fn qc_remaining_is_monotonic(start: u32, span: u32, a: u32, b: u32) -> bool {
        let (start, span) = (start as u64, span as u64);
        let deadline = Timeout::from_micros(span).deadline_from(start);
        let (t1, t2) = if a <= b { (a, b) } else { (b, a) };
        let r1 = deadline.remaining_at(start + t1 as u64);
        let r2 = deadline.remaining_at(start + t2 as u64);
        let to_micros = |r: Option<Timeout>| r.and_then(Timeout::as_micros).unwrap_or(0);
        to_micros(r1) <= span && to_micros(r2) <= to_micros(r1)
    }
}
