//! Monotonic clock based on `std::time::Instant`
use once_cell::sync::Lazy;
use std::time::Instant;

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Read the raw clock in microseconds.
pub fn raw_now_us() -> u64 {
    ORIGIN.elapsed().as_micros() as u64
}
