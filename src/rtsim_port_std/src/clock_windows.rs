//! Monotonic clock based on `QueryPerformanceCounter`
use once_cell::sync::Lazy;
use std::mem::MaybeUninit;
use winapi::um::{profileapi, winnt::LARGE_INTEGER};

/// The counter frequency, which is fixed at system boot.
static FREQUENCY: Lazy<u64> = Lazy::new(|| {
    let freq = query(|x| unsafe { profileapi::QueryPerformanceFrequency(x) });
    assert_ne!(freq, 0, "QueryPerformanceFrequency returned zero");
    freq
});

fn query(f: impl FnOnce(*mut LARGE_INTEGER) -> i32) -> u64 {
    let mut x = MaybeUninit::<LARGE_INTEGER>::zeroed();
    // Never fails on Windows XP or later
    let ok = f(x.as_mut_ptr());
    assert_ne!(ok, 0, "performance counter query failed");
    unsafe { *x.assume_init().QuadPart() as u64 }
}

/// Read the raw clock in microseconds.
pub fn raw_now_us() -> u64 {
    let count = query(|x| unsafe { profileapi::QueryPerformanceCounter(x) });
    (count as u128 * 1_000_000 / *FREQUENCY as u128) as u64
}
