//! Monotonic clock based on `clock_gettime(CLOCK_MONOTONIC)`
use std::mem::MaybeUninit;

/// Read the raw clock in microseconds.
pub fn raw_now_us() -> u64 {
    let ts = unsafe {
        let mut ts = MaybeUninit::<libc::timespec>::uninit();
        ok_or_errno(libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr()))
            .unwrap_or_else(|e| panic!("clock_gettime failed: {}", e));
        ts.assume_init()
    };

    ts.tv_sec as u64 * 1_000_000 + ts.tv_nsec as u64 / 1_000
}

fn ok_or_errno(x: libc::c_int) -> Result<libc::c_int, errno::Errno> {
    if x >= 0 {
        Ok(x)
    } else {
        Err(errno::errno())
    }
}
