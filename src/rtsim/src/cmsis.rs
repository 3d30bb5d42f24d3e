//! CMSIS-RTOS2-style flat API over raw words.
//!
//! These functions take and return the untyped words that firmware written
//! against `cmsis_os.h` expects: option bits instead of [`WaitFlags`],
//! millisecond timeouts with [`OS_WAIT_FOREVER`], flag words with
//! [`OS_FLAGS_ERROR`] set on failure, and [`OsStatus`] codes.
use crate::{
    error::ResultCode,
    event_flags::{EventBits, FlagSet, WaitFailure, WaitFlags},
    mutex::FastMutex,
    port::Port,
    semaphore::Semaphore,
    signal::ThreadSignal,
    time::{self, Timeout},
};

pub use crate::{event_flags::FLAGS_ERROR as OS_FLAGS_ERROR, time::OS_WAIT_FOREVER};

/// `osFlagsWaitAny`
pub const OS_FLAGS_WAIT_ANY: u32 = 0;
/// `osFlagsWaitAll`
pub const OS_FLAGS_WAIT_ALL: u32 = 1;
/// `osFlagsNoClear`
pub const OS_FLAGS_NO_CLEAR: u32 = 2;

/// `osStatus_t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OsStatus {
    Ok = 0,
    Error = -1,
    ErrorTimeout = -2,
    ErrorResource = -3,
    ErrorParameter = -4,
    ErrorNoMemory = -5,
    /// Never produced on a hosted port. Present to complete the `osStatus_t`
    /// value set.
    ErrorIsr = -6,
}

impl OsStatus {
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl From<ResultCode> for OsStatus {
    fn from(x: ResultCode) -> Self {
        match x {
            ResultCode::Success => Self::Ok,
            ResultCode::PlatformWait => Self::Error,
            ResultCode::Timeout => Self::ErrorTimeout,
            ResultCode::QueueOverflow | ResultCode::BadObjectState => Self::ErrorResource,
            ResultCode::NoSuchThread => Self::ErrorParameter,
            ResultCode::NoMemory => Self::ErrorNoMemory,
        }
    }
}

impl<E: Into<ResultCode>> From<Result<(), E>> for OsStatus {
    #[inline]
    fn from(x: Result<(), E>) -> Self {
        match x {
            Ok(()) => Self::Ok,
            Err(e) => Self::from(Into::<ResultCode>::into(e)),
        }
    }
}

/// Convert an `osEventFlagsWait` option word to [`WaitFlags`].
///
/// Unknown option bits are ignored.
pub fn wait_flags_from_options(options: u32) -> WaitFlags {
    let mut flags = WaitFlags::empty();
    flags.set(WaitFlags::ALL, options & OS_FLAGS_WAIT_ALL != 0);
    flags.set(WaitFlags::CLEAR, options & OS_FLAGS_NO_CLEAR == 0);
    flags
}

fn raw_wait_result<E>(x: Result<EventBits, WaitFailure<E>>) -> u32 {
    match x {
        Ok(bits) => bits,
        Err(e) => e.into_raw(),
    }
}

/// `osEventFlagsSet`. Returns the flag word before the update.
pub fn os_event_flags_set<P: Port>(ef: &FlagSet<P>, flags: u32) -> u32 {
    ef.set(flags)
}

/// `osEventFlagsClear`. Returns the flag word before the update.
pub fn os_event_flags_clear<P: Port>(ef: &FlagSet<P>, flags: u32) -> u32 {
    ef.clear(flags)
}

/// `osEventFlagsGet`
pub fn os_event_flags_get<P: Port>(ef: &FlagSet<P>) -> u32 {
    ef.get()
}

/// `osEventFlagsWait`. Returns the observed flag word, with
/// [`OS_FLAGS_ERROR`] set on failure.
pub fn os_event_flags_wait<P: Port>(
    ef: &FlagSet<P>,
    flags: u32,
    options: u32,
    timeout_ms: u32,
) -> u32 {
    raw_wait_result(ef.wait(
        flags,
        wait_flags_from_options(options),
        Timeout::from_millis(timeout_ms),
    ))
}

/// `osThreadFlagsWait` with the semantics of `Thread::signal_wait`: `flags ==
/// 0` waits for anything and consumes everything.
pub fn os_thread_flags_wait<P: Port>(
    signal: &ThreadSignal<P>,
    flags: u32,
    timeout_ms: u32,
) -> u32 {
    raw_wait_result(signal.wait(flags, Timeout::from_millis(timeout_ms)))
}

/// `osMutexAcquire`
pub fn os_mutex_acquire<P: Port>(mutex: &FastMutex<P>, timeout_ms: u32) -> OsStatus {
    mutex.acquire(Timeout::from_millis(timeout_ms)).into()
}

/// `osMutexRelease`
pub fn os_mutex_release<P: Port>(mutex: &FastMutex<P>) -> OsStatus {
    mutex.release().into()
}

/// `osSemaphoreAcquire`. A zero timeout polls without blocking.
pub fn os_semaphore_acquire<P: Port>(sem: &Semaphore<P>, timeout_ms: u32) -> OsStatus {
    let result = if timeout_ms == 0 {
        sem.poll()
    } else {
        sem.wait(Timeout::from_millis(timeout_ms))
    };
    match result {
        Ok(_) => OsStatus::Ok,
        // A poll failure means "no token", not "timed out waiting"
        Err(_) if timeout_ms == 0 => OsStatus::ErrorResource,
        Err(e) => ResultCode::from(e).into(),
    }
}

/// `osSemaphoreRelease`
pub fn os_semaphore_release<P: Port>(sem: &Semaphore<P>) -> OsStatus {
    sem.release().into()
}

/// `osKernelGetTickCount`: the port clock in microseconds, truncated to 32
/// bits.
pub fn os_kernel_get_tick_count<P: Port>() -> u32 {
    time::now_us::<P>() as u32
}

/// `Kernel::get_ms_count`
pub fn kernel_get_ms_count<P: Port>() -> u64 {
    time::ms_count::<P>()
}
