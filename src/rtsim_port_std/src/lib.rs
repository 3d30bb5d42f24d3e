//! Hosted port for `rtsim`.
//!
//! This crate binds the `rtsim` primitives to a desktop operating system and
//! provides a [`Thread`] object and a [`boot`] entry point, so that firmware
//! written against an embedded RTOS can run unmodified as a normal process.
//!
//! ```rust,no_run
//! use rtsim_port_std::{boot, FastMutex, Thread, Timeout};
//!
//! static LOCK: once_cell::sync::Lazy<FastMutex> = once_cell::sync::Lazy::new(FastMutex::new);
//!
//! boot(|this| {
//!     let worker = Thread::builder().name("worker").finish();
//!     worker
//!         .start(|this| {
//!             this.signal_wait(0, Timeout::FOREVER).unwrap();
//!             LOCK.lock().unwrap();
//!             LOCK.unlock().unwrap();
//!         })
//!         .unwrap();
//!     worker.signal_set(1);
//!     worker.join().unwrap();
//!     log::info!("{} done", this.thread().name());
//! })
//! .unwrap();
//! ```
#![deny(unsafe_op_in_unsafe_fn)]
use once_cell::sync::Lazy;
use rtsim::{error::StartThreadError, Port, ThreadKey};
use std::{
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
};

#[cfg(unix)]
#[path = "clock_unix.rs"]
mod clock;
#[cfg(windows)]
#[path = "clock_windows.rs"]
mod clock;
#[cfg(not(any(unix, windows)))]
#[path = "clock_unsupported.rs"]
mod clock;

mod notify;
mod semaphore;
mod thread;

pub use self::{
    notify::StdNotify,
    semaphore::StdSemaphore,
    thread::{Builder, Priority, ThisThread, Thread, ThreadState},
};
pub use rtsim::{
    cmsis, error, time::OS_WAIT_FOREVER, EventBits, ResultCode, Timeout, WaitFailure, WaitFlags,
};

/// The [`Port`] implementation for hosted environments.
pub enum StdPort {}

/// [`rtsim::FastMutex`] on [`StdPort`]
pub type FastMutex = rtsim::FastMutex<StdPort>;
/// [`rtsim::FlagSet`] on [`StdPort`]
pub type FlagSet = rtsim::FlagSet<StdPort>;
/// [`rtsim::Semaphore`] on [`StdPort`]
pub type Semaphore = rtsim::Semaphore<StdPort>;
/// [`rtsim::ThreadSignal`] on [`StdPort`]
pub type ThreadSignal = rtsim::ThreadSignal<StdPort>;

/// The origin of [`StdPort::now_us`], fixed on first use.
static CLOCK_ORIGIN: Lazy<u64> = Lazy::new(clock::raw_now_us);

thread_local! {
    static THREAD_KEY: ThreadKey = {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let key = NEXT.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(key).expect("thread key counter wrapped around")
    };
}

impl Port for StdPort {
    type Notify = StdNotify;
    type Semaphore = StdSemaphore;

    fn now_us() -> u64 {
        let origin = *CLOCK_ORIGIN;
        clock::raw_now_us().saturating_sub(origin)
    }

    fn current_thread_key() -> ThreadKey {
        THREAD_KEY.with(|k| *k)
    }
}

/// Get the number of microseconds elapsed since the port clock was first
/// read.
#[inline]
pub fn now_us() -> u64 {
    StdPort::now_us()
}

/// `Kernel::get_ms_count`
#[inline]
pub fn ms_count() -> u64 {
    rtsim::time::ms_count::<StdPort>()
}

/// `osKernelGetTickCount`: [`now_us`] truncated to 32 bits.
#[inline]
pub fn tick_count() -> u32 {
    cmsis::os_kernel_get_tick_count::<StdPort>()
}

/// Let other threads run.
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}

/// Initialize the logger, start the firmware's main thread, and wait for it
/// to exit.
///
/// The main thread is named `mainThread` and has [`Priority::Normal`]. The
/// log level is controlled by `RUST_LOG`.
///
/// If `main` panics, the panic is propagated to the caller.
pub fn boot(main: impl FnOnce(&ThisThread) + Send + 'static) -> Result<(), StartThreadError> {
    // Don't fail if the application has its own logger
    let _ = env_logger::try_init();

    // Fix the clock origin
    let _ = now_us();

    let main_thread = Thread::builder()
        .name("mainThread")
        .priority(Priority::Normal)
        .finish();

    log::debug!("booting {:?}", main_thread);
    main_thread.start(main)?;

    if let Err(payload) = main_thread.join() {
        std::panic::resume_unwind(payload);
    }

    log::debug!("{:?} exited", main_thread);
    Ok(())
}
