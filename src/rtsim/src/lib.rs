//! RTOS synchronization semantics on a hosted, preemptively scheduled
//! platform.
//!
//! Firmware written against an embedded RTOS expects its mutexes, event flags,
//! and thread signals to honor specific contracts regarding ordering,
//! timeouts, and flag clearing. This crate implements these primitives on top
//! of a small platform surface ([`port::Port`]): a monotonic clock, thread
//! identity, a manual-reset notification object, and a counting semaphore.
//!
//! | Primitive                           | Fast path          | Blocks on          |
//! | ----------------------------------- | ------------------ | ------------------ |
//! | [`FastMutex`](mutex::FastMutex)     | one atomic RMW     | `Port::Semaphore`  |
//! | [`Semaphore`](semaphore::Semaphore) | one atomic RMW     | `Port::Semaphore`  |
//! | [`FlagSet`](event_flags::FlagSet)   | one atomic load    | `Port::Notify`     |
//! | [`ThreadSignal`](signal::ThreadSignal) | one atomic load | `Port::Notify`     |
//!
//! All blocking operations take a [`Timeout`](time::Timeout), which may be
//! [`Timeout::FOREVER`](time::Timeout::FOREVER). [`cmsis`] provides the same
//! operations in the raw-word form of the CMSIS-RTOS2 API.
//!
//! This crate is `#![no_std]`. See `rtsim_port_std` for a port targeting
//! desktop operating systems.
#![cfg_attr(not(test), no_std)]

pub mod cmsis;
pub mod error;
pub mod event_flags;
pub mod mutex;
pub mod port;
pub mod semaphore;
pub mod signal;
pub mod time;

#[cfg(test)]
mod test_port;

pub use self::{
    error::ResultCode,
    event_flags::{EventBits, FlagSet, WaitFailure, WaitFlags},
    mutex::FastMutex,
    port::{Port, RawNotify, RawSemaphore, ThreadKey, WaitOutcome},
    semaphore::Semaphore,
    signal::ThreadSignal,
    time::{Deadline, Timeout},
};
