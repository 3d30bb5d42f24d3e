//! Result codes and per-operation error types.
use core::fmt;

/// The macro to define [`ResultCode`].
macro_rules! define_result_code {
    (
        $( #[$meta:meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl ResultCode {
            /// Get the short name of the result code.
            ///
            /// # Examples
            ///
            /// ```
            /// use rtsim::error::ResultCode;
            /// assert_eq!(ResultCode::NoSuchThread.as_str(), "NoSuchThread");
            /// ```
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }

            fn fmt(self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }

        impl fmt::Display for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }
    };
}

define_result_code! {
    /// All result codes (including success) that the flat API can return.
    ///
    /// The discriminants are matched to the CMSIS-RTOS2 `osStatus_t` values,
    /// so [`ResultCode::as_raw`] can be handed to firmware code unchanged.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(i8)]
    pub enum ResultCode {
        /// The operation was successful.
        Success = 0,
        /// The underlying platform wait or signal primitive failed. The
        /// primitive can no longer guarantee its contract; callers are
        /// expected to escalate this to a panic or an abort.
        PlatformWait = -1,
        /// The operation timed out.
        Timeout = -2,
        /// A semaphore was released beyond its maximum count.
        QueueOverflow = -3,
        /// A thread-local signal operation was invoked by a thread that
        /// doesn't own the signal state.
        NoSuchThread = -4,
        /// The platform ran out of resources (e.g., failed to spawn a
        /// thread).
        NoMemory = -5,
        /// A target object is in a state that disallows the operation.
        BadObjectState = -41,
    }
}

impl ResultCode {
    /// Get a flag indicating whether the code represents a failure.
    ///
    /// Failure codes have negative values.
    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    /// Get a flag indicating whether the code represents a success.
    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }

    /// Get the `osStatus_t` value.
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i8 as i32
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident $(: $($subty:ident),* $(,)*)? {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                // Use the same discriminants as `ResultCode` for cost-free
                // conversion
                $vname = ResultCode::$vname as i8
            ),*
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Success,
                    Err(e) => Self::from(e),
                }
            }
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                match x {
                    $( $name::$vname => Self::$vname, )*
                }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from($name::$vname),
                    );
                    assert_eq!(
                        ResultCode::$vname as i8,
                        $name::$vname as i8,
                    );
                )*
            }

            #[test]
            fn result_to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    ResultCode::Success,
                    ResultCode::from(Result::<(), $name>::Ok(())),
                );
            }
        }

        $($(
            $subty!(impl From<_> for $name);
        )*)?

        #[allow(unused_macros)]
        macro_rules! $name {
            (impl From<_> for $dest_ty:ty) => {
                impl From<$name> for $dest_ty {
                    #[inline]
                    fn from(x: $name) -> Self {
                        match x {
                            $(
                                $name::$vname => Self::$vname,
                            )*
                        }
                    }
                }
            };
        }
    };
}

define_error! {
    mod release_semaphore_error {}
    /// Error type for [`RawSemaphore::release`].
    ///
    /// [`RawSemaphore::release`]: crate::port::RawSemaphore::release
    pub enum ReleaseSemaphoreError {
        /// The release would push the count past the semaphore's maximum.
        QueueOverflow,
    }
}

define_error! {
    mod lock_mutex_error {}
    /// Error type for [`FastMutex::acquire`].
    ///
    /// [`FastMutex::acquire`]: crate::mutex::FastMutex::acquire
    pub enum LockMutexError {
        Timeout,
        PlatformWait,
    }
}

define_error! {
    mod unlock_mutex_error {}
    /// Error type for [`FastMutex::release`].
    ///
    /// [`FastMutex::release`]: crate::mutex::FastMutex::release
    pub enum UnlockMutexError {
        /// The ownership handoff to a waiter failed.
        PlatformWait,
    }
}

define_error! {
    mod wait_flags_error {}
    /// Error type for [`FlagSet::wait`].
    ///
    /// [`FlagSet::wait`]: crate::event_flags::FlagSet::wait
    pub enum WaitFlagsError {
        Timeout,
        PlatformWait,
    }
}

define_error! {
    mod clear_signal_error {}
    /// Error type for [`ThreadSignal::clear`].
    ///
    /// [`ThreadSignal::clear`]: crate::signal::ThreadSignal::clear
    pub enum ClearSignalError {
        /// The calling thread is not the owner of the signal state.
        NoSuchThread,
    }
}

define_error! {
    mod wait_signal_error {}
    /// Error type for [`ThreadSignal::wait`].
    ///
    /// [`ThreadSignal::wait`]: crate::signal::ThreadSignal::wait
    pub enum WaitSignalError: WaitFlagsError, ClearSignalError {
        Timeout,
        PlatformWait,
        /// The calling thread is not the owner of the signal state.
        NoSuchThread,
    }
}

define_error! {
    mod wait_semaphore_error {}
    /// Error type for [`Semaphore::wait`].
    ///
    /// [`Semaphore::wait`]: crate::semaphore::Semaphore::wait
    pub enum WaitSemaphoreError: LockMutexError {
        Timeout,
        PlatformWait,
    }
}

define_error! {
    mod signal_semaphore_error {}
    /// Error type for [`Semaphore::release`].
    ///
    /// [`Semaphore::release`]: crate::semaphore::Semaphore::release
    pub enum SignalSemaphoreError: ReleaseSemaphoreError, UnlockMutexError {
        QueueOverflow,
        PlatformWait,
    }
}

define_error! {
    mod start_thread_error {}
    /// Error type for starting a thread object.
    pub enum StartThreadError {
        /// The host failed to create a thread.
        NoMemory,
        /// The thread has already been started.
        BadObjectState,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_cmsis_status() {
        assert_eq!(ResultCode::Success.as_raw(), 0);
        assert_eq!(ResultCode::PlatformWait.as_raw(), -1);
        assert_eq!(ResultCode::Timeout.as_raw(), -2);
        assert_eq!(ResultCode::QueueOverflow.as_raw(), -3);
        assert_eq!(ResultCode::NoSuchThread.as_raw(), -4);
        assert_eq!(ResultCode::NoMemory.as_raw(), -5);
        assert!(ResultCode::Timeout.is_err());
        assert!(ResultCode::Success.is_ok());
    }

    #[test]
    fn suberror_conversion() {
        assert_eq!(
            WaitSignalError::from(WaitFlagsError::Timeout),
            WaitSignalError::Timeout
        );
        assert_eq!(
            WaitSignalError::from(ClearSignalError::NoSuchThread),
            WaitSignalError::NoSuchThread
        );
        assert_eq!(
            SignalSemaphoreError::from(ReleaseSemaphoreError::QueueOverflow),
            SignalSemaphoreError::QueueOverflow
        );
    }

    #[test]
    fn debug_prints_code_name() {
        assert_eq!(format!("{:?}", LockMutexError::Timeout), "Timeout");
        assert_eq!(format!("{}", ClearSignalError::NoSuchThread), "NoSuchThread");
    }
}
