//! Firmware threads
use rtsim::{
    error::{ClearSignalError, StartThreadError, WaitSignalError},
    EventBits, Timeout, WaitFailure,
};
use spin::Mutex as SpinMutex;
use std::{fmt, sync::Arc, thread};

use crate::ThreadSignal;

/// Thread priority (`osPriority`).
///
/// The priority is recorded and reported, but the host scheduler doesn't
/// honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i8)]
pub enum Priority {
    Idle = -3,
    Low = -2,
    BelowNormal = -1,
    #[default]
    Normal = 0,
    AboveNormal = 1,
    High = 2,
    Realtime = 3,
}

impl Priority {
    /// Get the `osPriority` value.
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i8 as i32
    }

    /// Construct a `Priority` from an `osPriority` value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            -3 => Self::Idle,
            -2 => Self::Low,
            -1 => Self::BelowNormal,
            0 => Self::Normal,
            1 => Self::AboveNormal,
            2 => Self::High,
            3 => Self::Realtime,
            _ => return None,
        })
    }
}

/// The lifecycle state of a [`Thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// The thread hasn't been started yet.
    Inactive,
    /// The thread is running (or blocked).
    Running,
    /// The thread body has returned (or panicked).
    Deleted,
}

/// A firmware thread.
///
/// `Thread` is a cheaply clonable handle. All clones refer to the same thread.
#[derive(Clone)]
pub struct Thread {
    inner: Arc<ThreadInner>,
}

struct ThreadInner {
    name: String,
    priority: Priority,
    stack_size: Option<usize>,
    signal: ThreadSignal,
    state: SpinMutex<ThreadState>,
    join_handle: SpinMutex<Option<thread::JoinHandle<()>>>,
}

/// The builder type for [`Thread`], created by [`Thread::builder`].
#[must_use = "call `finish` to create a `Thread`"]
#[derive(Debug, Clone)]
pub struct Builder {
    name: Option<String>,
    priority: Priority,
    stack_size: Option<usize>,
}

impl Builder {
    /// Specify the thread's name. Defaults to `"application_unnamed_thread"`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Specify the thread's priority. Defaults to [`Priority::Normal`].
    pub fn priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    /// Specify the thread's stack size in bytes. Defaults to the host's
    /// default.
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Create an inactive [`Thread`].
    pub fn finish(self) -> Thread {
        Thread {
            inner: Arc::new(ThreadInner {
                name: self
                    .name
                    .unwrap_or_else(|| "application_unnamed_thread".to_owned()),
                priority: self.priority,
                stack_size: self.stack_size,
                signal: ThreadSignal::new(),
                state: SpinMutex::new(ThreadState::Inactive),
                join_handle: SpinMutex::new(None),
            }),
        }
    }
}

impl Thread {
    /// Start building a `Thread`.
    pub fn builder() -> Builder {
        Builder {
            name: None,
            priority: Priority::Normal,
            stack_size: None,
        }
    }

    /// Spawn a host thread running `body`.
    ///
    /// `body` receives a [`ThisThread`], through which it can wait for the
    /// signals sent to this thread. A `Thread` can only be started once.
    pub fn start(
        &self,
        body: impl FnOnce(&ThisThread) + Send + 'static,
    ) -> Result<(), StartThreadError> {
        {
            let mut state = self.inner.state.lock();
            if *state != ThreadState::Inactive {
                return Err(StartThreadError::BadObjectState);
            }
            *state = ThreadState::Running;
        }

        let mut builder = thread::Builder::new().name(self.inner.name.clone());
        if let Some(stack_size) = self.inner.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let this = ThisThread {
            thread: self.clone(),
        };

        let spawn_result = builder.spawn(move || {
            // Mark the thread as `Deleted` even if `body` panics
            struct Guard<'a>(&'a Thread);
            impl Drop for Guard<'_> {
                fn drop(&mut self) {
                    *self.0.inner.state.lock() = ThreadState::Deleted;
                    log::debug!("{:?} exited", self.0);
                }
            }

            let _guard = Guard(&this.thread);
            this.thread.inner.signal.bind_current();
            log::debug!("{:?} is now running", this.thread);
            body(&this);
        });

        match spawn_result {
            Ok(join_handle) => {
                *self.inner.join_handle.lock() = Some(join_handle);
                Ok(())
            }
            Err(e) => {
                log::error!("failed to spawn a host thread for {:?}: {}", self, e);
                *self.inner.state.lock() = ThreadState::Inactive;
                Err(StartThreadError::NoMemory)
            }
        }
    }

    /// Wait for the thread to exit.
    ///
    /// Returns immediately if the thread hasn't been started or has already
    /// been joined. Returns `Err` with the panic payload if the thread body
    /// panicked. Must not be called from the thread itself.
    pub fn join(&self) -> thread::Result<()> {
        let join_handle = self.inner.join_handle.lock().take();
        match join_handle {
            Some(join_handle) => join_handle.join(),
            None => Ok(()),
        }
    }

    /// Get the thread's current lifecycle state.
    pub fn state(&self) -> ThreadState {
        *self.inner.state.lock()
    }

    /// Set signal bits on this thread, returning the previous value.
    #[inline]
    pub fn signal_set(&self, mask: EventBits) -> EventBits {
        self.inner.signal.set(mask)
    }

    /// Get the thread's signal state.
    #[inline]
    pub fn signal(&self) -> &ThreadSignal {
        &self.inner.signal
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    #[inline]
    pub fn stack_size(&self) -> Option<usize> {
        self.inner.stack_size
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.inner.name)
            .field("priority", &self.inner.priority)
            .field("state", &self.state())
            .finish()
    }
}

/// The calling thread's view of its own [`Thread`], passed to the thread
/// body.
///
/// The signal operations that only the owning thread may perform are
/// available through this type.
#[derive(Debug)]
pub struct ThisThread {
    thread: Thread,
}

impl ThisThread {
    /// Get the [`Thread`] being run.
    #[inline]
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Wait for signals sent to this thread (`Thread::signal_wait`).
    ///
    /// See [`rtsim::ThreadSignal::wait`].
    #[inline]
    pub fn signal_wait(
        &self,
        mask: EventBits,
        timeout: Timeout,
    ) -> Result<EventBits, WaitFailure<WaitSignalError>> {
        self.thread.inner.signal.wait(mask, timeout)
    }

    /// Clear signals sent to this thread, returning the previous value.
    #[inline]
    pub fn signal_clear(&self, mask: EventBits) -> Result<EventBits, ClearSignalError> {
        self.thread.inner.signal.clear(mask)
    }
}
