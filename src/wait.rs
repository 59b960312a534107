//! Blocking wait/wake on a single 32-bit word.
//!
//! The pool parks idle workers and the dispatching thread on a
//! [`WaitPrimitive`]: a waiter sleeps while the word still holds the value it
//! last observed, and a publisher stores a new value and wakes every sleeper.
//! Two backends implement the same contract:
//!
//! - [`Futex`] (Linux): the word is handed straight to the kernel wait queue,
//!   no user-space lock is involved.
//! - [`CondvarWait`]: a mutex + condition variable pair guarding the word,
//!   used everywhere else or when the `condvar-wait` feature is enabled.
//!
//! [`DefaultWait`] names the backend selected for the current build. The
//! scheduler is generic over the trait and never looks at the platform.
//!
//! `wait` may return spuriously; callers re-check their own condition in a
//! loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// "Sleep until the word changes" / "wake all sleepers" on a 32-bit word.
pub trait WaitPrimitive: Send + Sync + 'static {
    /// Creates the primitive with the word set to `initial`.
    fn new(initial: u32) -> Self;

    /// Reads the word with acquire ordering.
    fn load(&self) -> u32;

    /// Stores the word with release ordering without waking anyone.
    ///
    /// Only valid while no thread relies on being notified of this change.
    fn store(&self, value: u32);

    /// Blocks while the word equals `expected`.
    ///
    /// Returns immediately if the word already differs. May return
    /// spuriously.
    fn wait(&self, expected: u32);

    /// Stores `value` and wakes every thread blocked in [`wait`](Self::wait).
    ///
    /// A waiter that observed the old value is guaranteed to be woken.
    fn set_and_wake_all(&self, value: u32);
}

#[cfg(all(target_os = "linux", not(feature = "condvar-wait")))]
pub type DefaultWait = Futex;

#[cfg(not(all(target_os = "linux", not(feature = "condvar-wait"))))]
pub type DefaultWait = CondvarWait;

/// Futex-backed wait word.
#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct Futex {
    word: AtomicU32,
}

#[cfg(target_os = "linux")]
impl WaitPrimitive for Futex {
    fn new(initial: u32) -> Self {
        Futex {
            word: AtomicU32::new(initial),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, value: u32) {
        self.word.store(value, Ordering::Release);
    }

    fn wait(&self, expected: u32) {
        if self.load() != expected {
            return;
        }
        // SAFETY: the word is a live, 4-byte aligned AtomicU32 owned by self.
        // The kernel compares it against `expected` atomically with queueing
        // the thread, so a concurrent `set_and_wake_all` cannot slip between
        // the check and the sleep. EINTR/EAGAIN surface as an early return.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                std::ptr::null::<libc::timespec>(),
            );
        }
    }

    fn set_and_wake_all(&self, value: u32) {
        self.word.store(value, Ordering::Release);
        // SAFETY: same word as above; waking with no waiters is a no-op.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
            );
        }
    }
}

/// Mutex + condition variable wait word.
#[derive(Debug)]
pub struct CondvarWait {
    word: AtomicU32,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl WaitPrimitive for CondvarWait {
    fn new(initial: u32) -> Self {
        CondvarWait {
            word: AtomicU32::new(initial),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, value: u32) {
        self.word.store(value, Ordering::Release);
    }

    fn wait(&self, expected: u32) {
        if self.load() != expected {
            return;
        }
        // The predicate is re-checked under the lock that publishers hold
        // while mutating the word.
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .condvar
            .wait_while(guard, |_| self.word.load(Ordering::Acquire) == expected)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn set_and_wake_all(&self, value: u32) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.word.store(value, Ordering::Release);
        self.condvar.notify_all();
    }
}
