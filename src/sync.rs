// WheelSense — Bounded-wait locking
//
// Steady-state tasks never block forever on a lock: they try for a bounded
// time and skip the cycle when it is not available.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

const RETRY_STEP: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct TimedMutex<T> {
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Mutex::new(value) }
    }

    /// Try to take the lock for at most `timeout`.  `None` means the caller
    /// should skip this cycle.
    pub fn lock_timeout(&self, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Some(guard),
                // A panicked writer leaves plain data behind; keep going.
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    thread::sleep(RETRY_STEP.min(deadline - now));
                }
            }
        }
    }

    /// Unconditional acquisition.  Startup only.
    pub fn lock_blocking(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
