// WheelSense — Durable Counter Store
//
// Thin layer over a key-value backend (NVS on the device).  The handle is
// opened once at boot and closed right before deep sleep.  A missing key
// loads as 0 and the 0 is written back so the next boot finds it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::config::*;
use crate::sync::TimedMutex;

/// Raw persistence surface.  `get_*` return `Ok(None)` for a missing key.
pub trait KvBackend: Send {
    fn get_u64(&mut self, key: &str) -> anyhow::Result<Option<u64>>;
    fn set_u64(&mut self, key: &str, value: u64) -> anyhow::Result<()>;
    fn get_u32(&mut self, key: &str) -> anyhow::Result<Option<u32>>;
    fn set_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()>;
    fn commit(&mut self) -> anyhow::Result<()>;
}

pub struct CounterStore<B: KvBackend> {
    handle: TimedMutex<Option<B>>,
}

const STORE_LOCK_TIMEOUT: Duration = Duration::from_millis(LOCK_TIMEOUT_SLOW_MS);

impl<B: KvBackend> CounterStore<B> {
    pub fn open(backend: B) -> Self {
        log::info!("Counter store opened (namespace '{}')", NVS_NAMESPACE);
        Self { handle: TimedMutex::new(Some(backend)) }
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock_blocking().is_some()
    }

    /// Drop the backend handle.  Every later operation fails until reboot.
    pub fn close(&self) {
        match self.handle.lock_timeout(STORE_LOCK_TIMEOUT) {
            Some(mut handle) => {
                if handle.take().is_some() {
                    log::info!("Counter store handle closed");
                } else {
                    log::warn!("Counter store handle was already closed");
                }
            }
            None => log::warn!("Counter store busy; could not close handle"),
        }
    }

    pub fn load_total_pulses(&self) -> anyhow::Result<u64> {
        self.with_backend(|b| {
            load_or_init(b, NVS_KEY_TOTAL_PULSES, B::get_u64, B::set_u64)
        })
    }

    pub fn save_total_pulses(&self, pulses: u64) -> anyhow::Result<()> {
        self.with_backend(|b| {
            b.set_u64(NVS_KEY_TOTAL_PULSES, pulses)
                .with_context(|| format!("writing '{}'", NVS_KEY_TOTAL_PULSES))?;
            b.commit().context("committing total pulses")
        })
    }

    pub fn load_moving_time(&self) -> anyhow::Result<u32> {
        self.with_backend(|b| {
            load_or_init(b, NVS_KEY_MOVING_TIME, B::get_u32, B::set_u32)
        })
    }

    pub fn save_moving_time(&self, seconds: u32) -> anyhow::Result<()> {
        self.with_backend(|b| {
            b.set_u32(NVS_KEY_MOVING_TIME, seconds)
                .with_context(|| format!("writing '{}'", NVS_KEY_MOVING_TIME))?;
            b.commit().context("committing moving time")
        })
    }

    fn with_backend<T>(&self, op: impl FnOnce(&mut B) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let mut handle = self
            .handle
            .lock_timeout(STORE_LOCK_TIMEOUT)
            .ok_or_else(|| anyhow!("counter store busy"))?;
        let backend = handle.as_mut().ok_or_else(|| anyhow!("counter store handle not open"))?;
        op(backend)
    }
}

fn load_or_init<B, T>(
    backend: &mut B,
    key: &str,
    get: fn(&mut B, &str) -> anyhow::Result<Option<T>>,
    set: fn(&mut B, &str, T) -> anyhow::Result<()>,
) -> anyhow::Result<T>
where
    B: KvBackend,
    T: Copy + Default + std::fmt::Display,
{
    match get(backend, key).with_context(|| format!("reading '{}'", key))? {
        Some(value) => {
            log::info!("Loaded '{}' = {}", key, value);
            Ok(value)
        }
        None => {
            log::info!("Key '{}' not found. Initializing with 0.", key);
            let zero = T::default();
            // The 0 is still a valid answer if the write-back fails.
            if let Err(e) = set(backend, key, zero).and_then(|_| backend.commit()) {
                log::error!("Failed to store initial '{}': {:#}", key, e);
            }
            Ok(zero)
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory backend (host build and tests).  Clones share the same flash, so
// a test can keep one handle while the store owns another, and read what a
// fresh boot would see after the store is closed.
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
struct MemoryFlash {
    committed: HashMap<String, u64>,
    staged: HashMap<String, u64>,
    fail_commits: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    flash: Arc<Mutex<MemoryFlash>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every `commit` fails.
    pub fn failing() -> Self {
        let backend = Self::new();
        backend.set_fail_commits(true);
        backend
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.flash().fail_commits = fail;
    }

    /// Committed value, as a fresh boot would see it.
    pub fn committed(&self, key: &str) -> Option<u64> {
        self.flash().committed.get(key).copied()
    }

    fn flash(&self) -> MutexGuard<'_, MemoryFlash> {
        self.flash.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn read(&self, key: &str) -> Option<u64> {
        let flash = self.flash();
        flash.staged.get(key).or_else(|| flash.committed.get(key)).copied()
    }
}

impl KvBackend for MemoryBackend {
    fn get_u64(&mut self, key: &str) -> anyhow::Result<Option<u64>> {
        Ok(self.read(key))
    }

    fn set_u64(&mut self, key: &str, value: u64) -> anyhow::Result<()> {
        self.flash().staged.insert(key.to_owned(), value);
        Ok(())
    }

    fn get_u32(&mut self, key: &str) -> anyhow::Result<Option<u32>> {
        self.read(key)
            .map(|v| u32::try_from(v).with_context(|| format!("'{}' does not fit u32", key)))
            .transpose()
    }

    fn set_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.set_u64(key, u64::from(value))
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        let mut flash = self.flash();
        if flash.fail_commits {
            return Err(anyhow!("commit rejected"));
        }
        let staged: Vec<_> = flash.staged.drain().collect();
        flash.committed.extend(staged);
        Ok(())
    }
}
