// WheelSense — Retained (sleep-surviving) state
//
// The daily-trip start count and the boot counter survive deep sleep but not
// power loss.  They are kept in atomics while running and mirrored into a
// small checksummed blob in RTC memory on every change, so a warm wake can
// restore them before any task starts.  A blob that fails its checks (first
// power-on, brown-out) restores defaults.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portable_atomic::AtomicU64;

use crate::config::LOCK_TIMEOUT_SLOW_MS;
use crate::sync::TimedMutex;

pub const RETAINED_BLOB_LEN: usize = 20;
const RETAINED_MAGIC: u32 = 0x5748_4C31; // "WHL1"

/// Storage for the blob.  RTC slow memory on the device.
pub trait RetainedMemory: Send {
    fn read(&self) -> [u8; RETAINED_BLOB_LEN];
    fn write(&mut self, blob: &[u8; RETAINED_BLOB_LEN]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetainedSnapshot {
    pub daily_trip_start: u64,
    pub boot_count: u32,
}

impl RetainedSnapshot {
    /// Layout: magic (u32 LE) | daily_trip_start (u64 LE) | boot_count (u32 LE) | checksum (u32 LE)
    pub fn encode(&self) -> [u8; RETAINED_BLOB_LEN] {
        let mut blob = [0u8; RETAINED_BLOB_LEN];
        blob[0..4].copy_from_slice(&RETAINED_MAGIC.to_le_bytes());
        blob[4..12].copy_from_slice(&self.daily_trip_start.to_le_bytes());
        blob[12..16].copy_from_slice(&self.boot_count.to_le_bytes());
        let sum = checksum(&blob[..16]);
        blob[16..20].copy_from_slice(&sum.to_le_bytes());
        blob
    }

    pub fn decode(blob: &[u8; RETAINED_BLOB_LEN]) -> Option<Self> {
        let magic = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
        let stored_sum = u32::from_le_bytes([blob[16], blob[17], blob[18], blob[19]]);
        if magic != RETAINED_MAGIC || stored_sum != checksum(&blob[..16]) {
            return None;
        }
        let mut start = [0u8; 8];
        start.copy_from_slice(&blob[4..12]);
        Some(Self {
            daily_trip_start: u64::from_le_bytes(start),
            boot_count: u32::from_le_bytes([blob[12], blob[13], blob[14], blob[15]]),
        })
    }
}

// FNV-1a, 32 bit.
fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0x811C_9DC5u32, |hash, b| (hash ^ u32::from(*b)).wrapping_mul(0x0100_0193))
}

pub struct RetainedState<M: RetainedMemory> {
    daily_trip_start: AtomicU64,
    boot_count: AtomicU32,
    memory: TimedMutex<M>,
}

impl<M: RetainedMemory> RetainedState<M> {
    /// Restore from the blob in `memory`, or start from defaults.
    pub fn restore(memory: M) -> Self {
        let snapshot = match RetainedSnapshot::decode(&memory.read()) {
            Some(snapshot) => {
                log::info!(
                    "Retained state restored: daily start {}, boot count {}",
                    snapshot.daily_trip_start,
                    snapshot.boot_count
                );
                snapshot
            }
            None => {
                log::info!("No valid retained state; starting from defaults");
                RetainedSnapshot::default()
            }
        };
        Self {
            daily_trip_start: AtomicU64::new(snapshot.daily_trip_start),
            boot_count: AtomicU32::new(snapshot.boot_count),
            memory: TimedMutex::new(memory),
        }
    }

    pub fn snapshot(&self) -> RetainedSnapshot {
        RetainedSnapshot {
            daily_trip_start: self.daily_trip_start(),
            boot_count: self.boot_count(),
        }
    }

    pub fn daily_trip_start(&self) -> u64 {
        self.daily_trip_start.load(Ordering::Relaxed)
    }

    pub fn set_daily_trip_start(&self, pulses: u64) {
        self.daily_trip_start.store(pulses, Ordering::Relaxed);
        self.persist();
    }

    pub fn boot_count(&self) -> u32 {
        self.boot_count.load(Ordering::Relaxed)
    }

    pub fn increment_boot_count(&self) -> u32 {
        let count = self.boot_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.persist();
        count
    }

    pub fn reset_boot_count(&self) {
        self.boot_count.store(0, Ordering::Relaxed);
        self.persist();
    }

    /// Mirror the current values into retained memory.
    pub fn persist(&self) {
        let blob = self.snapshot().encode();
        match self.memory.lock_timeout(Duration::from_millis(LOCK_TIMEOUT_SLOW_MS)) {
            Some(mut memory) => memory.write(&blob),
            None => log::warn!("Retained memory busy; blob not updated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Host stand-in for RTC memory.  Clones share the same bytes, so a test can
// keep one handle across a simulated deep sleep.
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MemoryRetained {
    blob: Arc<Mutex<[u8; RETAINED_BLOB_LEN]>>,
}

impl MemoryRetained {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate power loss: RTC memory comes back as garbage.
    pub fn scramble(&self) {
        let mut blob = self.blob.lock().unwrap_or_else(|p| p.into_inner());
        *blob = [0xA5; RETAINED_BLOB_LEN];
    }
}

impl RetainedMemory for MemoryRetained {
    fn read(&self) -> [u8; RETAINED_BLOB_LEN] {
        *self.blob.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&mut self, blob: &[u8; RETAINED_BLOB_LEN]) {
        *self.blob.lock().unwrap_or_else(|p| p.into_inner()) = *blob;
    }
}
