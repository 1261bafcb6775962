// WheelSense — Counter flush
//
// Writes the pulse counter and moving time to the durable store.  Used by the
// periodic flush task and by the sleep entry sequence.

use std::time::Duration;

use crate::config::LOCK_TIMEOUT_SLOW_MS;
use crate::context::Context;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

/// What a flush managed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub total_pulses: Option<u64>,
    pub moving_time_s: Option<u32>,
}

impl FlushReport {
    pub fn is_complete(&self) -> bool {
        self.total_pulses.is_some() && self.moving_time_s.is_some()
    }
}

pub fn flush_counters<B: KvBackend, M: RetainedMemory>(ctx: &Context<B, M>) -> FlushReport {
    let pulses = ctx.counters.count();
    let total_pulses = match ctx.store.save_total_pulses(pulses) {
        Ok(()) => Some(pulses),
        Err(e) => {
            log::error!("Failed to save total pulses: {:#}", e);
            None
        }
    };

    // Copy under the lock, write after releasing it.
    let moving_time_s = match ctx.motion.moving_time(Duration::from_millis(LOCK_TIMEOUT_SLOW_MS)) {
        Some(seconds) => match ctx.store.save_moving_time(seconds) {
            Ok(()) => Some(seconds),
            Err(e) => {
                log::error!("Failed to save moving time: {:#}", e);
                None
            }
        },
        None => {
            log::warn!("Motion state busy; moving time not flushed");
            None
        }
    };

    log::info!("Counters flushed: pulses {:?}, moving time {:?} s", total_pulses, moving_time_s);
    FlushReport { total_pulses, moving_time_s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::retained::{MemoryRetained, RetainedState};
    use crate::store::{CounterStore, MemoryBackend};

    fn context(backend: MemoryBackend) -> Context<MemoryBackend, MemoryRetained> {
        Context::new(
            Settings::default(),
            CounterStore::open(backend),
            RetainedState::restore(MemoryRetained::new()),
        )
    }

    #[test]
    fn flush_writes_both_counters() {
        let ctx = context(MemoryBackend::new());
        ctx.counters.set_count(777);
        ctx.motion.set_moving_time_at_boot(95);

        let report = flush_counters(&ctx);
        assert!(report.is_complete());
        assert_eq!(ctx.store.load_total_pulses().unwrap(), 777);
        assert_eq!(ctx.store.load_moving_time().unwrap(), 95);
    }

    #[test]
    fn store_failure_is_reported_not_fatal() {
        let ctx = context(MemoryBackend::failing());
        ctx.counters.set_count(10);
        let report = flush_counters(&ctx);
        assert_eq!(report.total_pulses, None);
        assert_eq!(report.moving_time_s, None);
        assert_eq!(ctx.counters.count(), 10);
    }

    #[test]
    fn busy_motion_lock_still_saves_pulses() {
        let ctx = context(MemoryBackend::new());
        ctx.counters.set_count(42);
        let _held = ctx.motion.lock(Duration::from_millis(10)).unwrap();
        std::thread::scope(|s| {
            let report = s.spawn(|| flush_counters(&ctx)).join().unwrap();
            assert_eq!(report.total_pulses, Some(42));
            assert_eq!(report.moving_time_s, None);
        });
    }
}
