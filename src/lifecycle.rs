// WheelSense — Power / Lifecycle Controller
//
// Boot: decide from the wake cause whether this is the continuation of a ride
// (warm) or a fresh start (cold), and restore or reset the session state.
//
// Sleep: when no pulse has been seen for the inactivity timeout, flush the
// counters, close the store, arm the wake sources and suspend.  The device
// comes back through `main`, never through the call site.

use std::time::Duration;

use anyhow::Context as _;

use crate::context::Context;
use crate::motion::WheelGeometry;
use crate::persist::flush_counters;
use crate::pulse::PulseCounters;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

// ---------------------------------------------------------------------------
// Wake cause
// ---------------------------------------------------------------------------

/// Why the chip started, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Single RTC pin (the front button).
    Ext0,
    /// RTC pin group (the reed switch).
    Ext1,
    Timer,
    Touchpad,
    Ulp,
    /// Power-on, reset, or a source that is not one of ours.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    Warm,
    Cold,
}

impl WakeCause {
    pub fn boot_kind(self) -> BootKind {
        match self {
            Self::Ext0 | Self::Ext1 | Self::Timer | Self::Touchpad | Self::Ulp => BootKind::Warm,
            Self::Other => BootKind::Cold,
        }
    }
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    pub kind: BootKind,
    pub boot_count: u32,
    pub total_pulses: u64,
    pub daily_trip_start: u64,
    pub moving_time_s: u32,
}

/// Restore the session before any task starts.  A store that can't be read
/// is fatal.
pub fn boot<B: KvBackend, M: RetainedMemory>(ctx: &Context<B, M>, cause: WakeCause) -> anyhow::Result<BootReport> {
    let stored = ctx.store.load_total_pulses().context("loading total pulses")?;
    let total_pulses = apply_odometer_preset(ctx, stored);
    ctx.counters.set_count(total_pulses);

    let kind = cause.boot_kind();
    let moving_time_s = match kind {
        BootKind::Warm => {
            let count = ctx.retained.increment_boot_count();
            log::info!("Warm wake ({:?}); boot count {}", cause, count);
            let seconds = ctx.store.load_moving_time().unwrap_or_else(|e| {
                log::error!("Failed to load moving time: {:#}", e);
                0
            });
            ctx.motion.set_moving_time_at_boot(seconds);
            seconds
        }
        BootKind::Cold => {
            log::info!("Cold boot ({:?}); starting a new session", cause);
            ctx.retained.reset_boot_count();
            ctx.retained.set_daily_trip_start(total_pulses);
            ctx.counters.clear_last_pulse();
            ctx.motion.set_moving_time_at_boot(0);
            if let Err(e) = ctx.store.save_moving_time(0) {
                log::error!("Failed to clear stored moving time: {:#}", e);
            }
            0
        }
    };

    let report = BootReport {
        kind,
        boot_count: ctx.retained.boot_count(),
        total_pulses,
        daily_trip_start: ctx.retained.daily_trip_start(),
        moving_time_s,
    };
    log::info!("{:?}", report);
    Ok(report)
}

fn apply_odometer_preset<B: KvBackend, M: RetainedMemory>(ctx: &Context<B, M>, stored: u64) -> u64 {
    let Some(preset_km) = ctx.settings.odometer_preset_km else {
        return stored;
    };
    let preset = WheelGeometry::from_settings(&ctx.settings).km_to_pulses(preset_km);
    if stored >= preset / 2 {
        return stored;
    }
    log::info!("Odometer preset: {} pulses -> {} pulses ({:.1} km)", stored, preset, preset_km);
    if let Err(e) = ctx.store.save_total_pulses(preset) {
        log::error!("Failed to save odometer preset: {:#}", e);
    }
    preset
}

// ---------------------------------------------------------------------------
// Inactivity
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct InactivityMonitor {
    session_start_us: i64,
    timeout: Duration,
}

impl InactivityMonitor {
    pub fn new(session_start_us: i64, timeout: Duration) -> Self {
        Self { session_start_us, timeout }
    }

    /// Time since the last pulse, or since the session started if there
    /// has been none.
    pub fn idle_for(&self, now_us: i64, counters: &PulseCounters) -> Duration {
        let reference = counters.last_pulse_us().unwrap_or(self.session_start_us);
        Duration::from_micros(now_us.saturating_sub(reference).max(0) as u64)
    }

    pub fn is_inactive(&self, now_us: i64, counters: &PulseCounters) -> bool {
        self.idle_for(now_us, counters) > self.timeout
    }
}

// ---------------------------------------------------------------------------
// Sleep
// ---------------------------------------------------------------------------

/// Platform deep-sleep surface.
pub trait DeepSleep {
    /// Configure the button and reed switch as wake sources.
    fn arm_wake_sources(&mut self) -> anyhow::Result<()>;
    /// Power down.  Does not return on the device.
    fn suspend(&mut self);
}

/// Everything that has to happen before the chip powers down, in order.
pub fn enter_sleep<B, M, S>(ctx: &Context<B, M>, sleeper: &mut S)
where
    B: KvBackend,
    M: RetainedMemory,
    S: DeepSleep,
{
    log::info!("Preparing for deep sleep");
    let report = flush_counters(ctx);
    if !report.is_complete() {
        log::warn!("Sleeping with an incomplete flush: {:?}", report);
    }
    ctx.retained.persist();
    ctx.store.close();

    // Without wake sources only a reset brings the unit back; sleep anyway.
    if let Err(e) = sleeper.arm_wake_sources() {
        log::error!("Failed to arm wake sources: {:#}", e);
    }
    log::info!("Entering deep sleep");
    sleeper.suspend();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{Settings, NVS_KEY_MOVING_TIME, NVS_KEY_TOTAL_PULSES};
    use crate::pulse::{PulseCapture, PulseSignal};
    use crate::retained::{MemoryRetained, RetainedState};
    use crate::store::{CounterStore, MemoryBackend};

    type TestContext = Context<MemoryBackend, MemoryRetained>;

    fn context_with(settings: Settings, backend: MemoryBackend, memory: MemoryRetained) -> TestContext {
        Context::new(settings, CounterStore::open(backend), RetainedState::restore(memory))
    }

    fn seeded_backend(pulses: u64, moving: u32) -> MemoryBackend {
        let backend = MemoryBackend::new();
        let store = CounterStore::open(backend.clone());
        store.save_total_pulses(pulses).unwrap();
        store.save_moving_time(moving).unwrap();
        backend
    }

    #[test]
    fn wake_classification() {
        for cause in [WakeCause::Ext0, WakeCause::Ext1, WakeCause::Timer, WakeCause::Touchpad, WakeCause::Ulp] {
            assert_eq!(cause.boot_kind(), BootKind::Warm);
        }
        assert_eq!(WakeCause::Other.boot_kind(), BootKind::Cold);
    }

    #[test]
    fn warm_wake_keeps_trip_and_restores_moving_time() {
        let memory = MemoryRetained::new();
        RetainedState::restore(memory.clone()).set_daily_trip_start(4_000);

        let ctx = context_with(Settings::default(), seeded_backend(5_000, 600), memory);
        let report = boot(&ctx, WakeCause::Ext1).unwrap();

        assert_eq!(report.kind, BootKind::Warm);
        assert_eq!(report.boot_count, 1);
        assert_eq!(ctx.retained.daily_trip_start(), 4_000);
        assert_eq!(ctx.counters.count(), 5_000);
        assert_eq!(ctx.motion.moving_time(Duration::from_millis(10)), Some(600));
    }

    #[test]
    fn cold_boot_starts_a_new_session() {
        let memory = MemoryRetained::new();
        let previous = RetainedState::restore(memory.clone());
        previous.set_daily_trip_start(4_000);
        previous.increment_boot_count();

        let ctx = context_with(Settings::default(), seeded_backend(5_000, 600), memory);
        let report = boot(&ctx, WakeCause::Other).unwrap();

        assert_eq!(report.kind, BootKind::Cold);
        assert_eq!(report.boot_count, 0);
        assert_eq!(ctx.retained.daily_trip_start(), 5_000);
        assert_eq!(ctx.counters.last_pulse_us(), None);
        assert_eq!(ctx.motion.moving_time(Duration::from_millis(10)), Some(0));
        assert_eq!(ctx.store.load_moving_time().unwrap(), 0);
    }

    #[test]
    fn closed_store_is_fatal_at_boot() {
        let ctx = context_with(Settings::default(), MemoryBackend::new(), MemoryRetained::new());
        ctx.store.close();
        assert!(boot(&ctx, WakeCause::Other).is_err());
    }

    #[test]
    fn odometer_preset_applies_only_to_a_near_empty_store() {
        let settings = Settings { odometer_preset_km: Some(75.0), ..Settings::default() };
        let preset = WheelGeometry::from_settings(&settings).km_to_pulses(75.0);

        let ctx = context_with(settings.clone(), MemoryBackend::new(), MemoryRetained::new());
        boot(&ctx, WakeCause::Other).unwrap();
        assert_eq!(ctx.counters.count(), preset);
        assert_eq!(ctx.store.load_total_pulses().unwrap(), preset);

        let ctx = context_with(settings, seeded_backend(preset, 0), MemoryRetained::new());
        boot(&ctx, WakeCause::Other).unwrap();
        assert_eq!(ctx.counters.count(), preset);
    }

    #[test]
    fn inactivity_reference_is_last_pulse_or_session_start() {
        let counters = PulseCounters::new(0);
        let monitor = InactivityMonitor::new(1_000_000, Duration::from_secs(300));

        assert!(!monitor.is_inactive(300_000_000, &counters));
        assert!(monitor.is_inactive(302_000_000, &counters));

        let capture = PulseCapture::new(Arc::new(counters), Arc::new(PulseSignal::new()));
        capture.on_edge(200_000_000);
        assert!(!monitor.is_inactive(302_000_000, capture.counters()));
        assert!(monitor.is_inactive(501_000_000, capture.counters()));
        assert_eq!(monitor.idle_for(250_000_000, capture.counters()), Duration::from_secs(50));
    }

    struct RecordingSleep {
        armed: bool,
        suspended: bool,
        fail_arm: bool,
    }

    impl DeepSleep for RecordingSleep {
        fn arm_wake_sources(&mut self) -> anyhow::Result<()> {
            if self.fail_arm {
                anyhow::bail!("ext1 rejected");
            }
            self.armed = true;
            Ok(())
        }

        fn suspend(&mut self) {
            self.suspended = true;
        }
    }

    #[test]
    fn sleep_flushes_closes_then_suspends() {
        let backend = MemoryBackend::new();
        let ctx = context_with(Settings::default(), backend.clone(), MemoryRetained::new());
        ctx.counters.set_count(1_234);
        ctx.motion.set_moving_time_at_boot(321);

        let mut sleeper = RecordingSleep { armed: false, suspended: false, fail_arm: false };
        enter_sleep(&ctx, &mut sleeper);

        assert!(sleeper.armed && sleeper.suspended);
        assert!(!ctx.store.is_open());
        assert_eq!(backend.committed(NVS_KEY_TOTAL_PULSES), Some(1_234));
        assert_eq!(backend.committed(NVS_KEY_MOVING_TIME), Some(321));
    }

    #[test]
    fn arm_failure_still_suspends() {
        let ctx = context_with(Settings::default(), MemoryBackend::new(), MemoryRetained::new());
        let mut sleeper = RecordingSleep { armed: false, suspended: false, fail_arm: true };
        enter_sleep(&ctx, &mut sleeper);
        assert!(!sleeper.armed);
        assert!(sleeper.suspended);
    }
}
