//! End-to-end tests: reed edges through capture, the pulse signal, the
//! estimator, resets, sleep and the next boot, all on in-memory backends.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{Settings, NVS_KEY_MOVING_TIME, NVS_KEY_TOTAL_PULSES};
use crate::context::Context;
use crate::events::{DisplayMode, ResetRequest};
use crate::lifecycle::{boot, enter_sleep, BootKind, DeepSleep, InactivityMonitor, WakeCause};
use crate::motion::{MotionEstimator, Phase};
use crate::pulse::{PulseCapture, PulseSignal};
use crate::reset::{reset_shown, ResetAction};
use crate::retained::{MemoryRetained, RetainedState};
use crate::store::{CounterStore, MemoryBackend};
use crate::tasks::motion::motion_step;
use crate::tasks::power::check_inactivity;
use crate::tasks::reset::reset_task;

const T: Duration = Duration::from_millis(10);

type Ctx = Context<MemoryBackend, MemoryRetained>;

/// One power-on of the unit: context, capture path and estimator.
struct Unit {
    ctx: Ctx,
    signal: Arc<PulseSignal>,
    capture: PulseCapture<Arc<PulseSignal>>,
    estimator: MotionEstimator,
}

impl Unit {
    fn power_on(backend: &MemoryBackend, memory: &MemoryRetained, cause: WakeCause) -> (Self, BootKind) {
        let ctx = Context::new(
            Settings::default(),
            CounterStore::open(backend.clone()),
            RetainedState::restore(memory.clone()),
        );
        let report = boot(&ctx, cause).expect("boot");

        let signal = Arc::new(PulseSignal::new());
        let capture = PulseCapture::new(Arc::clone(&ctx.counters), Arc::clone(&signal));
        let mut estimator = MotionEstimator::new(ctx.geometry(), ctx.settings.stall_timeout);
        estimator.publish_initial(ctx.counters.count(), ctx.retained.daily_trip_start(), &ctx.motion);

        (Self { ctx, signal, capture, estimator }, report.kind)
    }

    /// Reed edges every `period_s` starting at `start_s`; each one is
    /// consumed by the motion step like the motion task would.
    fn ride(&mut self, start_s: f64, period_s: f64, pulses: u32) {
        for i in 0..pulses {
            let at_us = ((start_s + f64::from(i) * period_s) * 1_000_000.0).round() as i64;
            assert!(self.capture.on_edge(at_us));
            assert!(motion_step(&self.ctx, &mut self.estimator, &self.signal));
        }
    }
}

#[derive(Default)]
struct RecordingSleep {
    suspended: bool,
}

impl DeepSleep for RecordingSleep {
    fn arm_wake_sources(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }
}

#[test]
fn ride_sleep_and_warm_wake_continue_the_session() {
    let backend = MemoryBackend::new();
    let memory = MemoryRetained::new();

    let (mut unit, kind) = Unit::power_on(&backend, &memory, WakeCause::Other);
    assert_eq!(kind, BootKind::Cold);

    // 41 pulses, 0.25 s apart: 40 intervals = 10 s of riding.
    unit.ride(1.0, 0.25, 41);
    let c = unit.ctx.geometry().distance_per_pulse_m();
    let snap = unit.ctx.motion.snapshot(T).unwrap();
    assert!((snap.speed_kmh - c / 0.25 * 3.6).abs() < 1e-9);
    assert_eq!(snap.moving_time_s, 10);
    assert!((snap.total_distance_km - unit.ctx.geometry().pulses_to_km(41)).abs() < 1e-12);
    assert!(snap.average_speed_kmh > 15.0 && snap.average_speed_kmh < 17.0);

    let mut sleeper = RecordingSleep::default();
    enter_sleep(&unit.ctx, &mut sleeper);
    assert!(sleeper.suspended);
    assert_eq!(backend.committed(NVS_KEY_TOTAL_PULSES), Some(41));
    assert_eq!(backend.committed(NVS_KEY_MOVING_TIME), Some(10));

    // Wheel turns the reed → ext1 wake.
    let (woken, kind) = Unit::power_on(&backend, &memory, WakeCause::Ext1);
    assert_eq!(kind, BootKind::Warm);
    assert_eq!(woken.ctx.counters.count(), 41);
    assert_eq!(woken.ctx.retained.daily_trip_start(), 0);
    assert_eq!(woken.ctx.retained.boot_count(), 1);
    let snap = woken.ctx.motion.snapshot(T).unwrap();
    assert_eq!(snap.moving_time_s, 10);
    assert!((snap.daily_distance_km - woken.ctx.geometry().pulses_to_km(41)).abs() < 1e-12);
}

#[test]
fn power_loss_leads_to_a_cold_boot() {
    let backend = MemoryBackend::new();
    let memory = MemoryRetained::new();

    let (mut unit, _) = Unit::power_on(&backend, &memory, WakeCause::Other);
    unit.ride(1.0, 0.5, 21);
    enter_sleep(&unit.ctx, &mut RecordingSleep::default());

    memory.scramble();
    let (fresh, kind) = Unit::power_on(&backend, &memory, WakeCause::Other);
    assert_eq!(kind, BootKind::Cold);
    assert_eq!(fresh.ctx.counters.count(), 21);
    assert_eq!(fresh.ctx.retained.daily_trip_start(), 21);
    assert_eq!(fresh.ctx.retained.boot_count(), 0);
    assert_eq!(fresh.ctx.motion.moving_time(T), Some(0));
    assert_eq!(backend.committed(NVS_KEY_MOVING_TIME), Some(0));
    let snap = fresh.ctx.motion.snapshot(T).unwrap();
    assert_eq!(snap.daily_distance_km, 0.0);
    assert!(snap.total_distance_km > 0.0);
}

#[test]
fn daily_reset_counts_only_new_pulses() {
    let (mut unit, _) = Unit::power_on(&MemoryBackend::new(), &MemoryRetained::new(), WakeCause::Other);
    unit.ride(1.0, 0.5, 11);

    assert_eq!(reset_shown(&unit.ctx, DisplayMode::DailyDistance), Some(ResetAction::DailyDistance));
    assert_eq!(unit.ctx.retained.daily_trip_start(), 11);

    unit.ride(7.0, 0.5, 5);
    let g = unit.ctx.geometry();
    let snap = unit.ctx.motion.snapshot(T).unwrap();
    assert!((snap.daily_distance_km - g.pulses_to_km(5)).abs() < 1e-12);
    assert!((snap.total_distance_km - g.pulses_to_km(16)).abs() < 1e-12);
}

#[test]
fn long_press_on_odometer_through_the_reset_task_is_a_no_op() {
    let (mut unit, _) = Unit::power_on(&MemoryBackend::new(), &MemoryRetained::new(), WakeCause::Other);
    unit.ride(1.0, 0.5, 11);

    let before = unit.ctx.motion.snapshot(T).unwrap();
    let daily_start = unit.ctx.retained.daily_trip_start();

    let (tx, rx) = mpsc::channel();
    let task_ctx = unit.ctx.clone();
    let handle = thread::spawn(move || reset_task(task_ctx, rx));
    tx.send(ResetRequest { mode: DisplayMode::TotalDistance }).unwrap();
    drop(tx);
    handle.join().unwrap();

    assert_eq!(unit.ctx.counters.count(), 11);
    assert_eq!(unit.ctx.retained.daily_trip_start(), daily_start);
    assert_eq!(unit.ctx.motion.snapshot(T).unwrap().total_distance_km, before.total_distance_km);
}

#[test]
fn stall_then_resume_uses_a_fresh_baseline() {
    let (mut unit, _) = Unit::power_on(&MemoryBackend::new(), &MemoryRetained::new(), WakeCause::Other);
    unit.ride(1.0, 0.5, 5); // 2 s moving

    // The wait times out: no pulse pending.
    assert!(unit.estimator.on_timeout(9_000_000, unit.ctx.counters.count(), 0, &unit.ctx.motion));
    assert_eq!(unit.estimator.phase(), Phase::Stalled);
    assert_eq!(unit.ctx.motion.moving_time(T), Some(7));

    unit.ride(20.0, 0.5, 3);
    let snap = unit.ctx.motion.snapshot(T).unwrap();
    assert_eq!(snap.moving_time_s, 8);
    assert!(snap.speed_kmh > 0.0);
}

#[test]
fn inactivity_check_runs_the_sleep_sequence() {
    let backend = MemoryBackend::new();
    let (mut unit, _) = Unit::power_on(&backend, &MemoryRetained::new(), WakeCause::Other);
    unit.ride(1.0, 0.5, 3);

    let monitor = InactivityMonitor::new(0, unit.ctx.settings.inactivity_timeout);
    let mut sleeper = RecordingSleep::default();

    // Last pulse at 2 s; the timeout is 300 s.
    assert!(!check_inactivity(&unit.ctx, &monitor, &mut sleeper, 301_000_000));
    assert!(unit.ctx.store.is_open());
    assert!(check_inactivity(&unit.ctx, &monitor, &mut sleeper, 303_000_000));
    assert!(sleeper.suspended);
    assert!(!unit.ctx.store.is_open());
    assert_eq!(backend.committed(NVS_KEY_TOTAL_PULSES), Some(3));
}
