// WheelSense — Motion Estimator
//
// Turns the pulse stream into speed, distance and moving time.
//
//   AwaitingFirstPulse ──pulse──▶ Tracking ◀──pulse── Stalled
//                                    │                   ▲
//                                    └──── timeout ──────┘
//
// The first pulse of a session, and the first pulse after a stall, only
// sets the baseline timestamp: no interval is measured against a timestamp
// from before the stall.
//
// Speed is computed from the pulses counted between two events, so a
// coalesced wake-up (two pulses, one signal) still yields the right value.
// Distances are recomputed from the counters on every event.

use std::time::Duration;

use crate::config::{Settings, LOCK_TIMEOUT_MS};
use crate::pulse::PulseSample;
use crate::state::{MotionRecord, SharedMotionState};

// ---------------------------------------------------------------------------
// Wheel geometry
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGeometry {
    distance_per_pulse_m: f64,
}

impl WheelGeometry {
    pub fn new(wheel_diameter_m: f64, pulses_per_revolution: u32) -> Self {
        let circumference_m = std::f64::consts::PI * wheel_diameter_m;
        Self { distance_per_pulse_m: circumference_m / f64::from(pulses_per_revolution.max(1)) }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.wheel_diameter_m, settings.pulses_per_revolution)
    }

    pub fn distance_per_pulse_m(&self) -> f64 {
        self.distance_per_pulse_m
    }

    pub fn pulses_to_km(&self, pulses: u64) -> f64 {
        pulses as f64 * self.distance_per_pulse_m / 1000.0
    }

    pub fn km_to_pulses(&self, km: f64) -> u64 {
        (km * 1000.0 / self.distance_per_pulse_m) as u64
    }

    /// Time between pulses at a steady `speed_kmh`.  `None` for non-positive
    /// speeds.
    pub fn pulse_period(&self, speed_kmh: f64) -> Option<Duration> {
        if speed_kmh <= 0.0 {
            return None;
        }
        let pulses_per_s = (speed_kmh / 3.6) / self.distance_per_pulse_m;
        Some(Duration::from_secs_f64(1.0 / pulses_per_s))
    }
}

/// Daily trip pulses; zero if the start mark is ahead of the counter.
pub fn daily_pulses(count: u64, daily_trip_start: u64) -> u64 {
    count.saturating_sub(daily_trip_start)
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstPulse,
    /// `moving` is false until the first interval after a baseline.
    Tracking { last_pulse_us: i64, moving: bool },
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PulseOutcome {
    /// Timestamp recorded as the new reference, no speed yet.
    Baseline,
    Speed(f64),
    /// Non-positive interval or nothing new; state untouched.
    Discarded,
}

pub struct MotionEstimator {
    geometry: WheelGeometry,
    stall_timeout_us: i64,
    lock_timeout: Duration,
    phase: Phase,
    last_count: u64,
    speed_kmh: f64,
    /// Sub-second moving time not yet promoted to whole seconds.
    fractional_s: f64,
    /// Whole seconds / average-speed time not yet written to the record
    /// (the lock was busy).
    pending_s: u32,
    pending_avg_s: f64,
}

impl MotionEstimator {
    pub fn new(geometry: WheelGeometry, stall_timeout: Duration) -> Self {
        Self {
            geometry,
            stall_timeout_us: stall_timeout.as_micros() as i64,
            lock_timeout: Duration::from_millis(LOCK_TIMEOUT_MS),
            phase: Phase::AwaitingFirstPulse,
            last_count: 0,
            speed_kmh: 0.0,
            fractional_s: 0.0,
            pending_s: 0,
            pending_avg_s: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    /// Publish distances before the first pulse so readers see the odometer
    /// right after boot.
    pub fn publish_initial(&mut self, count: u64, daily_trip_start: u64, state: &SharedMotionState) {
        self.last_count = count;
        self.publish(state, count, daily_trip_start, None);
    }

    pub fn on_pulse(
        &mut self,
        sample: PulseSample,
        daily_trip_start: u64,
        state: &SharedMotionState,
    ) -> PulseOutcome {
        let Some(pulse_us) = sample.last_pulse_us else {
            return PulseOutcome::Discarded;
        };

        let outcome = match self.phase {
            Phase::AwaitingFirstPulse | Phase::Stalled => {
                log::debug!("Baseline pulse at {} us (count {})", pulse_us, sample.count);
                self.phase = Phase::Tracking { last_pulse_us: pulse_us, moving: false };
                self.last_count = sample.count;
                PulseOutcome::Baseline
            }
            Phase::Tracking { last_pulse_us, .. } => {
                let dt_us = pulse_us - last_pulse_us;
                let pulses = sample.count.saturating_sub(self.last_count);
                if dt_us <= 0 || pulses == 0 {
                    return PulseOutcome::Discarded;
                }

                let dt_s = dt_us as f64 / 1_000_000.0;
                let speed = pulses as f64 * self.geometry.distance_per_pulse_m / dt_s * 3.6;

                self.phase = Phase::Tracking { last_pulse_us: pulse_us, moving: true };
                self.last_count = sample.count;
                self.speed_kmh = speed;
                self.accumulate(dt_s);
                PulseOutcome::Speed(speed)
            }
        };

        let speed = match outcome {
            PulseOutcome::Speed(speed) => Some(speed),
            _ => None,
        };
        self.publish(state, sample.count, daily_trip_start, speed);
        outcome
    }

    /// No pulse arrived within the stall timeout.  Returns `true` when this
    /// call moved the estimator into `Stalled`.
    pub fn on_timeout(&mut self, now_us: i64, count: u64, daily_trip_start: u64, state: &SharedMotionState) -> bool {
        match self.phase {
            Phase::Tracking { last_pulse_us, moving } => {
                if moving {
                    let elapsed_us = (now_us - last_pulse_us).clamp(0, self.stall_timeout_us);
                    self.accumulate(elapsed_us as f64 / 1_000_000.0);
                }
                self.phase = Phase::Stalled;
                self.speed_kmh = 0.0;
                log::info!("No pulse for {} ms; speed forced to 0", self.stall_timeout_us / 1000);
                self.publish(state, count, daily_trip_start, Some(0.0));
                true
            }
            Phase::AwaitingFirstPulse | Phase::Stalled => {
                if self.pending_s > 0 || self.pending_avg_s > 0.0 {
                    self.publish(state, count, daily_trip_start, None);
                }
                false
            }
        }
    }

    fn accumulate(&mut self, seconds: f64) {
        self.fractional_s += seconds;
        if self.fractional_s >= 1.0 {
            let whole = self.fractional_s.floor();
            self.pending_s = self.pending_s.saturating_add(whole as u32);
            self.fractional_s -= whole;
        }
        self.pending_avg_s += seconds;
    }

    fn publish(&mut self, state: &SharedMotionState, count: u64, daily_trip_start: u64, speed: Option<f64>) {
        let Some(mut record) = state.lock(self.lock_timeout) else {
            log::warn!("Motion estimator couldn't get the state lock; update deferred");
            return;
        };
        self.write_record(&mut record, count, daily_trip_start, speed);
    }

    fn write_record(&mut self, record: &mut MotionRecord, count: u64, daily_trip_start: u64, speed: Option<f64>) {
        record.total_distance_km = self.geometry.pulses_to_km(count);
        record.daily_distance_km = self.geometry.pulses_to_km(daily_pulses(count, daily_trip_start));
        if let Some(speed) = speed {
            record.set_speed(speed);
        }
        record.moving_time_s = record.moving_time_s.saturating_add(self.pending_s);
        self.pending_s = 0;

        if self.pending_avg_s > 0.0 {
            record.update_average(self.pending_avg_s);
            self.pending_avg_s = 0.0;
        } else {
            record.ensure_average_baseline();
        }
    }
}
