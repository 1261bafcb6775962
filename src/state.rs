// WheelSense — Shared Motion State
//
// One record, one lock.  The motion estimator is the regular writer; the
// reset monitor re-baselines fields on a long press; display, serial and
// persistence only read snapshots.

use std::sync::MutexGuard;
use std::time::Duration;

use crate::config::{MAX_PLAUSIBLE_AVERAGE_KMH, MIN_AVERAGE_DISTANCE_KM};
use crate::sync::TimedMutex;

/// What readers get: a copy of the published values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSnapshot {
    pub speed_kmh: f64,
    pub daily_distance_km: f64,
    pub total_distance_km: f64,
    pub moving_time_s: u32,
    pub max_speed_kmh: f64,
    pub average_speed_kmh: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MotionRecord {
    pub speed_kmh: f64,
    pub daily_distance_km: f64,
    pub total_distance_km: f64,
    pub moving_time_s: u32,
    pub max_speed_kmh: f64,
    pub average_speed_kmh: f64,
    /// Average-speed baseline: odometer value when the average was reset.
    pub avg_start_total_km: f64,
    /// Moving time accumulated since the average-speed baseline.
    pub avg_moving_s: f64,
    avg_initialised: bool,
}

impl MotionRecord {
    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            speed_kmh: self.speed_kmh,
            daily_distance_km: self.daily_distance_km,
            total_distance_km: self.total_distance_km,
            moving_time_s: self.moving_time_s,
            max_speed_kmh: self.max_speed_kmh,
            average_speed_kmh: self.average_speed_kmh,
        }
    }

    /// Publish a new instantaneous speed and raise the high-water mark.
    pub fn set_speed(&mut self, speed_kmh: f64) {
        self.speed_kmh = speed_kmh;
        if speed_kmh > self.max_speed_kmh {
            self.max_speed_kmh = speed_kmh;
        }
    }

    /// Pin the average-speed baseline the first time distances are published.
    pub fn ensure_average_baseline(&mut self) {
        if !self.avg_initialised {
            self.rebaseline_average();
        }
    }

    /// Restart the average from the current odometer value.
    pub fn rebaseline_average(&mut self) {
        self.avg_start_total_km = self.total_distance_km;
        self.avg_moving_s = 0.0;
        self.average_speed_kmh = 0.0;
        self.avg_initialised = true;
    }

    /// Fold `moving_s` seconds of motion into the average and recompute it.
    /// An implausible result means the baseline is stale; start over.
    pub fn update_average(&mut self, moving_s: f64) {
        if !self.avg_initialised {
            self.rebaseline_average();
            return;
        }
        self.avg_moving_s += moving_s;

        let distance_km = self.total_distance_km - self.avg_start_total_km;
        if self.avg_moving_s <= 0.0 || distance_km <= MIN_AVERAGE_DISTANCE_KM {
            if self.avg_moving_s <= 0.0 {
                self.average_speed_kmh = 0.0;
            }
            return;
        }

        let average = distance_km / (self.avg_moving_s / 3600.0);
        if average > MAX_PLAUSIBLE_AVERAGE_KMH {
            log::warn!("Implausible average speed ({:.1} km/h); restarting average", average);
            self.rebaseline_average();
        } else {
            self.average_speed_kmh = average;
        }
    }
}

#[derive(Debug, Default)]
pub struct SharedMotionState {
    record: TimedMutex<MotionRecord>,
}

impl SharedMotionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded-wait access for steady-state tasks.
    pub fn lock(&self, timeout: Duration) -> Option<MutexGuard<'_, MotionRecord>> {
        self.record.lock_timeout(timeout)
    }

    /// Copy of the published values, or `None` if the lock was busy.
    pub fn snapshot(&self, timeout: Duration) -> Option<MotionSnapshot> {
        self.lock(timeout).map(|record| record.snapshot())
    }

    pub fn moving_time(&self, timeout: Duration) -> Option<u32> {
        self.lock(timeout).map(|record| record.moving_time_s)
    }

    /// Startup-only writer for the boot restore path.
    pub fn set_moving_time_at_boot(&self, seconds: u32) {
        self.record.lock_blocking().moving_time_s = seconds;
    }
}
