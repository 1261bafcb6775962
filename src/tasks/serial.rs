// WheelSense — Serial Reporting Task

use std::thread;
use std::time::Duration;

use crate::config::LOCK_TIMEOUT_FAST_MS;
use crate::context::Context;
use crate::display::format_duration;
use crate::motion::daily_pulses;
use crate::retained::RetainedMemory;
use crate::state::MotionSnapshot;
use crate::store::KvBackend;

pub fn serial_task<B: KvBackend, M: RetainedMemory>(ctx: Context<B, M>) {
    log::info!("Serial reporting task started");

    loop {
        thread::sleep(ctx.settings.reporting_interval);
        match ctx.motion.snapshot(Duration::from_millis(LOCK_TIMEOUT_FAST_MS)) {
            Some(snapshot) => {
                let line = report_line(&snapshot, ctx.counters.count(), ctx.retained.daily_trip_start());
                log::info!("{}", line);
            }
            None => log::warn!("Motion state busy; report skipped"),
        }
    }
}

pub fn report_line(snapshot: &MotionSnapshot, total_pulses: u64, daily_trip_start: u64) -> String {
    format!(
        "Speed: {:.2} km/h | Daily: {:.3} km | Total: {:.3} km | Moving: {} | Pulses: {} | Daily start: {} | Daily pulses: {}",
        snapshot.speed_kmh,
        snapshot.daily_distance_km,
        snapshot.total_distance_km,
        format_duration(snapshot.moving_time_s),
        total_pulses,
        daily_trip_start,
        daily_pulses(total_pulses, daily_trip_start),
    )
}
