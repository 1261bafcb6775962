// WheelSense — Reset actions
//
// A long press resets whatever the display was showing when it fired.  The
// mode travels with the request, so the display-mode lock is never read
// here.  The motion lock is never held while the retained blob or the store
// is written.

use std::time::Duration;

use crate::config::LOCK_TIMEOUT_SLOW_MS;
use crate::context::Context;
use crate::events::DisplayMode;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    DailyDistance,
    MaxSpeed,
    AverageSpeed,
    MovingTime,
}

impl ResetAction {
    /// The reset a long press triggers in `mode`.  Speed and the odometer
    /// have none.
    pub fn for_mode(mode: DisplayMode) -> Option<Self> {
        match mode {
            DisplayMode::DailyDistance => Some(Self::DailyDistance),
            DisplayMode::MaxSpeed => Some(Self::MaxSpeed),
            DisplayMode::AverageSpeed => Some(Self::AverageSpeed),
            DisplayMode::MovingTime => Some(Self::MovingTime),
            DisplayMode::Speed | DisplayMode::TotalDistance => None,
        }
    }
}

/// Apply the reset for `mode`, the mode shown when the press fired.
/// Returns the action taken, if any.
pub fn reset_shown<B: KvBackend, M: RetainedMemory>(ctx: &Context<B, M>, mode: DisplayMode) -> Option<ResetAction> {
    let Some(action) = ResetAction::for_mode(mode) else {
        log::info!("Long press in {:?}: nothing to reset", mode);
        return None;
    };
    if apply(action, ctx) {
        Some(action)
    } else {
        None
    }
}

/// Returns `false` when the motion state couldn't be locked.
pub fn apply<B: KvBackend, M: RetainedMemory>(action: ResetAction, ctx: &Context<B, M>) -> bool {
    // Baseline first: a publish that lands after this already computes a
    // zero daily distance.
    if action == ResetAction::DailyDistance {
        ctx.retained.set_daily_trip_start(ctx.counters.count());
    }

    let Some(mut record) = ctx.motion.lock(Duration::from_millis(LOCK_TIMEOUT_SLOW_MS)) else {
        log::warn!("Motion state busy; {:?} reset skipped", action);
        return false;
    };

    match action {
        ResetAction::DailyDistance => record.daily_distance_km = 0.0,
        ResetAction::MaxSpeed => record.max_speed_kmh = 0.0,
        ResetAction::AverageSpeed => record.rebaseline_average(),
        ResetAction::MovingTime => record.moving_time_s = 0,
    }
    drop(record);
    log::info!("{:?} reset", action);

    if action == ResetAction::MovingTime {
        if let Err(e) = ctx.store.save_moving_time(0) {
            log::error!("Failed to persist moving time reset: {:#}", e);
        }
    }
    true
}
