// WheelSense — Power Management Task
//
// Polls for inactivity and runs the sleep entry sequence once the wheel has
// been still for the inactivity timeout.

use std::thread;

use crate::context::Context;
use crate::lifecycle::{enter_sleep, DeepSleep, InactivityMonitor};
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

pub fn power_task<B, M, S>(ctx: Context<B, M>, monitor: InactivityMonitor, mut sleeper: S)
where
    B: KvBackend,
    M: RetainedMemory,
    S: DeepSleep,
{
    log::info!(
        "Power task started (sleep after {} s without pulses)",
        ctx.settings.inactivity_timeout.as_secs()
    );

    loop {
        thread::sleep(ctx.settings.inactivity_poll_interval);
        if check_inactivity(&ctx, &monitor, &mut sleeper, crate::now_us()) {
            // Only reachable where suspend returns (host tests).
            return;
        }
    }
}

/// Returns `true` if the sleep sequence ran.
pub fn check_inactivity<B, M, S>(ctx: &Context<B, M>, monitor: &InactivityMonitor, sleeper: &mut S, now_us: i64) -> bool
where
    B: KvBackend,
    M: RetainedMemory,
    S: DeepSleep,
{
    let idle = monitor.idle_for(now_us, &ctx.counters);
    if idle <= ctx.settings.inactivity_timeout {
        log::debug!("Idle for {} s", idle.as_secs());
        return false;
    }
    log::info!("Inactivity timeout ({} s idle); entering deep sleep", idle.as_secs());
    enter_sleep(ctx, sleeper);
    true
}
