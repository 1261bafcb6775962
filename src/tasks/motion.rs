// WheelSense — Motion Task
//
// Blocks on the pulse signal with the stall timeout.  A signal means "at
// least one pulse"; the counters say how many.

use crate::context::Context;
use crate::motion::MotionEstimator;
use crate::pulse::PulseEvents;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

pub fn motion_task<B, M, E>(ctx: Context<B, M>, events: E)
where
    B: KvBackend,
    M: RetainedMemory,
    E: PulseEvents,
{
    log::info!("Motion task started");

    let mut estimator = MotionEstimator::new(ctx.geometry(), ctx.settings.stall_timeout);
    estimator.publish_initial(ctx.counters.count(), ctx.retained.daily_trip_start(), &ctx.motion);

    loop {
        motion_step(&ctx, &mut estimator, &events);
    }
}

/// One wait.  Returns `true` if a pulse was handled, `false` on timeout.
pub fn motion_step<B, M, E>(ctx: &Context<B, M>, estimator: &mut MotionEstimator, events: &E) -> bool
where
    B: KvBackend,
    M: RetainedMemory,
    E: PulseEvents,
{
    if events.wait(ctx.settings.stall_timeout) {
        estimator.on_pulse(ctx.counters.sample(), ctx.retained.daily_trip_start(), &ctx.motion);
        true
    } else {
        estimator.on_timeout(
            crate::now_us(),
            ctx.counters.count(),
            ctx.retained.daily_trip_start(),
            &ctx.motion,
        );
        false
    }
}
