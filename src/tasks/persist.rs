// WheelSense — Persistence Task
//
// Bounds data loss on an ungraceful power cut: flush the counters every
// `flush_interval` whether or not the unit ever sleeps.

use std::thread;

use crate::context::Context;
use crate::persist::flush_counters;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

pub fn persist_task<B: KvBackend, M: RetainedMemory>(ctx: Context<B, M>) {
    log::info!("Persistence task started (every {} s)", ctx.settings.flush_interval.as_secs());

    loop {
        thread::sleep(ctx.settings.flush_interval);
        flush_counters(&ctx);
    }
}
