// WheelSense — Reset Monitor Task
//
// Waits for long presses forwarded by the UI task and applies the reset for
// the mode each one was made in.

use std::sync::mpsc::Receiver;

use crate::context::Context;
use crate::events::ResetRequest;
use crate::reset::reset_shown;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

pub fn reset_task<B: KvBackend, M: RetainedMemory>(ctx: Context<B, M>, requests: Receiver<ResetRequest>) {
    log::info!("Reset monitor task started");

    for request in requests.iter() {
        reset_shown(&ctx, request.mode);
    }
    log::warn!("Reset channel closed; exiting reset monitor");
}
