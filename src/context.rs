// WheelSense — Task context
//
// Everything the tasks share, built once in `main` and cloned into each
// thread.  Locks live inside the owning types.

use std::sync::Arc;

use crate::config::Settings;
use crate::display::SharedDisplayMode;
use crate::motion::WheelGeometry;
use crate::pulse::PulseCounters;
use crate::retained::{RetainedMemory, RetainedState};
use crate::state::SharedMotionState;
use crate::store::{CounterStore, KvBackend};

pub struct Context<B: KvBackend, M: RetainedMemory> {
    pub settings: Arc<Settings>,
    pub counters: Arc<PulseCounters>,
    pub motion: Arc<SharedMotionState>,
    pub display_mode: Arc<SharedDisplayMode>,
    pub retained: Arc<RetainedState<M>>,
    pub store: Arc<CounterStore<B>>,
}

impl<B: KvBackend, M: RetainedMemory> Context<B, M> {
    pub fn new(settings: Settings, store: CounterStore<B>, retained: RetainedState<M>) -> Self {
        Self {
            settings: Arc::new(settings),
            counters: Arc::new(PulseCounters::new(0)),
            motion: Arc::new(SharedMotionState::new()),
            display_mode: Arc::new(SharedDisplayMode::new()),
            retained: Arc::new(retained),
            store: Arc::new(store),
        }
    }

    pub fn geometry(&self) -> WheelGeometry {
        WheelGeometry::from_settings(&self.settings)
    }
}

impl<B: KvBackend, M: RetainedMemory> Clone for Context<B, M> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            counters: Arc::clone(&self.counters),
            motion: Arc::clone(&self.motion),
            display_mode: Arc::clone(&self.display_mode),
            retained: Arc::clone(&self.retained),
            store: Arc::clone(&self.store),
        }
    }
}
