// WheelSense — Reed Simulation Task
//
// Feeds the capture path at a steady speed for a fixed time, then stops so
// the inactivity monitor can put the unit to sleep.

use std::thread;
use std::time::{Duration, Instant};

use crate::motion::WheelGeometry;
use crate::pulse::{PulseCapture, PulseNotifier};

pub fn simulation_task<N: PulseNotifier>(capture: PulseCapture<N>, geometry: WheelGeometry, speed_kmh: f64, duration: Duration) {
    let Some(period) = geometry.pulse_period(speed_kmh) else {
        log::warn!("Simulation speed {:.1} km/h produces no pulses", speed_kmh);
        return;
    };
    log::info!(
        "Reed simulation started: {:.1} km/h (one pulse every {} ms) for {} s",
        speed_kmh,
        period.as_millis(),
        duration.as_secs()
    );

    let pulses = run(&capture, period, duration);
    log::info!("Reed simulation finished after {} pulses", pulses);
}

/// Emit edges every `period` until `duration` has passed.  Returns the
/// number of accepted pulses.
pub fn run<N: PulseNotifier>(capture: &PulseCapture<N>, period: Duration, duration: Duration) -> u64 {
    let start = Instant::now();
    let mut accepted = 0;
    while start.elapsed() < duration {
        if capture.on_edge(crate::now_us()) {
            accepted += 1;
        }
        thread::sleep(period);
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pulse::{PulseCounters, PulseSignal};

    #[test]
    fn simulation_feeds_the_capture_path() {
        let counters = Arc::new(PulseCounters::new(100));
        let signal = Arc::new(PulseSignal::new());
        let capture = PulseCapture::new(Arc::clone(&counters), Arc::clone(&signal));

        let pulses = run(&capture, Duration::from_millis(20), Duration::from_millis(110));
        assert!(pulses >= 3);
        assert_eq!(counters.count(), 100 + pulses);
        assert_eq!(u64::from(signal.pending()), pulses);
    }
}
