// WheelSense — Pulse Capture
//
// The reed switch ISR calls `PulseCapture::on_edge` with the hardware timer
// value.  Edges closer than the debounce window to the last accepted edge are
// dropped without side effects.  Accepted edges bump the pulse counter, stamp
// the last-pulse time and post one unit to the pulse signal.  No locks on
// this path; only atomics and a non-blocking post.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use portable_atomic::{AtomicI64, AtomicU64};

use crate::config::PULSE_DEBOUNCE_US;

/// Sentinel for "no pulse yet this power-on cycle".
pub const NO_PULSE: i64 = i64::MIN;

// ---------------------------------------------------------------------------
// Counters shared between the ISR and every reader
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct PulseCounters {
    count: AtomicU64,
    last_pulse_us: AtomicI64,
}

/// One consistent-enough view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSample {
    pub count: u64,
    pub last_pulse_us: Option<i64>,
}

impl PulseCounters {
    pub fn new(initial_count: u64) -> Self {
        Self {
            count: AtomicU64::new(initial_count),
            last_pulse_us: AtomicI64::new(NO_PULSE),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn last_pulse_us(&self) -> Option<i64> {
        match self.last_pulse_us.load(Ordering::Relaxed) {
            NO_PULSE => None,
            ts => Some(ts),
        }
    }

    pub fn sample(&self) -> PulseSample {
        // Timestamp first: a pulse landing in between yields a newer count
        // with an older stamp, which the estimator sees as dt == 0 next time.
        let last_pulse_us = self.last_pulse_us();
        PulseSample { count: self.count(), last_pulse_us }
    }

    /// Reinitialise the odometer (boot restore / preset).
    pub fn set_count(&self, count: u64) {
        self.count.store(count, Ordering::Relaxed);
    }

    /// Forget the last pulse time (cold boot).
    pub fn clear_last_pulse(&self) {
        self.last_pulse_us.store(NO_PULSE, Ordering::Relaxed);
    }

    fn record(&self, now_us: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.last_pulse_us.store(now_us, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Signalling seams
// ---------------------------------------------------------------------------

/// Producer side of the pulse-available signal.  Must be callable from
/// interrupt context: bounded, non-blocking, lock-free.
pub trait PulseNotifier: Send + Sync {
    fn post(&self);
}

/// Consumer side: block until at least one pulse was posted or the timeout
/// elapsed.  Returns `false` on timeout.
pub trait PulseEvents {
    fn wait(&self, timeout: Duration) -> bool;
}

/// Counting signal for a single consumer thread.
///
/// `post` is an atomic increment plus an unpark of the registered waiter;
/// `wait` consumes one unit.
#[derive(Debug, Default)]
pub struct PulseSignal {
    pending: AtomicU32,
    waiter: OnceLock<Thread>,
}

impl PulseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    fn try_take(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl PulseNotifier for PulseSignal {
    fn post(&self) {
        self.pending.fetch_add(1, Ordering::Release);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }
}

impl PulseEvents for PulseSignal {
    fn wait(&self, timeout: Duration) -> bool {
        self.waiter.get_or_init(thread::current);
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_take() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

impl<T: PulseNotifier + ?Sized> PulseNotifier for Arc<T> {
    fn post(&self) {
        (**self).post()
    }
}

impl<T: PulseEvents + ?Sized> PulseEvents for Arc<T> {
    fn wait(&self, timeout: Duration) -> bool {
        (**self).wait(timeout)
    }
}

// ---------------------------------------------------------------------------
// Edge handler (ISR side)
// ---------------------------------------------------------------------------
pub struct PulseCapture<N: PulseNotifier> {
    counters: Arc<PulseCounters>,
    notifier: N,
    debounce_us: i64,
    last_accepted_us: AtomicI64,
}

impl<N: PulseNotifier> PulseCapture<N> {
    pub fn new(counters: Arc<PulseCounters>, notifier: N) -> Self {
        Self {
            counters,
            notifier,
            debounce_us: PULSE_DEBOUNCE_US,
            last_accepted_us: AtomicI64::new(NO_PULSE),
        }
    }

    pub fn counters(&self) -> &Arc<PulseCounters> {
        &self.counters
    }

    /// Handle one falling edge seen at `now_us`.  Returns whether it was
    /// accepted as a pulse.
    pub fn on_edge(&self, now_us: i64) -> bool {
        let last = self.last_accepted_us.load(Ordering::Relaxed);
        if last != NO_PULSE && now_us.saturating_sub(last) < self.debounce_us {
            return false;
        }
        self.last_accepted_us.store(now_us, Ordering::Relaxed);
        self.counters.record(now_us);
        self.notifier.post();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> (Arc<PulseCounters>, Arc<PulseSignal>, PulseCapture<Arc<PulseSignal>>) {
        let counters = Arc::new(PulseCounters::new(0));
        let signal = Arc::new(PulseSignal::new());
        let capture = PulseCapture::new(Arc::clone(&counters), Arc::clone(&signal));
        (counters, signal, capture)
    }

    #[test]
    fn edges_inside_debounce_window_count_once() {
        let (counters, signal, capture) = capture();
        assert!(capture.on_edge(1_000_000));
        assert!(!capture.on_edge(1_000_000 + 9_999));
        assert_eq!(counters.count(), 1);
        assert_eq!(counters.last_pulse_us(), Some(1_000_000));
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn edges_past_debounce_window_count_twice() {
        let (counters, signal, capture) = capture();
        assert!(capture.on_edge(1_000_000));
        assert!(capture.on_edge(1_000_000 + 10_001));
        assert_eq!(counters.count(), 2);
        assert_eq!(counters.last_pulse_us(), Some(1_010_001));
        assert_eq!(signal.pending(), 2);
    }

    #[test]
    fn first_edge_after_boot_is_accepted() {
        let (counters, _signal, capture) = capture();
        assert!(capture.on_edge(0));
        assert_eq!(counters.count(), 1);
    }

    #[test]
    fn count_never_decreases_over_accepted_edges() {
        let (counters, _signal, capture) = capture();
        let mut previous = counters.count();
        for i in 0..200i64 {
            capture.on_edge(i * 7_000);
            let now = counters.count();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn cleared_counters_report_no_pulse() {
        let counters = PulseCounters::new(42);
        assert_eq!(counters.sample(), PulseSample { count: 42, last_pulse_us: None });
        counters.record(5);
        counters.clear_last_pulse();
        assert_eq!(counters.last_pulse_us(), None);
        assert_eq!(counters.count(), 43);
    }

    #[test]
    fn wait_consumes_posted_units_then_times_out() {
        let signal = PulseSignal::new();
        signal.post();
        signal.post();
        assert!(signal.wait(Duration::ZERO));
        assert!(signal.wait(Duration::ZERO));
        assert!(!signal.wait(Duration::from_millis(5)));
    }

    #[test]
    fn post_from_another_thread_wakes_waiter() {
        let signal = Arc::new(PulseSignal::new());
        let producer = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.post();
        });
        assert!(signal.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
