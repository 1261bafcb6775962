// WheelSense — bicycle computer core
//
// Reed-switch pulses are counted in interrupt context, turned into speed,
// distance and moving time by the motion estimator, shared with the display,
// serial and persistence tasks through a single locked record, and flushed to
// NVS before the inactivity monitor puts the chip into deep sleep.
//
// Everything here builds on the host as well; the ESP-IDF adapters live in
// `drivers` behind `cfg(target_os = "espidf")`.

pub mod config;
pub mod context;
pub mod display;
pub mod drivers;
pub mod events;
pub mod input;
pub mod lifecycle;
pub mod motion;
pub mod persist;
pub mod pulse;
pub mod reset;
pub mod retained;
pub mod state;
pub mod store;
pub mod sync;
pub mod tasks;

#[cfg(test)]
mod integration_tests;

// ---------------------------------------------------------------------------
// Utility: microseconds since boot (monotonic, never wraps in practice)
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
pub fn now_us() -> i64 {
    unsafe { esp_idf_sys::esp_timer_get_time() }
}

#[cfg(not(target_os = "espidf"))]
pub fn now_us() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static BOOT: OnceLock<Instant> = OnceLock::new();
    let boot = BOOT.get_or_init(Instant::now);
    boot.elapsed().as_micros() as i64
}

/// Milliseconds since boot, for the button and display timers.
pub fn now_ms() -> u64 {
    (now_us() / 1000) as u64
}
