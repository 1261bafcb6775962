// WheelSense — Hardware & System Configuration
// Target: ESP32 (Xtensa) with a reed switch on the fork and one front button.

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_REED_SWITCH: i32 = 26; // Reed switch, INPUT_PULLUP, falling edge per pass
pub const PIN_WAKE_BUTTON: i32 = 0;  // Boot button, ext0 wake source
pub const PIN_MODE_BUTTON: i32 = 35; // Mode / reset button (external pull-up required)
pub const PIN_I2C_SDA: i32 = 21;
pub const PIN_I2C_SCL: i32 = 22;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_OLED: u8 = 0x3C;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Display (SSD1306 OLED)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;
pub const DISPLAY_BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 1024

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_MOTION: usize = 4096;
pub const STACK_SERIAL: usize = 4096;
pub const STACK_PERSIST: usize = 4096;
pub const STACK_POWER: usize = 4096;
pub const STACK_RESET: usize = 3072;
pub const STACK_UI: usize = 8192;
pub const STACK_SIMULATION: usize = 3072;

// ---------------------------------------------------------------------------
// Wheel geometry
// ---------------------------------------------------------------------------
pub const WHEEL_DIAMETER_M: f64 = 0.348;
pub const PULSES_PER_REVOLUTION: u32 = 1;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
pub const PULSE_DEBOUNCE_US: i64 = 10_000;             // 10 ms between accepted edges
pub const STALL_TIMEOUT_MS: u64 = 5000;                // no pulse → speed 0
pub const REPORTING_INTERVAL_MS: u64 = 1000;           // serial report
pub const INACTIVITY_TIMEOUT_S: u64 = 5 * 60;          // 5 minutes → deep sleep
pub const INACTIVITY_POLL_INTERVAL_MS: u64 = 30_000;
pub const NVS_SAVE_INTERVAL_MS: u64 = 15 * 60 * 1000;  // periodic flush
pub const BUTTON_POLL_INTERVAL_MS: u64 = 50;
pub const BUTTON_DEBOUNCE_MS: u64 = 50;
pub const LONG_PRESS_MS: u64 = 1000;                   // reset action hold
pub const SHORT_PRESS_MAX_MS: u64 = 400;               // mode cycle press
pub const DISPLAY_CYCLE_MS: u64 = 3000;                // auto mode switch
pub const UI_POLL_INTERVAL_MS: u64 = 50;

// Lock acquisition budgets
pub const LOCK_TIMEOUT_FAST_MS: u64 = 10;
pub const LOCK_TIMEOUT_MS: u64 = 50;
pub const LOCK_TIMEOUT_SLOW_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Derived stats
// ---------------------------------------------------------------------------
pub const MAX_PLAUSIBLE_AVERAGE_KMH: f64 = 200.0;
pub const MIN_AVERAGE_DISTANCE_KM: f64 = 0.001;

// ---------------------------------------------------------------------------
// Durable store (NVS)
// ---------------------------------------------------------------------------
pub const NVS_NAMESPACE: &str = "storage";
pub const NVS_KEY_TOTAL_PULSES: &str = "total_pulses";
pub const NVS_KEY_MOVING_TIME: &str = "moving_time";

// ---------------------------------------------------------------------------
// Reed simulation
// ---------------------------------------------------------------------------
pub const SIMULATED_SPEED_KMH: f64 = 14.5;
pub const SIMULATION_DURATION_MINUTES: u64 = 3;

/// Runtime tunables.  Built from the constants above; tests and the host
/// build override individual fields.
#[derive(Debug, Clone)]
pub struct Settings {
    pub wheel_diameter_m: f64,
    pub pulses_per_revolution: u32,
    pub stall_timeout: Duration,
    pub reporting_interval: Duration,
    pub inactivity_timeout: Duration,
    pub inactivity_poll_interval: Duration,
    pub flush_interval: Duration,
    /// Initial odometer value applied when the stored count is far below it.
    pub odometer_preset_km: Option<f64>,
    pub simulated_speed_kmh: f64,
    pub simulation_duration: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wheel_diameter_m: WHEEL_DIAMETER_M,
            pulses_per_revolution: PULSES_PER_REVOLUTION,
            stall_timeout: Duration::from_millis(STALL_TIMEOUT_MS),
            reporting_interval: Duration::from_millis(REPORTING_INTERVAL_MS),
            inactivity_timeout: Duration::from_secs(INACTIVITY_TIMEOUT_S),
            inactivity_poll_interval: Duration::from_millis(INACTIVITY_POLL_INTERVAL_MS),
            flush_interval: Duration::from_millis(NVS_SAVE_INTERVAL_MS),
            odometer_preset_km: None,
            simulated_speed_kmh: SIMULATED_SPEED_KMH,
            simulation_duration: Duration::from_secs(SIMULATION_DURATION_MINUTES * 60),
        }
    }
}
