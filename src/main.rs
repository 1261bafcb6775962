// WheelSense — Firmware Entry Point
//
// Boot sequence:
//   1. Open the counter store and restore the retained blob.
//   2. Classify the wake cause and restore (warm) or reset (cold) the session.
//   3. Bring up the OLED and the mode button.
//   4. Spawn the motion, persistence, power, serial, reset and UI tasks.
//   5. Attach the reed switch ISR (or start the reed simulation).
//
// The unit goes back to deep sleep after five minutes without a wheel pulse.
// Any failure before the tasks start is fatal.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use wheelsense::config::*;
use wheelsense::context::Context;
use wheelsense::events::ResetRequest;
use wheelsense::lifecycle::{self, InactivityMonitor};
use wheelsense::tasks;

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::sync::Mutex;

    use esp_idf_hal::gpio::PinDriver;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use wheelsense::drivers::nvs::NvsBackend;
    use wheelsense::drivers::oled::{SharedBus, Ssd1306};
    use wheelsense::drivers::reed::TaskEvents;
    use wheelsense::drivers::rtc::{self, EspDeepSleep, RtcRetained};
    use wheelsense::input::Button;
    use wheelsense::retained::RetainedState;
    use wheelsense::store::CounterStore;

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("WheelSense firmware starting…");

    // ---- Persistent state -------------------------------------------------
    let nvs = NvsBackend::open(EspDefaultNvsPartition::take()?)?;
    let ctx = Context::new(
        Settings::default(),
        CounterStore::open(nvs),
        RetainedState::restore(RtcRetained::take()),
    );
    lifecycle::boot(&ctx, rtc::wake_cause())?;
    let monitor = InactivityMonitor::new(wheelsense::now_us(), ctx.settings.inactivity_timeout);

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &i2c_config,
    )?;
    // The I2C driver lives for the whole programme.
    let i2c_bus: SharedBus = Box::leak(Box::new(Mutex::new(i2c)));

    let mut oled = Ssd1306::new(i2c_bus);
    let oled_ok = match oled.init() {
        Ok(()) => true,
        Err(e) => {
            // Keep riding without a screen; the serial report still works.
            log::error!("OLED init failed: {:#}", e);
            false
        }
    };

    // GPIO35 is input-only; the pull-up is external.
    let button = Button::new(PinDriver::input(peripherals.pins.gpio35)?);

    // ---- Tasks ------------------------------------------------------------
    // The motion task creates its notification and hands back the notifier
    // the ISR will post to.
    let (notifier_tx, notifier_rx) = mpsc::channel();
    let motion_ctx = ctx.clone();
    thread::Builder::new()
        .name("motion".into())
        .stack_size(STACK_MOTION)
        .spawn(move || {
            let events = TaskEvents::new();
            if notifier_tx.send(events.notifier()).is_err() {
                log::error!("Main thread gone before the reed switch was attached");
                return;
            }
            tasks::motion::motion_task(motion_ctx, events);
        })?;
    let notifier = notifier_rx.recv()?;

    let sleeper = EspDeepSleep::new(oled_ok.then_some(oled));
    spawn_common_tasks(&ctx, monitor, sleeper, button, oled)?;

    #[cfg(not(feature = "simulate"))]
    wheelsense::drivers::reed::attach(ctx.counters.clone(), notifier)?;

    #[cfg(feature = "simulate")]
    {
        let capture = wheelsense::pulse::PulseCapture::new(ctx.counters.clone(), notifier);
        let geometry = ctx.geometry();
        let (speed, duration) = (ctx.settings.simulated_speed_kmh, ctx.settings.simulation_duration);
        thread::Builder::new()
            .name("reed-sim".into())
            .stack_size(STACK_SIMULATION)
            .spawn(move || tasks::simulate::simulation_task(capture, geometry, speed, duration))?;
    }

    log::info!("Boot complete — entering normal operation");

    // Main thread has nothing left to do.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

// ---------------------------------------------------------------------------
// Host: a short simulated ride with in-memory storage.  Exits at "sleep".
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use wheelsense::drivers::host::{ExitOnSleep, IdlePin, LogPanel};
    use wheelsense::input::Button;
    use wheelsense::lifecycle::WakeCause;
    use wheelsense::pulse::{PulseCapture, PulseSignal};
    use wheelsense::retained::{MemoryRetained, RetainedState};
    use wheelsense::store::{CounterStore, MemoryBackend};

    log::set_logger(&HOST_LOGGER).map_err(|e| anyhow::anyhow!("{}", e))?;
    log::set_max_level(log::LevelFilter::Info);
    log::info!("WheelSense host simulation starting…");

    let settings = Settings {
        inactivity_timeout: Duration::from_secs(15),
        inactivity_poll_interval: Duration::from_secs(1),
        flush_interval: Duration::from_secs(10),
        simulation_duration: Duration::from_secs(20),
        ..Settings::default()
    };
    let ctx = Context::new(
        settings,
        CounterStore::open(MemoryBackend::new()),
        RetainedState::restore(MemoryRetained::new()),
    );
    lifecycle::boot(&ctx, WakeCause::Other)?;
    let monitor = InactivityMonitor::new(wheelsense::now_us(), ctx.settings.inactivity_timeout);

    let signal = Arc::new(PulseSignal::new());
    let motion_ctx = ctx.clone();
    let events = Arc::clone(&signal);
    thread::Builder::new()
        .name("motion".into())
        .stack_size(STACK_MOTION)
        .spawn(move || tasks::motion::motion_task(motion_ctx, events))?;

    spawn_common_tasks(&ctx, monitor, ExitOnSleep, Button::new(IdlePin), LogPanel::default())?;

    let capture = PulseCapture::new(ctx.counters.clone(), signal);
    let geometry = ctx.geometry();
    let (speed, duration) = (ctx.settings.simulated_speed_kmh, ctx.settings.simulation_duration);
    thread::Builder::new()
        .name("reed-sim".into())
        .stack_size(STACK_SIMULATION)
        .spawn(move || tasks::simulate::simulation_task(capture, geometry, speed, duration))?;

    // The power task ends the process.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(not(target_os = "espidf"))]
struct HostLogger;

#[cfg(not(target_os = "espidf"))]
static HOST_LOGGER: HostLogger = HostLogger;

#[cfg(not(target_os = "espidf"))]
impl log::Log for HostLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let thread = thread::current();
            println!(
                "[{:>9} ms] {:<5} ({}) {}",
                wheelsense::now_ms(),
                record.level(),
                thread.name().unwrap_or("main"),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

// ---------------------------------------------------------------------------
// Tasks shared by both builds
// ---------------------------------------------------------------------------
fn spawn_common_tasks<B, M, S, P, D>(
    ctx: &Context<B, M>,
    monitor: InactivityMonitor,
    sleeper: S,
    button: wheelsense::input::Button<P>,
    panel: D,
) -> anyhow::Result<()>
where
    B: wheelsense::store::KvBackend + 'static,
    M: wheelsense::retained::RetainedMemory + 'static,
    S: wheelsense::lifecycle::DeepSleep + Send + 'static,
    P: embedded_hal::digital::InputPin + Send + 'static,
    D: wheelsense::drivers::framebuffer::Panel + Send + 'static,
{
    let (reset_tx, reset_rx) = mpsc::channel::<ResetRequest>();

    // Periodic flush
    let persist_ctx = ctx.clone();
    thread::Builder::new()
        .name("persist".into())
        .stack_size(STACK_PERSIST)
        .spawn(move || tasks::persist::persist_task(persist_ctx))?;

    // Inactivity → deep sleep
    let power_ctx = ctx.clone();
    thread::Builder::new()
        .name("power".into())
        .stack_size(STACK_POWER)
        .spawn(move || tasks::power::power_task(power_ctx, monitor, sleeper))?;

    // Serial report
    let serial_ctx = ctx.clone();
    thread::Builder::new()
        .name("serial".into())
        .stack_size(STACK_SERIAL)
        .spawn(move || tasks::serial::serial_task(serial_ctx))?;

    // Long-press resets
    let reset_ctx = ctx.clone();
    thread::Builder::new()
        .name("reset".into())
        .stack_size(STACK_RESET)
        .spawn(move || tasks::reset::reset_task(reset_ctx, reset_rx))?;

    // Display + button
    let ui_ctx = ctx.clone();
    thread::Builder::new()
        .name("ui".into())
        .stack_size(STACK_UI)
        .spawn(move || tasks::ui::ui_task(ui_ctx, button, panel, reset_tx))?;

    Ok(())
}
