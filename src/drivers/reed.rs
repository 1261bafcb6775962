// WheelSense — Reed switch interrupt
//
// Falling edge on the reed pin → `PulseCapture::on_edge` in ISR context →
// FreeRTOS task notification to the motion thread.

use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use esp_idf_hal::delay::TickType;
use esp_idf_hal::task::notification::{Notification, Notifier};
use esp_idf_sys::{self as sys, esp};

use crate::config::PIN_REED_SWITCH;
use crate::pulse::{PulseCapture, PulseCounters, PulseEvents, PulseNotifier};

/// ISR side: wakes the motion thread.
pub struct TaskNotifier(Arc<Notifier>);

impl PulseNotifier for TaskNotifier {
    fn post(&self) {
        // SAFETY: called from the GPIO ISR only.
        unsafe {
            self.0.notify_and_yield(NonZeroU32::MIN);
        }
    }
}

/// Motion-thread side.  Must be created on the thread that waits.
pub struct TaskEvents(Notification);

impl TaskEvents {
    pub fn new() -> Self {
        Self(Notification::new())
    }

    pub fn notifier(&self) -> TaskNotifier {
        TaskNotifier(self.0.notifier())
    }
}

impl PulseEvents for TaskEvents {
    fn wait(&self, timeout: Duration) -> bool {
        let ticks = TickType::new_millis(timeout.as_millis() as u64).ticks();
        self.0.wait(ticks).is_some()
    }
}

static REED_CAPTURE: OnceLock<PulseCapture<TaskNotifier>> = OnceLock::new();

unsafe extern "C" fn reed_isr(_arg: *mut core::ffi::c_void) {
    if let Some(capture) = REED_CAPTURE.get() {
        capture.on_edge(sys::esp_timer_get_time());
    }
}

/// Configure the reed pin (pull-up, falling edge) and attach the ISR.
pub fn attach(counters: Arc<PulseCounters>, notifier: TaskNotifier) -> anyhow::Result<()> {
    if REED_CAPTURE.set(PulseCapture::new(counters, notifier)).is_err() {
        anyhow::bail!("reed switch ISR already attached");
    }

    let config = sys::gpio_config_t {
        pin_bit_mask: 1u64 << PIN_REED_SWITCH,
        mode: sys::gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: sys::gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: sys::gpio_int_type_t_GPIO_INTR_NEGEDGE,
        ..Default::default()
    };
    esp!(unsafe { sys::gpio_config(&config) })?;

    // Already installed is fine.
    if let Some(e) = sys::EspError::from(unsafe { sys::gpio_install_isr_service(0) }) {
        if e.code() != sys::ESP_ERR_INVALID_STATE as sys::esp_err_t {
            return Err(e.into());
        }
    }
    esp!(unsafe { sys::gpio_isr_handler_add(PIN_REED_SWITCH, Some(reed_isr), core::ptr::null_mut()) })?;
    log::info!("ISR handler added for reed GPIO{}", PIN_REED_SWITCH);
    Ok(())
}
