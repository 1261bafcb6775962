// WheelSense — RTC memory, wake cause and deep sleep (ESP32)

use std::ptr::{addr_of, addr_of_mut};

use esp_idf_sys::{self as sys, esp};

use crate::config::{PIN_REED_SWITCH, PIN_WAKE_BUTTON};
use crate::drivers::oled::Ssd1306;
use crate::lifecycle::{DeepSleep, WakeCause};
use crate::retained::{RetainedMemory, RETAINED_BLOB_LEN};

// Survives deep sleep, garbage after power loss (the checksum catches that).
#[link_section = ".rtc.data"]
static mut RTC_BLOB: [u8; RETAINED_BLOB_LEN] = [0; RETAINED_BLOB_LEN];

/// Handle to the retained blob.  Create exactly one.
pub struct RtcRetained {
    _private: (),
}

impl RtcRetained {
    pub fn take() -> Self {
        Self { _private: () }
    }
}

impl RetainedMemory for RtcRetained {
    fn read(&self) -> [u8; RETAINED_BLOB_LEN] {
        // SAFETY: only `RtcRetained` touches the blob and it is behind a lock.
        unsafe { core::ptr::read_volatile(addr_of!(RTC_BLOB)) }
    }

    fn write(&mut self, blob: &[u8; RETAINED_BLOB_LEN]) {
        unsafe { core::ptr::write_volatile(addr_of_mut!(RTC_BLOB), *blob) }
    }
}

#[allow(non_upper_case_globals)]
pub fn wake_cause() -> WakeCause {
    let cause = unsafe { sys::esp_sleep_get_wakeup_cause() };
    log::info!("Wakeup cause: {}", cause);
    match cause {
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0 => WakeCause::Ext0,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1 => WakeCause::Ext1,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeCause::Timer,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TOUCHPAD => WakeCause::Touchpad,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_ULP => WakeCause::Ulp,
        _ => WakeCause::Other,
    }
}

/// Button on ext0, reed switch on ext1.  Blanks the OLED on the way down.
pub struct EspDeepSleep {
    oled: Option<Ssd1306>,
}

impl EspDeepSleep {
    pub fn new(oled: Option<Ssd1306>) -> Self {
        Self { oled }
    }
}

impl DeepSleep for EspDeepSleep {
    fn arm_wake_sources(&mut self) -> anyhow::Result<()> {
        log::info!("Configuring wake up sources (ext0 GPIO{}, ext1 GPIO{})", PIN_WAKE_BUTTON, PIN_REED_SWITCH);
        esp!(unsafe { sys::esp_sleep_enable_ext0_wakeup(PIN_WAKE_BUTTON, 0) })?;
        esp!(unsafe {
            sys::esp_sleep_enable_ext1_wakeup(
                1u64 << PIN_REED_SWITCH,
                sys::esp_sleep_ext1_wakeup_mode_t_ESP_EXT1_WAKEUP_ALL_LOW,
            )
        })?;
        Ok(())
    }

    fn suspend(&mut self) {
        if let Some(oled) = self.oled.as_mut() {
            if let Err(e) = oled.power_off() {
                log::warn!("Could not switch the OLED off: {:#}", e);
            }
        }
        unsafe { sys::esp_deep_sleep_start() }
    }
}
