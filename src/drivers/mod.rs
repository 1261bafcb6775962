// WheelSense — Hardware adapters
//
// `framebuffer` and `host` build everywhere; the rest talk to ESP-IDF.

pub mod framebuffer;

#[cfg(not(target_os = "espidf"))]
pub mod host;

#[cfg(target_os = "espidf")]
pub mod nvs;
#[cfg(target_os = "espidf")]
pub mod oled;
#[cfg(target_os = "espidf")]
pub mod reed;
#[cfg(target_os = "espidf")]
pub mod rtc;
