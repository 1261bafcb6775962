// WheelSense — Button Input
//
// Debounced button handler with short-press and long-press detection.
// Polled from the UI and reset tasks; a short press fires on release, a long
// press fires once while the button is still held.

use embedded_hal::digital::InputPin;

use crate::config::*;
use crate::events::ButtonEvent;

/// Pure press classifier.  Feed it the raw level and a millisecond clock.
#[derive(Debug, Clone)]
pub struct PressClassifier {
    debounce_ms: u64,
    short_max_ms: u64,
    long_ms: u64,

    // Debounce state
    last_raw: bool,
    last_change_ms: u64,

    // Press tracking
    button_down: bool,
    press_start_ms: u64,
    long_fired: bool,
}

impl PressClassifier {
    pub fn new() -> Self {
        Self::with_timing(BUTTON_DEBOUNCE_MS, SHORT_PRESS_MAX_MS, LONG_PRESS_MS)
    }

    pub fn with_timing(debounce_ms: u64, short_max_ms: u64, long_ms: u64) -> Self {
        Self {
            debounce_ms,
            short_max_ms,
            long_ms,
            last_raw: false,
            last_change_ms: 0,
            button_down: false,
            press_start_ms: 0,
            long_fired: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.button_down
    }

    pub fn update(&mut self, pressed: bool, now_ms: u64) -> Option<ButtonEvent> {
        // ---- debounce filter ----
        if pressed != self.last_raw {
            self.last_raw = pressed;
            self.last_change_ms = now_ms;
        }
        if now_ms.saturating_sub(self.last_change_ms) < self.debounce_ms {
            return None;
        }

        // ---- pressed edge ----
        if pressed && !self.button_down {
            self.button_down = true;
            self.press_start_ms = self.last_change_ms;
            self.long_fired = false;
            return None;
        }

        let held_ms = now_ms.saturating_sub(self.press_start_ms);

        // ---- held ----
        if pressed && self.button_down {
            if !self.long_fired && held_ms >= self.long_ms {
                self.long_fired = true;
                return Some(ButtonEvent::LongPress);
            }
            return None;
        }

        // ---- released edge ----
        if !pressed && self.button_down {
            self.button_down = false;
            let held_ms = self.last_change_ms.saturating_sub(self.press_start_ms);
            if !self.long_fired && held_ms < self.short_max_ms {
                return Some(ButtonEvent::ShortPress);
            }
        }
        None
    }
}

impl Default for PressClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A button on an active-low input pin.
pub struct Button<P: InputPin> {
    pin: P,
    classifier: PressClassifier,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, classifier: PressClassifier::new() }
    }

    /// Call every ~50 ms.  A pin read error counts as released.
    pub fn poll(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let pressed = self.pin.is_low().unwrap_or(false);
        self.classifier.update(pressed, now_ms)
    }
}
