// WheelSense — Display presentation
//
// Shared display mode (own lock, never held together with the motion lock),
// the auto-cycle / manual-press selector, value formatting, and drawing a
// screen with embedded-graphics.

use std::fmt::Write as _;
use std::sync::MutexGuard;
use std::time::Duration;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Text};

use crate::config::DISPLAY_CYCLE_MS;
use crate::events::DisplayMode;
use crate::state::MotionSnapshot;
use crate::sync::TimedMutex;

// ---------------------------------------------------------------------------
// Shared mode
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct SharedDisplayMode {
    mode: TimedMutex<DisplayMode>,
}

impl SharedDisplayMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, timeout: Duration) -> Option<DisplayMode> {
        self.mode.lock_timeout(timeout).map(|mode| *mode)
    }

    pub fn set(&self, mode: DisplayMode, timeout: Duration) -> bool {
        match self.lock(timeout) {
            Some(mut current) => {
                *current = mode;
                true
            }
            None => false,
        }
    }

    fn lock(&self, timeout: Duration) -> Option<MutexGuard<'_, DisplayMode>> {
        self.mode.lock_timeout(timeout)
    }
}

// ---------------------------------------------------------------------------
// Mode selector
// ---------------------------------------------------------------------------

/// Advances the mode every `period_ms`, or immediately on a short press.
/// A manual press restarts the period and swallows the next automatic step.
#[derive(Debug, Clone)]
pub struct ModeCycler {
    mode: DisplayMode,
    period_ms: u64,
    next_switch_ms: u64,
    manual_change: bool,
}

impl ModeCycler {
    pub fn new(now_ms: u64) -> Self {
        Self::with_period(now_ms, DISPLAY_CYCLE_MS)
    }

    pub fn with_period(now_ms: u64, period_ms: u64) -> Self {
        Self {
            mode: DisplayMode::default(),
            period_ms,
            next_switch_ms: now_ms + period_ms,
            manual_change: false,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn press(&mut self, now_ms: u64) -> DisplayMode {
        let old = self.mode;
        self.mode = self.mode.next();
        self.manual_change = true;
        self.next_switch_ms = now_ms + self.period_ms;
        log::info!("Short press: display {:?} -> {:?}", old, self.mode);
        self.mode
    }

    /// Returns the new mode when the timer switched it.
    pub fn tick(&mut self, now_ms: u64) -> Option<DisplayMode> {
        if now_ms < self.next_switch_ms {
            return None;
        }
        self.next_switch_ms = now_ms + self.period_ms;
        if self.manual_change {
            self.manual_change = false;
            return None;
        }
        self.mode = self.mode.next();
        Some(self.mode)
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `H:MM:SS`
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}

/// The value line for `mode`.
pub fn format_value(mode: DisplayMode, snapshot: &MotionSnapshot) -> String {
    let mut out = String::new();
    let _ = match mode {
        DisplayMode::Speed => write!(out, "{:.1} km/h", snapshot.speed_kmh),
        DisplayMode::DailyDistance => write!(out, "{:.2} km", snapshot.daily_distance_km),
        DisplayMode::TotalDistance => write!(out, "{:.1} km", snapshot.total_distance_km),
        DisplayMode::MaxSpeed => write!(out, "{:.1} km/h", snapshot.max_speed_kmh),
        DisplayMode::AverageSpeed => write!(out, "{:.1} km/h", snapshot.average_speed_kmh),
        DisplayMode::MovingTime => write!(out, "{}", format_duration(snapshot.moving_time_s)),
    };
    out
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------
pub struct Dashboard {
    last: Option<(DisplayMode, String)>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Whether `mode` / `snapshot` would change what is on screen.
    pub fn needs_redraw(&self, mode: DisplayMode, snapshot: &MotionSnapshot) -> bool {
        match &self.last {
            Some((last_mode, last_value)) => *last_mode != mode || *last_value != format_value(mode, snapshot),
            None => true,
        }
    }

    /// Draw title and value centred on `target`.
    pub fn render<D>(&mut self, target: &mut D, mode: DisplayMode, snapshot: &MotionSnapshot) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor> + OriginDimensions,
    {
        let size = target.size();
        let centre_x = (size.width / 2) as i32;
        let value = format_value(mode, snapshot);

        target.clear(BinaryColor::Off)?;

        let title_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_alignment(mode.title(), Point::new(centre_x, 12), title_style, Alignment::Center)
            .draw(target)?;

        let value_style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        Text::with_alignment(&value, Point::new(centre_x, (size.height / 2 + 14) as i32), value_style, Alignment::Center)
            .draw(target)?;

        self.last = Some((mode, value));
        Ok(())
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
