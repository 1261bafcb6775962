// WheelSense — Host stand-ins for the panel and deep sleep

use crate::drivers::framebuffer::{Framebuffer, Panel};
use crate::lifecycle::DeepSleep;

/// Logs how much of the frame is lit instead of driving a panel.
#[derive(Debug, Default)]
pub struct LogPanel {
    frames: u32,
}

impl Panel for LogPanel {
    fn flush(&mut self, frame: &Framebuffer) -> anyhow::Result<()> {
        self.frames += 1;
        log::debug!("Frame {}: {} pixels lit", self.frames, frame.lit_pixels());
        Ok(())
    }
}

/// "Deep sleep" on the host ends the process.
#[derive(Debug, Default)]
pub struct ExitOnSleep;

impl DeepSleep for ExitOnSleep {
    fn arm_wake_sources(&mut self) -> anyhow::Result<()> {
        log::info!("Wake sources: button, reed switch (simulated)");
        Ok(())
    }

    fn suspend(&mut self) {
        log::info!("Suspended; exiting");
        std::process::exit(0);
    }
}

/// A button nobody presses.
#[derive(Debug, Default)]
pub struct IdlePin;

impl embedded_hal::digital::ErrorType for IdlePin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::InputPin for IdlePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
