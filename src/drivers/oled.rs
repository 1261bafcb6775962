// WheelSense — SSD1306 OLED Driver
//
// Register-level driver over the shared I2C bus.  Frames are drawn into a
// `Framebuffer` elsewhere; this only pushes bytes.

use std::sync::Mutex;

use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;
use crate::drivers::framebuffer::{Framebuffer, Panel, PAGE_COUNT};

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

const CONTROL_CMD: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;
const DATA_CHUNK: usize = 32;

// 128x64, internal charge pump, horizontal addressing.
const INIT_SEQUENCE: &[u8] = &[
    0xAE,       // display off
    0xD5, 0x80, // clock divide
    0xA8, 0x3F, // multiplex 64
    0xD3, 0x00, // display offset
    0x40,       // start line 0
    0x8D, 0x14, // charge pump on
    0x20, 0x00, // horizontal addressing
    0xA1,       // segment remap
    0xC8,       // COM scan descending
    0xDA, 0x12, // COM pins
    0x81, 0xCF, // contrast
    0xD9, 0xF1, // pre-charge
    0xDB, 0x40, // VCOMH
    0xA4,       // resume to RAM content
    0xA6,       // normal (not inverted)
    0xAF,       // display on
];

#[derive(Clone, Copy)]
pub struct Ssd1306 {
    bus: SharedBus,
}

impl Ssd1306 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    pub fn init(&mut self) -> anyhow::Result<()> {
        for cmd in INIT_SEQUENCE {
            self.command(&[*cmd])?;
        }
        log::info!("SSD1306 initialised ({}x{})", SCREEN_WIDTH, SCREEN_HEIGHT);
        Ok(())
    }

    /// Blank the panel before deep sleep.
    pub fn power_off(&mut self) -> anyhow::Result<()> {
        self.command(&[0xAE])
    }

    fn command(&mut self, cmd: &[u8]) -> anyhow::Result<()> {
        let mut frame = [0u8; 4];
        frame[0] = CONTROL_CMD;
        frame[1..=cmd.len()].copy_from_slice(cmd);
        let mut bus = self.bus.lock().unwrap_or_else(|p| p.into_inner());
        bus.write(I2C_ADDR_OLED, &frame[..=cmd.len()], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}

impl Panel for Ssd1306 {
    fn flush(&mut self, frame: &Framebuffer) -> anyhow::Result<()> {
        // Full-screen window: columns 0..127, pages 0..7.
        self.command(&[0x21, 0x00, (SCREEN_WIDTH - 1) as u8])?;
        self.command(&[0x22, 0x00, (PAGE_COUNT - 1) as u8])?;

        let mut packet = [0u8; DATA_CHUNK + 1];
        packet[0] = CONTROL_DATA;
        let mut bus = self.bus.lock().unwrap_or_else(|p| p.into_inner());
        for chunk in frame.as_bytes().chunks(DATA_CHUNK) {
            packet[1..=chunk.len()].copy_from_slice(chunk);
            bus.write(I2C_ADDR_OLED, &packet[..=chunk.len()], I2C_TIMEOUT_TICKS)?;
        }
        Ok(())
    }
}
