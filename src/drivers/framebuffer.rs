// WheelSense — 1-bpp framebuffer
//
// Laid out the way the SSD1306 expects it: 8 pages of 128 bytes, one byte per
// column, LSB at the top of the page.  The UI task draws into it with
// embedded-graphics and hands it to a `Panel` to push out.

use embedded_graphics::{
    geometry::{OriginDimensions, Size},
    pixelcolor::BinaryColor,
    prelude::*,
};

use crate::config::{DISPLAY_BUFFER_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};

pub const PAGE_COUNT: usize = SCREEN_HEIGHT as usize / 8;

pub struct Framebuffer {
    buf: [u8; DISPLAY_BUFFER_SIZE],
}

impl Framebuffer {
    pub fn new() -> Self {
        Self { buf: [0; DISPLAY_BUFFER_SIZE] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// One page (8 pixel rows) of column bytes.
    pub fn page(&self, page: usize) -> &[u8] {
        let width = SCREEN_WIDTH as usize;
        &self.buf[page * width..(page + 1) * width]
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return false;
        }
        let idx = x as usize + (y as usize / 8) * SCREEN_WIDTH as usize;
        self.buf[idx] & (1 << (y % 8)) != 0
    }

    pub fn lit_pixels(&self) -> u32 {
        self.buf.iter().map(|b| b.count_ones()).sum()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for Framebuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = SCREEN_WIDTH as i32;
        let h = SCREEN_HEIGHT as i32;

        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.x >= w || coord.y < 0 || coord.y >= h {
                continue;
            }
            let idx = coord.x as usize + (coord.y as usize / 8) * SCREEN_WIDTH as usize;
            let bit = 1u8 << (coord.y % 8);
            match color {
                BinaryColor::On => self.buf[idx] |= bit,
                BinaryColor::Off => self.buf[idx] &= !bit,
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0xFF,
            BinaryColor::Off => 0x00,
        };
        self.buf.fill(fill);
        Ok(())
    }
}

/// Something that can show a finished frame.
pub trait Panel {
    fn flush(&mut self, frame: &Framebuffer) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_land_in_page_layout() {
        let mut fb = Framebuffer::new();
        fb.draw_iter([Pixel(Point::new(3, 10), BinaryColor::On)]).unwrap();
        assert!(fb.pixel(3, 10));
        assert_eq!(fb.page(1)[3], 0b0000_0100);
        assert_eq!(fb.lit_pixels(), 1);
    }

    #[test]
    fn out_of_bounds_pixels_are_clipped() {
        let mut fb = Framebuffer::new();
        fb.draw_iter([
            Pixel(Point::new(-1, 0), BinaryColor::On),
            Pixel(Point::new(128, 0), BinaryColor::On),
            Pixel(Point::new(0, 64), BinaryColor::On),
        ])
        .unwrap();
        assert_eq!(fb.lit_pixels(), 0);
    }

    #[test]
    fn clear_fills_every_byte() {
        let mut fb = Framebuffer::new();
        fb.clear(BinaryColor::On).unwrap();
        assert_eq!(fb.lit_pixels(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert_eq!(fb.as_bytes().len(), PAGE_COUNT * SCREEN_WIDTH as usize);
    }
}
