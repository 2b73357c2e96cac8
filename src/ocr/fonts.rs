//! Bitmap fonts used by the radio firmware.
//!
//! Each glyph is a list of column masks, left to right; bit `i` of a column
//! is row `i` counted from the top. Order matters: when two glyphs are
//! equally close to a cell, the one listed first wins.

use crate::models::framebuffer::Framebuffer;

#[derive(Debug)]
pub struct Font {
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    pub spacing: usize,
    pub glyphs: &'static [(char, &'static [u8])],
}

impl Font {
    /// Horizontal distance between the left edges of adjacent glyphs.
    pub fn step(&self) -> i32 {
        (self.width + self.spacing) as i32
    }

    pub fn cell_pixels(&self) -> usize {
        self.width * self.height
    }

    pub fn glyph(&self, ch: char) -> Option<&'static [u8]> {
        self.glyphs
            .iter()
            .find(|(candidate, _)| *candidate == ch)
            .map(|(_, columns)| *columns)
    }

    /// Renders `text` the way the firmware does, one glyph per step starting
    /// at `(x, y)`. Characters without a glyph leave their cell blank.
    pub fn draw(&self, fb: &mut Framebuffer, x: i32, y: i32, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            let Some(columns) = self.glyph(ch) else {
                continue;
            };
            let left = x + i as i32 * self.step();
            for (dx, column) in columns.iter().enumerate() {
                for row in 0..self.height {
                    if (column >> row) & 0x01 == 1 {
                        fb.set_pixel(left + dx as i32, y + row as i32, true);
                    }
                }
            }
        }
    }
}

/// 3x5 status-line font.
pub static SMALL_FONT: Font = Font {
    name: "small",
    width: 3,
    height: 5,
    spacing: 1,
    glyphs: &[
        ('0', &[0x1C, 0x11, 0x0F]),
        ('1', &[0x02, 0x1F, 0x00]),
        ('2', &[0x19, 0x15, 0x12]),
        ('3', &[0x11, 0x1D, 0x0A]),
        ('4', &[0x07, 0x04, 0x1F]),
        ('5', &[0x17, 0x15, 0x09]),
        ('6', &[0x1E, 0x15, 0x1D]),
        ('7', &[0x19, 0x05, 0x03]),
        ('8', &[0x1F, 0x15, 0x1F]),
        ('9', &[0x17, 0x15, 0x0F]),
        ('.', &[0x00, 0x10, 0x00]),
        ('-', &[0x04, 0x04, 0x04]),
        ('/', &[0x18, 0x04, 0x03]),
        ('F', &[0x1F, 0x05, 0x05]),
        ('A', &[0x1E, 0x05, 0x1E]),
        ('M', &[0x1F, 0x0C, 0x1F]),
        ('U', &[0x0F, 0x10, 0x1F]),
        ('S', &[0x12, 0x15, 0x09]),
        ('B', &[0x1F, 0x15, 0x0A]),
    ],
};

/// 6x7 frequency readout font.
pub static LARGE_FONT: Font = Font {
    name: "large",
    width: 6,
    height: 7,
    spacing: 1,
    glyphs: &[
        ('0', &[0x3E, 0x41, 0x41, 0x41, 0x41, 0x3E]),
        ('1', &[0x00, 0x40, 0x64, 0x7F, 0x40, 0x40]),
        ('2', &[0x62, 0x51, 0x51, 0x49, 0x49, 0x46]),
        ('3', &[0x22, 0x41, 0x49, 0x49, 0x49, 0x36]),
        ('4', &[0x18, 0x14, 0x0B, 0x39, 0x7F, 0x02]),
        ('5', &[0x27, 0x45, 0x65, 0x65, 0x65, 0x39]),
        ('6', &[0x3E, 0x4B, 0x49, 0x49, 0x49, 0x32]),
        ('7', &[0x11, 0x11, 0x79, 0x05, 0x03, 0x01]),
        ('8', &[0x36, 0x49, 0x49, 0x49, 0x49, 0x36]),
        ('9', &[0x46, 0x49, 0x49, 0x49, 0x29, 0x1E]),
        ('.', &[0x00, 0x00, 0x60, 0x60, 0x00, 0x00]),
    ],
};
