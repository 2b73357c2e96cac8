//! Monochrome display raster mirrored from the radio.
//!
//! The device display is 128x64 pixels, one bit per pixel, packed LSB-first:
//! pixel `(x, y)` is bit `(y * 128 + x) % 8` of byte `(y * 128 + x) / 8`.
//! Diff frames patch the raster in 8-byte blocks, so the buffer is also
//! addressed as 128 consecutive blocks.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma};

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 64;
pub const FRAME_SIZE: usize = WIDTH * HEIGHT / 8;
pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_COUNT: usize = FRAME_SIZE / BLOCK_SIZE;
/// One index byte followed by one block of data.
pub const DIFF_BLOCK_LEN: usize = 1 + BLOCK_SIZE;

/// Axis-aligned pixel rectangle on the display.
///
/// Coordinates are signed so scans can step past the left edge without
/// wrapping; anything outside the raster reads as unlit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// A full display snapshot. Not `Copy`; holders clone explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    bytes: [u8; FRAME_SIZE],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// All pixels unlit.
    pub fn new() -> Self {
        Self {
            bytes: [0u8; FRAME_SIZE],
        }
    }

    /// Builds a framebuffer from a raw screenshot payload.
    /// Returns `None` unless `raw` is exactly [`FRAME_SIZE`] bytes.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let bytes: [u8; FRAME_SIZE] = raw.try_into().ok()?;
        Some(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    pub fn is_lit(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= WIDTH || y as usize >= HEIGHT {
            return false;
        }
        let bit = y as usize * WIDTH + x as usize;
        (self.bytes[bit / 8] >> (bit % 8)) & 0x01 == 1
    }

    /// Sets or clears a single pixel. Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, lit: bool) {
        if x < 0 || y < 0 || x as usize >= WIDTH || y as usize >= HEIGHT {
            return;
        }
        let bit = y as usize * WIDTH + x as usize;
        let mask = 1u8 << (bit % 8);
        if lit {
            self.bytes[bit / 8] |= mask;
        } else {
            self.bytes[bit / 8] &= !mask;
        }
    }

    pub fn lit_count(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Overwrites blocks in place from a diff payload and returns how many
    /// blocks were written.
    ///
    /// The walk stops at the first index outside `0..BLOCK_COUNT`; that is a
    /// short diff, not an error. A trailing partial block is ignored.
    pub fn apply_diff(&mut self, payload: &[u8]) -> usize {
        let mut applied = 0;
        for chunk in payload.chunks_exact(DIFF_BLOCK_LEN) {
            let index = chunk[0] as usize;
            if index >= BLOCK_COUNT {
                break;
            }
            let start = index * BLOCK_SIZE;
            self.bytes[start..start + BLOCK_SIZE].copy_from_slice(&chunk[1..]);
            applied += 1;
        }
        applied
    }

    /// Copy-on-write variant of [`Framebuffer::apply_diff`].
    pub fn with_diff(&self, payload: &[u8]) -> Self {
        let mut next = self.clone();
        next.apply_diff(payload);
        next
    }

    /// Renders the raster as an 8-bit grayscale image, lit pixels white.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| {
            if self.is_lit(x as i32, y as i32) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_image()
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write framebuffer snapshot {}", path.display()))
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("lit_pixels", &self.lit_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_addressing_is_lsb_first() {
        let mut fb = Framebuffer::new();
        fb.set_pixel(1, 0, true);
        assert_eq!(fb.as_bytes()[0], 0b0000_0010);

        fb.set_pixel(0, 1, true);
        assert_eq!(fb.as_bytes()[WIDTH / 8], 0b0000_0001);
        assert!(fb.is_lit(0, 1));
        assert!(!fb.is_lit(-1, 1));
        assert!(!fb.is_lit(WIDTH as i32, 0));
    }

    #[test]
    fn diff_overwrites_first_block() {
        let mut fb = Framebuffer::new();
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0xFF; 8]);

        assert_eq!(fb.apply_diff(&payload), 1);
        assert_eq!(&fb.as_bytes()[..8], &[0xFF; 8]);
        assert!(fb.as_bytes()[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn diff_is_idempotent() {
        let mut payload = Vec::new();
        for (index, fill) in [(3u8, 0xA5u8), (127, 0x0F), (3, 0x5A)] {
            payload.push(index);
            payload.extend_from_slice(&[fill; 8]);
        }

        let once = Framebuffer::new().with_diff(&payload);
        let twice = once.with_diff(&payload);
        assert_eq!(once, twice);
        assert_eq!(&once.as_bytes()[24..32], &[0x5A; 8]);
    }

    #[test]
    fn out_of_range_index_ends_diff_walk() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0x11; 8]);
        payload.push(BLOCK_COUNT as u8);
        payload.extend_from_slice(&[0x22; 8]);
        payload.push(0x01);
        payload.extend_from_slice(&[0x33; 8]);

        let mut fb = Framebuffer::new();
        assert_eq!(fb.apply_diff(&payload), 1);
        assert_eq!(&fb.as_bytes()[..8], &[0x11; 8]);
        assert_eq!(&fb.as_bytes()[8..16], &[0x00; 8]);
    }

    #[test]
    fn with_diff_leaves_original_untouched() {
        let original = Framebuffer::new();
        let mut payload = vec![0x05];
        payload.extend_from_slice(&[0xFF; 8]);

        let patched = original.with_diff(&payload);
        assert_eq!(original.lit_count(), 0);
        assert_eq!(patched.lit_count(), 64);
    }

    #[test]
    fn image_matches_lit_pixels() {
        let mut fb = Framebuffer::new();
        fb.set_pixel(10, 20, true);
        let img = fb.to_image();
        assert_eq!(img.dimensions(), (WIDTH as u32, HEIGHT as u32));
        assert_eq!(img.get_pixel(10, 20).0, [255]);
        assert_eq!(img.get_pixel(11, 20).0, [0]);
    }
}
