use serde::{Deserialize, Serialize};

use super::config::OcrConfig;
use super::fonts::Font;
use crate::models::framebuffer::{Framebuffer, Rect};

/// Emitted for a non-blank cell no glyph is close enough to.
pub const UNKNOWN_CHAR: char = '?';
/// Emitted for a cell with no lit pixels.
pub const BLANK_CHAR: char = ' ';

/// How a region is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Fixed grid from the left edge.
    LeftToRight,
    /// Fixed grid from the right edge, for right-aligned text.
    RightToLeft,
    /// Tries every grid offset and keeps the one with the most recognised glyphs.
    Centered,
    /// Locates the anchor glyph at pixel precision and reads outward from it.
    Anchored,
}

/// Column masks of one glyph-sized window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    columns: Vec<u8>,
}

impl Cell {
    pub fn columns(&self) -> &[u8] {
        &self.columns
    }

    pub fn is_blank(&self) -> bool {
        self.columns.iter().all(|&c| c == 0)
    }

    /// Hamming distance to a glyph, column by column.
    pub fn distance(&self, glyph: &[u8]) -> u32 {
        self.columns
            .iter()
            .zip(glyph)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Matches framebuffer windows against one font.
pub struct GlyphRecognizer<'a> {
    font: &'a Font,
    config: &'a OcrConfig,
}

impl<'a> GlyphRecognizer<'a> {
    pub fn new(font: &'a Font, config: &'a OcrConfig) -> Self {
        Self { font, config }
    }

    pub fn font(&self) -> &Font {
        self.font
    }

    /// Largest distance still accepted as a match.
    pub fn max_distance(&self) -> f64 {
        self.font.cell_pixels() as f64 * self.config.max_mismatch_ratio
    }

    pub fn read_cell(&self, fb: &Framebuffer, x: i32, y: i32) -> Cell {
        let columns = (0..self.font.width as i32)
            .map(|dx| {
                (0..self.font.height as i32).fold(0u8, |mask, row| {
                    if fb.is_lit(x + dx, y + row) {
                        mask | (1 << row)
                    } else {
                        mask
                    }
                })
            })
            .collect();
        Cell { columns }
    }

    /// Closest glyph and its distance. Ties go to the glyph listed first.
    pub fn best_match(&self, cell: &Cell) -> Option<(char, u32)> {
        let mut best: Option<(char, u32)> = None;
        for (ch, glyph) in self.font.glyphs {
            let distance = cell.distance(glyph);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((*ch, distance));
            }
        }
        best
    }

    /// Blank cells are a space without consulting the dictionary.
    pub fn classify(&self, cell: &Cell) -> char {
        if cell.is_blank() {
            return BLANK_CHAR;
        }
        match self.best_match(cell) {
            Some((ch, distance)) if distance as f64 <= self.max_distance() => ch,
            _ => UNKNOWN_CHAR,
        }
    }

    pub fn match_at(&self, fb: &Framebuffer, x: i32, y: i32) -> char {
        self.classify(&self.read_cell(fb, x, y))
    }

    /// Reads the text in `area`. The result is trimmed of surrounding spaces.
    pub fn recognize(&self, fb: &Framebuffer, area: Rect, strategy: ScanStrategy) -> String {
        let text = match strategy {
            ScanStrategy::LeftToRight => self.scan_left_to_right(fb, area, 0),
            ScanStrategy::RightToLeft => self.scan_right_to_left(fb, area),
            ScanStrategy::Centered => self.scan_centered(fb, area),
            ScanStrategy::Anchored => self.scan_anchored(fb, area),
        };
        text.trim().to_string()
    }

    fn scan_left_to_right(&self, fb: &Framebuffer, area: Rect, offset: i32) -> String {
        let width = self.font.width as i32;
        let mut text = String::new();
        let mut x = area.left() + offset;
        while x + width <= area.right() {
            text.push(self.match_at(fb, x, area.top()));
            x += self.font.step();
        }
        text
    }

    fn scan_right_to_left(&self, fb: &Framebuffer, area: Rect) -> String {
        let mut reversed = Vec::new();
        let mut x = area.right() - self.font.width as i32;
        while x >= area.left() {
            reversed.push(self.match_at(fb, x, area.top()));
            x -= self.font.step();
        }
        reversed.into_iter().rev().collect()
    }

    fn scan_centered(&self, fb: &Framebuffer, area: Rect) -> String {
        let mut best = String::new();
        let mut best_score: Option<usize> = None;
        for offset in 0..self.font.step() {
            let candidate = self.scan_left_to_right(fb, area, offset);
            let score = candidate
                .chars()
                .filter(|&c| c != UNKNOWN_CHAR && c != BLANK_CHAR)
                .count();
            if best_score.map_or(true, |s| score > s) {
                best_score = Some(score);
                best = candidate;
            }
        }
        best
    }

    fn scan_anchored(&self, fb: &Framebuffer, area: Rect) -> String {
        let Some(anchor_x) = self.find_anchor(fb, area) else {
            return self.scan_centered(fb, area);
        };

        let width = self.font.width as i32;
        let step = self.font.step();
        let top = area.top();

        let mut before = Vec::new();
        let mut x = anchor_x - step;
        while x >= area.left() {
            let ch = self.match_at(fb, x, top);
            if ch == BLANK_CHAR {
                break;
            }
            before.push(ch);
            x -= step;
        }

        let mut after = String::new();
        let mut x = anchor_x + step;
        while x + width <= area.right() {
            let ch = self.match_at(fb, x, top);
            if ch == BLANK_CHAR {
                break;
            }
            after.push(ch);
            x += step;
        }

        let mut text: String = before.into_iter().rev().collect();
        text.push(self.config.anchor_char);
        text.push_str(&after);
        text
    }

    /// Pixel-precise search for the anchor glyph. Returns `None` when the font
    /// lacks the anchor or the closest window is beyond the match threshold.
    fn find_anchor(&self, fb: &Framebuffer, area: Rect) -> Option<i32> {
        let anchor = self.font.glyph(self.config.anchor_char)?;
        let width = self.font.width as i32;

        let mut from = area.left();
        let mut to = area.right() - width;
        if let Some(radius) = self.config.anchor_search_radius {
            let centre = area.left() + (area.width - width) / 2;
            from = from.max(centre - radius);
            to = to.min(centre + radius);
        }

        let mut best: Option<(i32, u32)> = None;
        for x in from..=to {
            let cell = self.read_cell(fb, x, area.top());
            if cell.is_blank() {
                continue;
            }
            let distance = cell.distance(anchor);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((x, distance));
            }
        }

        match best {
            Some((x, distance)) if distance as f64 <= self.max_distance() => Some(x),
            _ => None,
        }
    }
}
