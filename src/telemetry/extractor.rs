use serde::{Deserialize, Serialize};

use super::zones::Field;
use crate::models::framebuffer::{Framebuffer, WIDTH};
use crate::ocr::config::OcrConfig;
use crate::ocr::recognizer::GlyphRecognizer;

pub const NOT_AVAILABLE: &str = "N/A";

/// Row that is fully lit while the spectrum analyser is on screen.
pub const SPECTRUM_BASELINE_ROW: i32 = 48;
/// First row of the spectrum plot.
pub const SPECTRUM_TOP_ROW: i32 = 20;

/// OCR'd readouts of one frame. Missing values are [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub center_freq: String,
    pub start_freq: String,
    pub end_freq: String,
    pub impedance_low: String,
    pub impedance_high: String,
    pub bars: String,
    pub step: String,
    pub modulation: String,
    pub bandwidth: String,
}

impl Default for Telemetry {
    fn default() -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            center_freq: na(),
            start_freq: na(),
            end_freq: na(),
            impedance_low: na(),
            impedance_high: na(),
            bars: na(),
            step: na(),
            modulation: na(),
            bandwidth: na(),
        }
    }
}

/// One decoded framebuffer plus everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub framebuffer: Framebuffer,
    pub spectrum_active: bool,
    /// Only extracted while the spectrum analyser is showing.
    pub telemetry: Option<Telemetry>,
    pub histogram: Vec<u32>,
    pub energy_sum: u64,
}

pub fn is_spectrum_active(fb: &Framebuffer) -> bool {
    (0..WIDTH as i32).all(|x| fb.is_lit(x, SPECTRUM_BASELINE_ROW))
}

/// Lit-pixel count per column between the top row and the baseline,
/// inclusive. Even columns lose one count when non-zero; stored energies
/// depend on this correction.
pub fn spectrum_histogram(fb: &Framebuffer) -> Vec<u32> {
    (0..WIDTH as i32)
        .map(|x| {
            let height = (SPECTRUM_TOP_ROW..=SPECTRUM_BASELINE_ROW)
                .filter(|&y| fb.is_lit(x, y))
                .count() as u32;
            if x % 2 == 0 {
                height.saturating_sub(1)
            } else {
                height
            }
        })
        .collect()
}

pub fn energy_sum(histogram: &[u32]) -> u64 {
    histogram.iter().map(|&h| u64::from(h)).sum()
}

pub struct TelemetryExtractor {
    config: OcrConfig,
}

impl TelemetryExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn read_field(&self, fb: &Framebuffer, field: Field) -> String {
        let zone = field.zone();
        GlyphRecognizer::new(zone.font, &self.config).recognize(fb, zone.area, zone.strategy)
    }

    pub fn read_telemetry(&self, fb: &Framebuffer) -> Telemetry {
        let (impedance_low, impedance_high) =
            split_impedance(&self.read_field(fb, Field::Impedance));

        Telemetry {
            center_freq: self.read_field(fb, Field::CenterFrequency),
            start_freq: self.read_field(fb, Field::StartFrequency),
            end_freq: self.read_field(fb, Field::EndFrequency),
            impedance_low,
            impedance_high,
            bars: format_bars(&self.read_field(fb, Field::Bars)),
            step: format_step(&self.read_field(fb, Field::Step)),
            modulation: self.read_field(fb, Field::Modulation),
            bandwidth: self.read_field(fb, Field::Bandwidth),
        }
    }

    pub fn extract(&self, framebuffer: Framebuffer) -> Frame {
        let spectrum_active = is_spectrum_active(&framebuffer);
        let histogram = spectrum_histogram(&framebuffer);
        let energy_sum = energy_sum(&histogram);
        let telemetry = spectrum_active.then(|| self.read_telemetry(&framebuffer));

        Frame {
            framebuffer,
            spectrum_active,
            telemetry,
            histogram,
            energy_sum,
        }
    }
}

fn or_not_available(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text.to_string()
    }
}

fn split_impedance(raw: &str) -> (String, String) {
    let mut parts = raw.split('/');
    match (parts.next(), parts.next()) {
        (Some(low), Some(high)) => (or_not_available(low), or_not_available(high)),
        _ => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    }
}

/// The last digit of the bars readout is replaced by the multiplier sign.
fn format_bars(raw: &str) -> String {
    let raw = raw.trim();
    match raw.chars().last() {
        None => NOT_AVAILABLE.to_string(),
        Some(last) if raw.chars().count() > 1 && last.is_ascii_digit() => {
            format!("{}x", &raw[..raw.len() - last.len_utf8()])
        }
        Some(_) => format!("{raw}x"),
    }
}

fn format_step(raw: &str) -> String {
    let raw = raw.trim();
    match raw.chars().last() {
        None => NOT_AVAILABLE.to_string(),
        Some(last) if raw.chars().count() > 1 && last.eq_ignore_ascii_case(&'k') => {
            format!("{}k", &raw[..raw.len() - last.len_utf8()])
        }
        Some(_) => format!("{raw}k"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::fonts::{LARGE_FONT, SMALL_FONT};

    fn spectrum_screen() -> Framebuffer {
        let mut fb = Framebuffer::new();
        for x in 0..WIDTH as i32 {
            fb.set_pixel(x, SPECTRUM_BASELINE_ROW, true);
        }
        fb
    }

    #[test]
    fn active_requires_full_baseline() {
        let mut fb = spectrum_screen();
        assert!(is_spectrum_active(&fb));
        fb.set_pixel(127, SPECTRUM_BASELINE_ROW, false);
        assert!(!is_spectrum_active(&fb));
    }

    #[test]
    fn histogram_applies_even_column_correction() {
        let mut fb = spectrum_screen();
        // Column 3: baseline plus four more rows.
        for y in 44..48 {
            fb.set_pixel(3, y, true);
        }
        // Rows outside the plot are ignored.
        fb.set_pixel(5, SPECTRUM_TOP_ROW - 1, true);

        let histogram = spectrum_histogram(&fb);
        assert_eq!(histogram.len(), WIDTH);
        assert_eq!(histogram[0], 0);
        assert_eq!(histogram[1], 1);
        assert_eq!(histogram[3], 5);
        assert_eq!(histogram[5], 1);
        // 64 odd columns at 1, plus 4 extra in column 3.
        assert_eq!(energy_sum(&histogram), 68);
    }

    #[test]
    fn empty_column_is_not_decremented_below_zero() {
        let histogram = spectrum_histogram(&Framebuffer::new());
        assert!(histogram.iter().all(|&h| h == 0));
    }

    #[test]
    fn inactive_frame_skips_ocr() {
        let extractor = TelemetryExtractor::new(OcrConfig::default());
        let frame = extractor.extract(Framebuffer::new());
        assert!(!frame.spectrum_active);
        assert!(frame.telemetry.is_none());
        assert_eq!(frame.energy_sum, 0);
    }

    #[test]
    fn reads_every_zone() {
        let mut fb = spectrum_screen();
        LARGE_FONT.draw(&mut fb, 38, 8, "145.525");
        SMALL_FONT.draw(&mut fb, 0, 57, "145.0");
        SMALL_FONT.draw(&mut fb, 93, 57, "146.0");
        SMALL_FONT.draw(&mut fb, 0, 1, "50/100");
        SMALL_FONT.draw(&mut fb, 0, 9, "16");
        SMALL_FONT.draw(&mut fb, 0, 15, "12.5");
        SMALL_FONT.draw(&mut fb, 120, 9, "FM");
        SMALL_FONT.draw(&mut fb, 124, 15, "U");

        let extractor = TelemetryExtractor::new(OcrConfig::default());
        let frame = extractor.extract(fb);
        let telemetry = frame.telemetry.expect("spectrum is active");

        assert_eq!(telemetry.center_freq, "145.525");
        assert_eq!(telemetry.start_freq, "145.0");
        assert_eq!(telemetry.end_freq, "146.0");
        assert_eq!(telemetry.impedance_low, "50");
        assert_eq!(telemetry.impedance_high, "100");
        assert_eq!(telemetry.bars, "1x");
        assert_eq!(telemetry.step, "12.5k");
        assert_eq!(telemetry.modulation, "FM");
        assert_eq!(telemetry.bandwidth, "U");
    }

    #[test]
    fn impedance_without_separator_is_unavailable() {
        assert_eq!(split_impedance("50"), ("N/A".into(), "N/A".into()));
        assert_eq!(split_impedance("/100"), ("N/A".into(), "100".into()));
        assert_eq!(split_impedance("50/"), ("50".into(), "N/A".into()));
    }

    #[test]
    fn bars_and_step_formatting() {
        assert_eq!(format_bars(""), "N/A");
        assert_eq!(format_bars("4"), "4x");
        assert_eq!(format_bars("16"), "1x");
        assert_eq!(format_bars("1?"), "1?x");
        assert_eq!(format_step(""), "N/A");
        assert_eq!(format_step("k"), "kk");
        assert_eq!(format_step("6.25K"), "6.25k");
        assert_eq!(format_step("25"), "25k");
    }
}
