//! Numeric views over OCR'd frequency readouts.

use super::extractor::Telemetry;

/// Parses an OCR'd number. Anything short of a clean decimal, including a
/// partially recognised readout, is unknown.
pub fn parse_mhz(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Telemetry {
    pub fn center_frequency_mhz(&self) -> Option<f64> {
        parse_mhz(&self.center_freq)
    }
}

/// Frequency range covered by the spectrum plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySpan {
    pub start_mhz: f64,
    pub end_mhz: f64,
}

impl FrequencySpan {
    /// `None` unless both edges parse and the span is positive.
    pub fn from_telemetry(telemetry: &Telemetry) -> Option<Self> {
        let start_mhz = parse_mhz(&telemetry.start_freq)?;
        let end_mhz = parse_mhz(&telemetry.end_freq)?;
        (end_mhz > start_mhz).then_some(Self { start_mhz, end_mhz })
    }

    pub fn width_mhz(&self) -> f64 {
        self.end_mhz - self.start_mhz
    }

    /// Frequency at a horizontal position given as a ratio of the plot width.
    pub fn frequency_at(&self, ratio: f64) -> f64 {
        self.start_mhz + ratio.clamp(0.0, 1.0) * self.width_mhz()
    }

    /// Frequency at the centre of the first tallest histogram bin.
    pub fn peak_frequency(&self, histogram: &[u32]) -> Option<f64> {
        let peak = *histogram.iter().max()?;
        if peak == 0 {
            return None;
        }
        let index = histogram.iter().position(|&h| h == peak)?;
        let ratio = (index as f64 + 0.5) / histogram.len() as f64;
        Some(self.start_mhz + ratio * self.width_mhz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(center: &str, start: &str, end: &str) -> Telemetry {
        Telemetry {
            center_freq: center.into(),
            start_freq: start.into(),
            end_freq: end.into(),
            ..Telemetry::default()
        }
    }

    #[test]
    fn partial_readouts_are_unknown() {
        assert_eq!(parse_mhz("145.525"), Some(145.525));
        assert_eq!(parse_mhz("14?.525"), None);
        assert_eq!(parse_mhz("N/A"), None);
        assert_eq!(parse_mhz(""), None);
        assert_eq!(parse_mhz("."), None);

        assert_eq!(telemetry("439.125", "", "").center_frequency_mhz(), Some(439.125));
        assert_eq!(telemetry("43?.125", "", "").center_frequency_mhz(), None);
    }

    #[test]
    fn span_requires_both_edges() {
        assert!(FrequencySpan::from_telemetry(&telemetry("", "145.0", "?")).is_none());
        assert!(FrequencySpan::from_telemetry(&telemetry("", "146.0", "145.0")).is_none());
        let span = FrequencySpan::from_telemetry(&telemetry("", "145.0", "147.0")).unwrap();
        assert_eq!(span.frequency_at(0.25), 145.5);
        assert_eq!(span.frequency_at(2.0), 147.0);
    }

    #[test]
    fn peak_uses_first_maximum_bin_centre() {
        let span = FrequencySpan {
            start_mhz: 100.0,
            end_mhz: 104.0,
        };
        assert_eq!(span.peak_frequency(&[0, 3, 1, 3]), Some(101.5));
        assert_eq!(span.peak_frequency(&[0, 0]), None);
        assert_eq!(span.peak_frequency(&[]), None);
    }
}
