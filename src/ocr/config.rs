use serde::{Deserialize, Serialize};

/// Tunables for glyph matching. Both thresholds were tuned against real
/// device screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    /// Largest accepted Hamming distance, as a fraction of the cell's pixel count.
    pub max_mismatch_ratio: f64,

    /// Glyph that anchors the anchored scan (the decimal point).
    pub anchor_char: char,

    /// Limits the anchor search to window positions within this many pixels of
    /// the region's horizontal centre. `None` searches the whole region.
    pub anchor_search_radius: Option<i32>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            max_mismatch_ratio: 0.35,
            anchor_char: '.',
            anchor_search_radius: None,
        }
    }
}
