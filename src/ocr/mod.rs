pub mod config;
pub mod fonts;
pub mod recognizer;

pub use config::OcrConfig;
pub use fonts::{Font, LARGE_FONT, SMALL_FONT};
pub use recognizer::{GlyphRecognizer, ScanStrategy, BLANK_CHAR, UNKNOWN_CHAR};
