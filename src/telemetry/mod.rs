pub mod extractor;
pub mod frequency;
pub mod zones;

pub use extractor::{
    energy_sum, is_spectrum_active, spectrum_histogram, Frame, Telemetry, TelemetryExtractor,
    NOT_AVAILABLE,
};
pub use frequency::{parse_mhz, FrequencySpan};
pub use zones::{Field, Zone};
