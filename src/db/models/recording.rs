use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{energy_sum, Frame, Telemetry};

/// A frame queued for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecordedFrame {
    /// Seconds since the session started.
    pub timestamp_secs: f64,
    pub histogram: Vec<u32>,
    pub telemetry: Telemetry,
    pub energy_sum: u64,
}

impl NewRecordedFrame {
    /// The energy sum is always derived from the histogram.
    pub fn new(timestamp_secs: f64, histogram: Vec<u32>, telemetry: Telemetry) -> Self {
        let energy_sum = energy_sum(&histogram);
        Self {
            timestamp_secs,
            histogram,
            telemetry,
            energy_sum,
        }
    }

    pub fn from_frame(frame: &Frame, timestamp_secs: f64) -> Self {
        Self::new(
            timestamp_secs,
            frame.histogram.clone(),
            frame.telemetry.clone().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub id: i64,
    pub session_id: i64,
    pub timestamp_secs: f64,
    pub histogram: Vec<u32>,
    pub telemetry: Telemetry,
    pub energy_sum: u64,
}

impl RecordedFrame {
    /// Wall-clock time of the frame given its session's start.
    pub fn absolute_time(&self, session_start: DateTime<Utc>) -> DateTime<Utc> {
        session_start + Duration::microseconds((self.timestamp_secs * 1_000_000.0).round() as i64)
    }
}
