use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPointOfInterest {
    pub recording_id: i64,
    pub frequency_mhz: f64,
    pub description: String,
    pub absolute_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: i64,
    pub recording_id: i64,
    pub frequency_mhz: f64,
    pub description: String,
    pub absolute_timestamp: DateTime<Utc>,
}

/// A marker placed on the replay timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPointOfInterest {
    /// Position of the marked frame in the session's timestamp order.
    pub frame_index: u64,
    pub point: PointOfInterest,
}
