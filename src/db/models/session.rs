//! Recording session models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub identifier: String,
    pub start_time: DateTime<Utc>,
}

/// One row of the session browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub identifier: String,
    pub start_time: DateTime<Utc>,
    pub frame_count: u64,
    /// Relative timestamp of the last frame; zero for an empty session.
    pub duration_secs: f64,
    pub poi_count: u64,
    /// Distinct POI descriptions, comma separated. Empty when there are none.
    pub poi_descriptions: String,
    pub peak_energy: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Substring of the identifier, the start time, or any POI description.
    pub search: Option<String>,
    /// Sessions started on or after this day.
    pub since: Option<NaiveDate>,
    /// Minimum per-frame peak energy. Zero or less disables the filter.
    pub min_energy: i64,
}
