use std::{
    fs,
    path::PathBuf,
    sync::RwLock,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::ocr::OcrConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path such as `/dev/ttyUSB0` or `COM5`. `None` means "not chosen yet".
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 38_400,
            read_timeout_ms: 500,
        }
    }
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingSettings {
    /// Minimum spacing between persisted frames. `0` persists every frame.
    pub interval_secs: f64,
    /// How long the writer waits for the first item of a batch.
    pub writer_batch_timeout_ms: u64,
    pub writer_join_timeout_ms: u64,
    pub reader_join_timeout_ms: u64,
    /// Number of recent histograms kept for live waterfall consumers.
    pub history_len: usize,
    /// When set, the frame that opens a session is exported here as PNG.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            writer_batch_timeout_ms: 500,
            writer_join_timeout_ms: 2_000,
            reader_join_timeout_ms: 1_000,
            history_len: 60,
            snapshot_dir: None,
        }
    }
}

const DEFAULT_INTERVAL_SECS: f64 = 1.0;

impl RecordingSettings {
    /// `None` persists every frame. Values no `Duration` can hold (negative,
    /// NaN, overflowing) fall back to the default interval.
    pub fn interval(&self) -> Option<Duration> {
        if self.interval_secs == 0.0 {
            return None;
        }
        match Duration::try_from_secs_f64(self.interval_secs) {
            Ok(interval) => Some(interval),
            Err(err) => {
                warn!(
                    "Ignoring recording interval {}: {err}; using {DEFAULT_INTERVAL_SECS}s",
                    self.interval_secs
                );
                Some(Duration::from_secs_f64(DEFAULT_INTERVAL_SECS))
            }
        }
    }

    pub fn writer_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.writer_batch_timeout_ms)
    }

    pub fn writer_join_timeout(&self) -> Duration {
        Duration::from_millis(self.writer_join_timeout_ms)
    }

    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplaySettings {
    pub buffer_size: usize,
    pub fetch_chunk_size: usize,
    pub speed_options: Vec<u32>,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            buffer_size: 2_000,
            fetch_chunk_size: 1_000,
            speed_options: vec![1, 2, 4, 8, 16],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerSettings {
    pub serial: SerialSettings,
    pub recording: RecordingSettings,
    pub replay: ReplaySettings,
    pub ocr: OcrConfig,
    pub database_path: PathBuf,
    pub log_level: String,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            recording: RecordingSettings::default(),
            replay: ReplaySettings::default(),
            ocr: OcrConfig::default(),
            database_path: PathBuf::from("viewer_recordings.db"),
            log_level: "info".into(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ViewerSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, falling back to defaults when the file is
    /// unreadable as JSON. A missing file is created with the defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            let store = Self {
                path,
                data: RwLock::new(ViewerSettings::default()),
            };
            if let Err(err) = store.persist(&ViewerSettings::default()) {
                warn!("Settings not saved: {err:#}; using defaults");
            }
            return Ok(store);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let data = serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(
                "Ignoring malformed settings in {}: {err}; using defaults",
                path.display()
            );
            ViewerSettings::default()
        });

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> Result<ViewerSettings> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn persist(&self, data: &ViewerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
