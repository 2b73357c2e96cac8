use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use log::warn;
use uuid::Uuid;

use super::rate::RateLimiter;
use super::writer::{RecordingWriter, WriterStats};
use crate::db::models::{NewRecordedFrame, Session};
use crate::settings::RecordingSettings;
use crate::telemetry::Frame;

/// `rec_YYYYMMDD_HHMMSS_` plus eight hex digits, so sessions started within
/// the same second stay distinct.
pub fn new_session_identifier() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("rec_{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

struct ActiveSession {
    writer: RecordingWriter,
    started: Instant,
    limiter: RateLimiter,
}

/// Owns at most one recording session at a time.
pub struct SessionRecorder {
    db_path: PathBuf,
    settings: RecordingSettings,
    active: Option<ActiveSession>,
}

impl SessionRecorder {
    pub fn new(db_path: PathBuf, settings: RecordingSettings) -> Self {
        Self {
            db_path,
            settings,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| active.writer.session())
    }

    pub fn start(&mut self, now: Instant) -> Result<&Session> {
        if self.active.is_some() {
            bail!("recording session already active");
        }

        let identifier = new_session_identifier();
        let writer = RecordingWriter::start(
            &self.db_path,
            &identifier,
            Utc::now(),
            self.settings.writer_batch_timeout(),
        )?;

        let active = self.active.insert(ActiveSession {
            writer,
            started: now,
            limiter: RateLimiter::new(self.settings.interval()),
        });
        Ok(active.writer.session())
    }

    /// Queues `frame` if the rate limiter lets it through. Returns whether it
    /// was queued.
    pub fn record(&mut self, frame: &Frame, now: Instant) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if !active.limiter.admit(now) {
            return false;
        }

        let timestamp = now.saturating_duration_since(active.started).as_secs_f64();
        if active
            .writer
            .submit(NewRecordedFrame::from_frame(frame, timestamp))
        {
            true
        } else {
            warn!("Recording writer is gone; frame dropped");
            false
        }
    }

    /// Stops the active session, if any, and returns its identifier with the
    /// writer's totals (`None` when the writer missed its join deadline).
    pub fn stop(&mut self) -> Option<(String, Option<WriterStats>)> {
        let active = self.active.take()?;
        let identifier = active.writer.session().identifier.clone();
        let stats = active.writer.stop(self.settings.writer_join_timeout());
        Some((identifier, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique_and_well_formed() {
        let a = new_session_identifier();
        let b = new_session_identifier();
        assert_ne!(a, b);
        assert!(a.starts_with("rec_"));
        // rec_ + 8 date + _ + 6 time + _ + 8 hex
        assert_eq!(a.len(), 4 + 8 + 1 + 6 + 1 + 8);
        assert!(a[a.len() - 8..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
