use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::{error, info, warn};

use super::reader::{spawn_reader, Arrival, ReaderExit, ReaderHandle};
use super::recorder::SessionRecorder;
use crate::db::models::Session;
use crate::models::framebuffer::Framebuffer;
use crate::settings::{RecordingSettings, ViewerSettings};
use crate::telemetry::{Frame, TelemetryExtractor};

/// What one orchestrator tick did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub frames_processed: usize,
    pub frames_queued: usize,
    pub sessions_started: Vec<String>,
    pub sessions_stopped: Vec<String>,
    /// Set when the link failed and the connection was torn down.
    pub link_error: Option<String>,
}

struct LiveLink {
    inbound: Receiver<Arrival>,
    reader: ReaderHandle,
}

/// Live side of the viewer: drains the reader's queue, extracts telemetry,
/// and drives recording sessions off spectrum-active transitions.
pub struct AcquisitionPipeline {
    extractor: TelemetryExtractor,
    recorder: SessionRecorder,
    settings: RecordingSettings,
    link: Option<LiveLink>,
    spectrum_active: bool,
    latest: Option<Frame>,
    last_frame_at: Option<Instant>,
    latency: Option<Duration>,
    history: VecDeque<Vec<u32>>,
}

impl AcquisitionPipeline {
    pub fn new(settings: &ViewerSettings) -> Self {
        Self::with_parts(
            settings.database_path.clone(),
            settings.recording.clone(),
            TelemetryExtractor::new(settings.ocr.clone()),
        )
    }

    pub fn with_parts(
        db_path: PathBuf,
        settings: RecordingSettings,
        extractor: TelemetryExtractor,
    ) -> Self {
        Self {
            extractor,
            recorder: SessionRecorder::new(db_path, settings.clone()),
            history: VecDeque::with_capacity(settings.history_len),
            settings,
            link: None,
            spectrum_active: false,
            latest: None,
            last_frame_at: None,
            latency: None,
        }
    }

    /// Starts reading from `link` on a background thread.
    pub fn connect<L>(&mut self, link: L) -> Result<()>
    where
        L: Read + Write + Send + 'static,
    {
        if self.link.is_some() {
            bail!("already connected");
        }
        let (tx, rx) = mpsc::channel();
        let reader = spawn_reader(link, tx)?;
        self.link = Some(LiveLink {
            inbound: rx,
            reader,
        });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Ends any active session, then stops the reader and forgets the
    /// spectrum state. Returns the identifier of the session that was stopped.
    pub fn disconnect(&mut self) -> Option<String> {
        let stopped = self.stop_session();
        if let Some(live) = self.link.take() {
            live
                .reader
                .stop(self.settings.reader_join_timeout());
            info!("Disconnected");
        }
        self.spectrum_active = false;
        self.last_frame_at = None;
        stopped
    }

    /// Drains everything the reader has queued. Never blocks.
    pub fn tick(&mut self) -> TickReport {
        let Some(live) = self.link.as_mut() else {
            return TickReport::default();
        };

        // Exit first: a reader that has exited has already queued its last frame.
        let failure = match live.reader.exit() {
            Some(ReaderExit::LinkFailed(err)) => Some(format!("{err:#}")),
            Some(ReaderExit::Abandoned) => Some("reader abandoned the frame queue".to_string()),
            _ => None,
        };
        let pending: Vec<Arrival> = live.inbound.try_iter().collect();

        let mut report = self.ingest(pending);

        if let Some(message) = failure {
            error!("Link failed: {message}");
            if let Some(identifier) = self.disconnect() {
                report.sessions_stopped.push(identifier);
            }
            report.link_error = Some(message);
        }
        report
    }

    /// Runs extraction and session bookkeeping over frames in arrival order.
    /// Each frame is timed by its own arrival instant.
    pub fn ingest<I>(&mut self, arrivals: I) -> TickReport
    where
        I: IntoIterator<Item = Arrival>,
    {
        let mut report = TickReport::default();
        for (arrived, framebuffer) in arrivals {
            self.process(framebuffer, arrived, &mut report);
        }
        report
    }

    fn process(&mut self, framebuffer: Framebuffer, arrived: Instant, report: &mut TickReport) {
        if let Some(previous) = self.last_frame_at {
            self.latency = Some(arrived.saturating_duration_since(previous));
        }
        self.last_frame_at = Some(arrived);

        let frame = self.extractor.extract(framebuffer);
        report.frames_processed += 1;

        if frame.spectrum_active && !self.spectrum_active {
            self.start_session(&frame, arrived, report);
        } else if !frame.spectrum_active && self.spectrum_active {
            if let Some(identifier) = self.stop_session() {
                report.sessions_stopped.push(identifier);
            }
        }
        self.spectrum_active = frame.spectrum_active;

        if frame.spectrum_active {
            if self.settings.history_len > 0 {
                if self.history.len() == self.settings.history_len {
                    self.history.pop_front();
                }
                self.history.push_back(frame.histogram.clone());
            }
            if self.recorder.record(&frame, arrived) {
                report.frames_queued += 1;
            }
        }

        self.latest = Some(frame);
    }

    fn start_session(&mut self, frame: &Frame, started: Instant, report: &mut TickReport) {
        let identifier = match self.recorder.start(started) {
            Ok(session) => session.identifier.clone(),
            Err(err) => {
                error!("Failed to start recording session: {err:#}");
                return;
            }
        };

        if let Some(dir) = &self.settings.snapshot_dir {
            let path = dir.join(format!("{identifier}.png"));
            let saved = std::fs::create_dir_all(dir)
                .map_err(anyhow::Error::from)
                .and_then(|_| frame.framebuffer.save_png(&path));
            if let Err(err) = saved {
                warn!("Snapshot for {identifier} not saved: {err:#}");
            }
        }

        report.sessions_started.push(identifier);
    }

    fn stop_session(&mut self) -> Option<String> {
        self.recorder.stop().map(|(identifier, _)| identifier)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.recorder.session()
    }

    pub fn spectrum_active(&self) -> bool {
        self.spectrum_active
    }

    pub fn latest_frame(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    /// Interval between the two most recent frames.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Recent spectrum histograms, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Vec<u32>> {
        self.history.iter()
    }
}

impl Drop for AcquisitionPipeline {
    fn drop(&mut self) {
        self.disconnect();
    }
}
