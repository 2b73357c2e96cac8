// A scripted serial link drives the live pipeline through one spectrum
// session; the recorded session is then read back and replayed.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::TempDir;

use k5viewer_lib::acquisition::AcquisitionPipeline;
use k5viewer_lib::codec::{encode_frame, TYPE_DIFF, TYPE_SCREENSHOT};
use k5viewer_lib::db::models::SessionFilter;
use k5viewer_lib::db::repositories::{
    recordings::{energy_series, fetch_frames},
    sessions::list_sessions,
};
use k5viewer_lib::db::Database;
use k5viewer_lib::models::{Framebuffer, WIDTH};
use k5viewer_lib::ocr::OcrConfig;
use k5viewer_lib::replay::{ReplayEngine, SessionFrames};
use k5viewer_lib::settings::{RecordingSettings, ReplaySettings};
use k5viewer_lib::telemetry::{energy_sum, TelemetryExtractor};
use k5viewer_lib::utils::logging;

/// Hands out one scripted chunk per read, then idles like a quiet port.
struct ScriptedLink {
    chunks: VecDeque<Vec<u8>>,
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => {
                thread::sleep(Duration::from_millis(5));
                Err(io::Error::new(ErrorKind::TimedOut, "idle"))
            }
        }
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn spectrum_screen(peak_column: i32, peak_height: i32) -> Framebuffer {
    let mut fb = Framebuffer::new();
    for x in 0..WIDTH as i32 {
        fb.set_pixel(x, 48, true);
    }
    for y in (48 - peak_height)..48 {
        fb.set_pixel(peak_column, y, true);
    }
    fb
}

fn screenshot(fb: &Framebuffer) -> Vec<u8> {
    encode_frame(TYPE_SCREENSHOT, fb.as_bytes())
}

fn pipeline(dir: &TempDir) -> AcquisitionPipeline {
    throttled_pipeline(dir, 0.0)
}

fn throttled_pipeline(dir: &TempDir, interval_secs: f64) -> AcquisitionPipeline {
    let settings = RecordingSettings {
        interval_secs,
        writer_batch_timeout_ms: 20,
        ..RecordingSettings::default()
    };
    AcquisitionPipeline::with_parts(
        dir.path().join("viewer.db"),
        settings,
        TelemetryExtractor::new(OcrConfig::default()),
    )
}

#[test]
fn live_session_is_recorded_and_replayable() -> Result<()> {
    logging::init_for_tests();
    let dir = TempDir::new()?;
    let db_path = dir.path().join("viewer.db");

    // Idle screen, three spectrum frames, then an idle screen that ends the
    // session.
    let mut chunks = VecDeque::new();
    chunks.push_back(screenshot(&Framebuffer::new()));
    chunks.push_back(screenshot(&spectrum_screen(10, 5)));
    chunks.push_back(screenshot(&spectrum_screen(40, 20)));
    chunks.push_back(screenshot(&spectrum_screen(70, 12)));
    chunks.push_back(screenshot(&Framebuffer::new()));

    let mut pipeline = pipeline(&dir);
    pipeline.connect(ScriptedLink { chunks })?;

    let mut processed = 0;
    let mut started = Vec::new();
    let mut stopped = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while processed < 5 && Instant::now() < deadline {
        let report = pipeline.tick();
        processed += report.frames_processed;
        started.extend(report.sessions_started);
        stopped.extend(report.sessions_stopped);
        assert_eq!(report.link_error, None);
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(processed, 5);
    assert_eq!(started.len(), 1);
    assert_eq!(stopped, started);
    assert!(!pipeline.is_recording());
    assert_eq!(pipeline.history().count(), 3);
    assert_eq!(pipeline.disconnect(), None);

    let db = Database::new(db_path)?;
    let identifier = started[0].clone();

    let sessions = db.execute_blocking(|conn| list_sessions(conn, &SessionFilter::default()))?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].identifier, identifier);
    assert_eq!(sessions[0].frame_count, 3);

    let id = identifier.clone();
    let series = db.execute_blocking(move |conn| energy_series(conn, &id))?;
    assert_eq!(series.len(), 3);
    assert_eq!(sessions[0].peak_energy, series.iter().copied().max().unwrap_or(0));

    let replay_settings = ReplaySettings {
        buffer_size: 2,
        fetch_chunk_size: 2,
        ..ReplaySettings::default()
    };
    let mut engine = ReplayEngine::open(SessionFrames::new(db.clone(), identifier), &replay_settings)?;
    assert_eq!(engine.total_frames(), 3);

    for i in (0..3).rev() {
        engine.seek(i)?;
        let frame = engine.current().expect("frame under cursor");
        assert_eq!(frame.energy_sum, series[i as usize]);
        assert_eq!(frame.energy_sum, energy_sum(&frame.histogram));
    }

    // The tallest peak was the second spectrum frame.
    engine.seek(1)?;
    let peak = engine.current().expect("frame under cursor");
    let column = peak
        .histogram
        .iter()
        .enumerate()
        .max_by_key(|(_, level)| **level)
        .map(|(column, _)| column);
    assert_eq!(column, Some(40));
    Ok(())
}

#[test]
fn diffs_keep_the_session_alive() -> Result<()> {
    let dir = TempDir::new()?;

    let base = spectrum_screen(20, 8);
    let mut chunks = VecDeque::new();
    chunks.push_back(screenshot(&base));
    // Lights the top-left block; the spectrum baseline is untouched.
    let mut payload = vec![0u8];
    payload.extend_from_slice(&[0xFF; 8]);
    chunks.push_back(encode_frame(TYPE_DIFF, &payload));

    let mut pipeline = pipeline(&dir);
    pipeline.connect(ScriptedLink { chunks })?;

    let mut processed = 0;
    let mut started = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while processed < 2 && Instant::now() < deadline {
        let report = pipeline.tick();
        processed += report.frames_processed;
        started += report.sessions_started.len();
        assert!(report.sessions_stopped.is_empty());
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(processed, 2);
    assert_eq!(started, 1);
    assert!(pipeline.is_recording());
    let latest = pipeline.latest_frame().expect("latest frame");
    assert_eq!(latest.framebuffer.lit_count(), base.lit_count() + 64 - overlap(&base));

    assert!(pipeline.disconnect().is_some());
    Ok(())
}

#[test]
fn interval_thins_recording_to_one_frame_per_second() -> Result<()> {
    let dir = TempDir::new()?;
    let mut pipeline = throttled_pipeline(&dir, 1.0);
    let t0 = Instant::now();

    let arrivals = [0u64, 300, 1000, 1500, 2500]
        .into_iter()
        .enumerate()
        .map(|(i, ms)| (t0 + Duration::from_millis(ms), spectrum_screen(10 + i as i32, 6)));
    let report = pipeline.ingest(arrivals);
    assert_eq!(report.frames_processed, 5);
    assert_eq!(report.sessions_started.len(), 1);
    assert_eq!(report.frames_queued, 3);
    assert_eq!(pipeline.history().count(), 5);

    let identifier = pipeline.disconnect().expect("session was recording");
    let db = Database::new(dir.path().join("viewer.db"))?;
    let frames = db.execute_blocking(move |conn| fetch_frames(conn, &identifier, 0, 10))?;
    let stamps: Vec<f64> = frames.iter().map(|f| f.timestamp_secs).collect();
    assert_eq!(stamps, vec![0.0, 1.0, 2.5]);

    // The first, third and fifth screens were kept.
    let peaks: Vec<Option<usize>> = frames
        .iter()
        .map(|f| f.histogram.iter().position(|&level| level > 1))
        .collect();
    assert_eq!(peaks, vec![Some(10), Some(12), Some(14)]);
    Ok(())
}

/// Lit pixels of `fb` inside the first diff block.
fn overlap(fb: &Framebuffer) -> u32 {
    fb.as_bytes()[..8].iter().map(|b| b.count_ones()).sum()
}
