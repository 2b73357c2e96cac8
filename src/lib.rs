pub mod acquisition;
pub mod codec;
pub mod db;
pub mod models;
pub mod ocr;
pub mod replay;
pub mod settings;
pub mod telemetry;
pub mod utils;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use acquisition::{AcquisitionPipeline, TickReport};
use codec::{list_usb_ports, open_port};
use db::{models::SessionFilter, Database};
use settings::{SettingsStore, ViewerSettings};

const SETTINGS_ENV: &str = "K5VIEWER_SETTINGS";
const PORT_ENV: &str = "K5VIEWER_PORT";
const DEFAULT_SETTINGS_FILE: &str = "k5viewer.json";
const TICK_INTERVAL: Duration = Duration::from_millis(30);
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

fn load_settings() -> Result<ViewerSettings> {
    let path = std::env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let mut settings = SettingsStore::new(path)?.snapshot()?;

    if let Ok(port) = std::env::var(PORT_ENV) {
        if !port.trim().is_empty() {
            settings.serial.port = Some(port.trim().to_string());
        }
    }
    Ok(settings)
}

/// Picks the only USB serial adapter when none is configured.
fn resolve_port(settings: &mut ViewerSettings) -> Result<()> {
    if settings.serial.port.is_some() {
        return Ok(());
    }

    let ports = list_usb_ports()?;
    match ports.as_slice() {
        [only] => {
            info!("Using {} ({})", only.device, only.description);
            settings.serial.port = Some(only.device.clone());
            Ok(())
        }
        [] => bail!("no USB serial adapters found; set {PORT_ENV}"),
        many => {
            for port in many {
                info!("Available port: {} ({})", port.device, port.description);
            }
            bail!("{} USB serial adapters found; set {PORT_ENV} to pick one", many.len())
        }
    }
}

async fn log_stopped(db: &Database, identifiers: &[String]) {
    for identifier in identifiers {
        match db.frame_count(identifier).await {
            Ok(frames) => info!("Session {identifier} closed with {frames} frames"),
            Err(err) => warn!("Could not count frames of {identifier}: {err:#}"),
        }
    }
}

/// Headless recorder: streams the radio's screen, extracts telemetry, and
/// records spectrum sessions until Ctrl-C or a link failure.
pub async fn run() -> Result<()> {
    let mut settings = load_settings()?;
    utils::logging::init(&settings.log_level)?;

    info!("K5 viewer starting up...");

    let db = Database::new(settings.database_path.clone())?;
    let sessions = db.list_sessions(SessionFilter::default()).await?;
    info!(
        "{} recorded sessions in {}",
        sessions.len(),
        db.path().display()
    );

    resolve_port(&mut settings)?;
    let port = open_port(&settings.serial)?;

    let mut pipeline = AcquisitionPipeline::new(&settings);
    pipeline
        .connect(port)
        .context("failed to start serial reader")?;

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut frames_seen: u64 = 0;
    let mut frames_queued: u64 = 0;
    let mut link_error = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let TickReport {
                    frames_processed,
                    frames_queued: queued,
                    sessions_stopped,
                    link_error: failure,
                    ..
                } = pipeline.tick();
                frames_seen += frames_processed as u64;
                frames_queued += queued as u64;
                log_stopped(&db, &sessions_stopped).await;
                if failure.is_some() {
                    link_error = failure;
                    break;
                }
            }
            _ = status.tick() => {
                let latency = pipeline
                    .latency()
                    .map(|l| format!("{} ms", l.as_millis()))
                    .unwrap_or_else(|| "n/a".into());
                info!(
                    "{frames_seen} frames seen, {frames_queued} recorded, latency {latency}, recording: {}",
                    pipeline.is_recording()
                );
            }
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    error!("Ctrl-C handler failed: {err}");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    if let Some(identifier) = pipeline.disconnect() {
        log_stopped(&db, &[identifier]).await;
    }

    match link_error {
        Some(message) => bail!("serial link failed: {message}"),
        None => Ok(()),
    }
}
