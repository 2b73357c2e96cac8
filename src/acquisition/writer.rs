use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use crate::db::{
    models::{NewRecordedFrame, Session},
    open_connection,
    repositories::{recordings::insert_frames, sessions::insert_session},
    run_migrations,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub batches: u64,
    pub frames_written: u64,
    pub failed_batches: u64,
}

/// Sole writer of a session's recordings. Owns its own connection on a
/// dedicated thread and commits queued frames in batches.
pub struct RecordingWriter {
    session: Session,
    sender: Option<Sender<NewRecordedFrame>>,
    cancel: CancellationToken,
    done_rx: Receiver<WriterStats>,
    handle: Option<JoinHandle<()>>,
}

impl RecordingWriter {
    /// Inserts the session row, then starts the writer thread. No thread is
    /// started if the insert fails.
    pub fn start(
        db_path: &Path,
        identifier: &str,
        start_time: DateTime<Utc>,
        batch_timeout: Duration,
    ) -> Result<Self> {
        let mut conn = open_connection(db_path)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("failed to relax synchronous mode")?;
        run_migrations(&mut conn).context("failed to prepare recordings schema")?;

        let session = insert_session(&conn, identifier, start_time)?;

        let (sender, receiver) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let session_id = session.id;

        let handle = thread::Builder::new()
            .name("k5viewer-writer".into())
            .spawn(move || {
                let stats = write_loop(conn, session_id, receiver, token, batch_timeout);
                let _ = done_tx.send(stats);
            })
            .context("failed to spawn recording writer thread")?;

        info!("Recording session {} started", session.identifier);

        Ok(Self {
            session,
            sender: Some(sender),
            cancel,
            done_rx,
            handle: Some(handle),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Queues a frame. Returns `false` once the writer thread has gone away.
    pub fn submit(&self, frame: NewRecordedFrame) -> bool {
        match &self.sender {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Signals the writer to flush what is queued and stop, waiting at most
    /// `timeout`. Returns the writer's totals when it finished in time.
    pub fn stop(mut self, timeout: Duration) -> Option<WriterStats> {
        self.cancel.cancel();
        self.sender.take();

        let stats = match self.done_rx.recv_timeout(timeout) {
            Ok(stats) => Some(stats),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Writer for {} did not finish within {timeout:?}; detaching",
                    self.session.identifier
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Writer for {} exited abnormally", self.session.identifier);
                None
            }
        };

        if let Some(handle) = self.handle.take() {
            if stats.is_some() && handle.join().is_err() {
                error!("Recording writer thread panicked");
            }
        }

        if let Some(stats) = stats {
            info!(
                "Recording session {} stopped: {} frames in {} batches ({} failed)",
                self.session.identifier,
                stats.frames_written,
                stats.batches,
                stats.failed_batches
            );
        }
        stats
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn write_loop(
    mut conn: Connection,
    session_id: i64,
    receiver: Receiver<NewRecordedFrame>,
    cancel: CancellationToken,
    batch_timeout: Duration,
) -> WriterStats {
    let mut stats = WriterStats::default();

    while !cancel.is_cancelled() {
        let first = match receiver.recv_timeout(batch_timeout) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let mut batch = vec![first];
        batch.extend(receiver.try_iter());
        write_batch(&mut conn, session_id, &batch, &mut stats);
    }

    let remaining: Vec<NewRecordedFrame> = receiver.try_iter().collect();
    if !remaining.is_empty() {
        info!("Writing final {} frames before exit", remaining.len());
        write_batch(&mut conn, session_id, &remaining, &mut stats);
    }

    stats
}

fn write_batch(
    conn: &mut Connection,
    session_id: i64,
    batch: &[NewRecordedFrame],
    stats: &mut WriterStats,
) {
    stats.batches += 1;
    match insert_frames(conn, session_id, batch) {
        Ok(written) => {
            stats.frames_written += written as u64;
            debug!("Committed batch of {written} frames");
        }
        Err(err) => {
            // The transaction rolled back; keep going with later batches.
            stats.failed_batches += 1;
            error!("Failed to write batch of {} frames: {err:#}", batch.len());
        }
    }
}
