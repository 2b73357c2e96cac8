use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{text_or_unavailable, to_i64, to_u64},
    models::{NewRecordedFrame, RecordedFrame},
};
use crate::telemetry::{energy_sum, Telemetry};

const FRAME_COLUMNS: &str = "r.id, r.session_id, r.timestamp, r.spectrum_data,
    r.center_freq, r.start_freq, r.end_freq, r.impedance_low, r.impedance_high,
    r.bars, r.step, r.modulation, r.bandwidth, r.spectrum_sum";

pub fn encode_histogram(histogram: &[u32]) -> Result<String> {
    serde_json::to_string(histogram).context("failed to encode histogram")
}

pub fn decode_histogram(raw: &str) -> Result<Vec<u32>> {
    serde_json::from_str(raw).context("failed to decode histogram")
}

fn row_to_recorded_frame(row: &Row) -> Result<RecordedFrame> {
    let spectrum_data: Option<String> = row.get("spectrum_data")?;
    let histogram = match spectrum_data {
        Some(raw) => decode_histogram(&raw)?,
        None => Vec::new(),
    };
    let stored_sum: Option<i64> = row.get("spectrum_sum")?;
    let energy_sum = match stored_sum {
        Some(sum) => to_u64(sum, "spectrum_sum")?,
        None => energy_sum(&histogram),
    };

    Ok(RecordedFrame {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        timestamp_secs: row.get("timestamp")?,
        histogram,
        telemetry: Telemetry {
            center_freq: text_or_unavailable(row.get("center_freq")?),
            start_freq: text_or_unavailable(row.get("start_freq")?),
            end_freq: text_or_unavailable(row.get("end_freq")?),
            impedance_low: text_or_unavailable(row.get("impedance_low")?),
            impedance_high: text_or_unavailable(row.get("impedance_high")?),
            bars: text_or_unavailable(row.get("bars")?),
            step: text_or_unavailable(row.get("step")?),
            modulation: text_or_unavailable(row.get("modulation")?),
            bandwidth: text_or_unavailable(row.get("bandwidth")?),
        },
        energy_sum,
    })
}

/// Writes a batch in one transaction. Nothing is written if any row fails.
pub fn insert_frames(
    conn: &mut Connection,
    session_id: i64,
    frames: &[NewRecordedFrame],
) -> Result<usize> {
    let tx = conn
        .transaction()
        .context("failed to open recording transaction")?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO recordings (
                session_id, timestamp, spectrum_data, center_freq, start_freq,
                end_freq, impedance_low, impedance_high, bars, step,
                modulation, bandwidth, spectrum_sum
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for frame in frames {
            let t = &frame.telemetry;
            stmt.execute(params![
                session_id,
                frame.timestamp_secs,
                encode_histogram(&frame.histogram)?,
                t.center_freq,
                t.start_freq,
                t.end_freq,
                t.impedance_low,
                t.impedance_high,
                t.bars,
                t.step,
                t.modulation,
                t.bandwidth,
                to_i64(frame.energy_sum)?,
            ])
            .context("failed to insert recording")?;
        }
    }
    tx.commit().context("failed to commit recordings")?;
    Ok(frames.len())
}

pub fn count_frames(conn: &Connection, identifier: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(r.id)
         FROM recordings r
         JOIN sessions s ON r.session_id = s.id
         WHERE s.identifier = ?1",
        params![identifier],
        |row| row.get(0),
    )?;
    to_u64(count, "frame_count")
}

/// Frames in timestamp order, `limit` of them starting at `offset`.
pub fn fetch_frames(
    conn: &Connection,
    identifier: &str,
    offset: u64,
    limit: u64,
) -> Result<Vec<RecordedFrame>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FRAME_COLUMNS}
         FROM recordings r
         JOIN sessions s ON r.session_id = s.id
         WHERE s.identifier = ?1
         ORDER BY r.timestamp ASC, r.id ASC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let mut rows = stmt.query(params![identifier, to_i64(limit)?, to_i64(offset)?])?;
    let mut frames = Vec::new();
    while let Some(row) = rows.next()? {
        frames.push(row_to_recorded_frame(row)?);
    }
    Ok(frames)
}

pub fn energy_series(conn: &Connection, identifier: &str) -> Result<Vec<u64>> {
    let mut stmt = conn.prepare(
        "SELECT r.spectrum_sum
         FROM recordings r
         JOIN sessions s ON r.session_id = s.id
         WHERE s.identifier = ?1
         ORDER BY r.timestamp ASC, r.id ASC",
    )?;
    let mut rows = stmt.query(params![identifier])?;
    let mut series = Vec::new();
    while let Some(row) = rows.next()? {
        let sum: Option<i64> = row.get(0)?;
        series.push(to_u64(sum.unwrap_or(0), "spectrum_sum")?);
    }
    Ok(series)
}

/// The frame `n` places before the newest one (`n = 0` is the newest).
pub fn nth_recent_frame(conn: &Connection, session_id: i64, n: u64) -> Result<Option<RecordedFrame>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FRAME_COLUMNS}
         FROM recordings r
         WHERE r.session_id = ?1
         ORDER BY r.timestamp DESC, r.id DESC
         LIMIT 1 OFFSET ?2"
    ))?;
    let mut rows = stmt.query(params![session_id, to_i64(n)?])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_recorded_frame(row)?)),
        None => Ok(None),
    }
}

impl Database {
    pub async fn insert_frames(
        &self,
        session_id: i64,
        frames: Vec<NewRecordedFrame>,
    ) -> Result<usize> {
        self.execute(move |conn| insert_frames(conn, session_id, &frames))
            .await
    }

    pub async fn frame_count(&self, identifier: &str) -> Result<u64> {
        let identifier = identifier.to_string();
        self.execute(move |conn| count_frames(conn, &identifier))
            .await
    }

    pub async fn frame_page(
        &self,
        identifier: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RecordedFrame>> {
        let identifier = identifier.to_string();
        self.execute(move |conn| fetch_frames(conn, &identifier, offset, limit))
            .await
    }

    pub async fn energy_series(&self, identifier: &str) -> Result<Vec<u64>> {
        let identifier = identifier.to_string();
        self.execute(move |conn| energy_series(conn, &identifier))
            .await
    }

    pub async fn nth_recent_frame(
        &self,
        session_id: i64,
        n: u64,
    ) -> Result<Option<RecordedFrame>> {
        self.execute(move |conn| nth_recent_frame(conn, session_id, n))
            .await
    }
}
