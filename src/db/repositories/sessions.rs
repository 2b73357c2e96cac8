use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{like_pattern, parse_datetime, to_u64},
    models::{Session, SessionFilter, SessionSummary},
};

fn row_to_session(row: &Row) -> Result<Session> {
    let start_time: String = row.get("start_time")?;
    Ok(Session {
        id: row.get("id")?,
        identifier: row.get("identifier")?,
        start_time: parse_datetime(&start_time, "start_time")?,
    })
}

fn row_to_summary(row: &Row) -> Result<SessionSummary> {
    let start_time: String = row.get("start_time")?;
    let frame_count: i64 = row.get("frame_count")?;
    let poi_count: i64 = row.get("poi_count")?;
    let peak_energy: Option<i64> = row.get("max_session_energy")?;

    Ok(SessionSummary {
        identifier: row.get("identifier")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        frame_count: to_u64(frame_count, "frame_count")?,
        duration_secs: row.get::<_, Option<f64>>("duration")?.unwrap_or(0.0),
        poi_count: to_u64(poi_count, "poi_count")?,
        poi_descriptions: row
            .get::<_, Option<String>>("poi_descriptions")?
            .unwrap_or_default(),
        peak_energy: to_u64(peak_energy.unwrap_or(0), "max_session_energy")?,
    })
}

pub fn insert_session(
    conn: &Connection,
    identifier: &str,
    start_time: DateTime<Utc>,
) -> Result<Session> {
    conn.execute(
        "INSERT INTO sessions (identifier, start_time) VALUES (?1, ?2)",
        params![identifier, start_time.to_rfc3339()],
    )
    .with_context(|| format!("failed to insert session {identifier}"))?;

    Ok(Session {
        id: conn.last_insert_rowid(),
        identifier: identifier.to_string(),
        start_time,
    })
}

pub fn find_session(conn: &Connection, identifier: &str) -> Result<Option<Session>> {
    let mut stmt = conn.prepare(
        "SELECT id, identifier, start_time FROM sessions WHERE identifier = ?1",
    )?;
    let mut rows = stmt.query(params![identifier])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

/// Sessions newest first, with per-session aggregates.
pub fn list_sessions(conn: &Connection, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
    let mut sql = String::from(
        "SELECT
            s.identifier,
            s.start_time,
            COUNT(DISTINCT r.id) AS frame_count,
            MAX(r.timestamp) AS duration,
            COUNT(DISTINCT poi.id) AS poi_count,
            GROUP_CONCAT(DISTINCT poi.description) AS poi_descriptions,
            MAX(r.spectrum_sum) AS max_session_energy
         FROM sessions s
         LEFT JOIN recordings r ON s.id = r.session_id
         LEFT JOIN points_of_interest poi ON r.id = poi.recording_id",
    );
    let mut conditions = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(term) = filter.search.as_deref().filter(|t| !t.is_empty()) {
        conditions.push(
            "(s.identifier LIKE ? ESCAPE '\\'
              OR s.start_time LIKE ? ESCAPE '\\'
              OR s.id IN (
                  SELECT r_inner.session_id
                  FROM recordings r_inner
                  JOIN points_of_interest poi_inner ON r_inner.id = poi_inner.recording_id
                  WHERE poi_inner.description LIKE ? ESCAPE '\\'
              ))",
        );
        let pattern = like_pattern(term);
        values.extend(std::iter::repeat(Value::Text(pattern)).take(3));
    }

    if let Some(since) = filter.since {
        conditions.push("s.start_time >= ?");
        values.push(Value::Text(since.format("%Y-%m-%d").to_string()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" GROUP BY s.id");

    if filter.min_energy > 0 {
        sql.push_str(" HAVING max_session_energy >= ?");
        values.push(Value::Integer(filter.min_energy));
    }

    sql.push_str(" ORDER BY s.start_time DESC, s.id DESC");

    let mut stmt = conn.prepare(&sql).context("failed to prepare session listing")?;
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_summary(row)?);
    }
    Ok(sessions)
}

/// Highest per-frame energy across every recording; 1 on an empty database so
/// callers can scale by it.
pub fn global_max_energy(conn: &Connection) -> Result<u64> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(spectrum_sum) FROM recordings", [], |row| row.get(0))?;
    match max {
        Some(value) if value > 0 => to_u64(value, "spectrum_sum"),
        _ => Ok(1),
    }
}

impl Database {
    pub async fn insert_session(
        &self,
        identifier: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Session> {
        let identifier = identifier.to_string();
        self.execute(move |conn| insert_session(conn, &identifier, start_time))
            .await
    }

    pub async fn get_session(&self, identifier: &str) -> Result<Option<Session>> {
        let identifier = identifier.to_string();
        self.execute(move |conn| find_session(conn, &identifier))
            .await
    }

    pub async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<SessionSummary>> {
        self.execute(move |conn| list_sessions(conn, &filter)).await
    }

    pub async fn global_max_energy(&self) -> Result<u64> {
        self.execute(|conn| global_max_energy(conn)).await
    }
}
