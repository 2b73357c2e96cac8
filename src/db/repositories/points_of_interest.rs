use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u64},
    models::{NewPointOfInterest, PointOfInterest, SessionPointOfInterest},
};

fn row_to_point(row: &Row) -> Result<PointOfInterest> {
    let absolute_timestamp: String = row.get("absolute_timestamp")?;
    Ok(PointOfInterest {
        id: row.get("id")?,
        recording_id: row.get("recording_id")?,
        frequency_mhz: row.get("frequency_mhz")?,
        description: row
            .get::<_, Option<String>>("description")?
            .unwrap_or_default(),
        absolute_timestamp: parse_datetime(&absolute_timestamp, "absolute_timestamp")?,
    })
}

pub fn insert_point_of_interest(
    conn: &Connection,
    point: &NewPointOfInterest,
) -> Result<PointOfInterest> {
    let description = point.description.trim().to_string();
    conn.execute(
        "INSERT INTO points_of_interest (recording_id, frequency_mhz, description, absolute_timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            point.recording_id,
            point.frequency_mhz,
            description,
            point.absolute_timestamp.to_rfc3339(),
        ],
    )
    .context("failed to insert point of interest")?;

    Ok(PointOfInterest {
        id: conn.last_insert_rowid(),
        recording_id: point.recording_id,
        frequency_mhz: point.frequency_mhz,
        description,
        absolute_timestamp: point.absolute_timestamp,
    })
}

/// Points of interest of a session, each with the index of its frame in
/// timestamp order.
pub fn session_points_of_interest(
    conn: &Connection,
    identifier: &str,
) -> Result<Vec<SessionPointOfInterest>> {
    let mut stmt = conn.prepare(
        "WITH ordered AS (
             SELECT r.id AS recording_id,
                    ROW_NUMBER() OVER (ORDER BY r.timestamp ASC, r.id ASC) - 1 AS frame_index
             FROM recordings r
             JOIN sessions s ON r.session_id = s.id
             WHERE s.identifier = ?1
         )
         SELECT p.id, p.recording_id, p.frequency_mhz, p.description, p.absolute_timestamp,
                ordered.frame_index
         FROM points_of_interest p
         JOIN ordered ON ordered.recording_id = p.recording_id
         ORDER BY ordered.frame_index ASC, p.id ASC",
    )?;

    let mut rows = stmt.query(params![identifier])?;
    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        let frame_index: i64 = row.get("frame_index")?;
        points.push(SessionPointOfInterest {
            frame_index: to_u64(frame_index, "frame_index")?,
            point: row_to_point(row)?,
        });
    }
    Ok(points)
}

impl Database {
    pub async fn insert_point_of_interest(
        &self,
        point: NewPointOfInterest,
    ) -> Result<PointOfInterest> {
        self.execute(move |conn| insert_point_of_interest(conn, &point))
            .await
    }

    pub async fn session_points_of_interest(
        &self,
        identifier: &str,
    ) -> Result<Vec<SessionPointOfInterest>> {
        let identifier = identifier.to_string();
        self.execute(move |conn| session_points_of_interest(conn, &identifier))
            .await
    }
}
