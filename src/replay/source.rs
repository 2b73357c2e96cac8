use anyhow::Result;

use crate::db::{
    models::RecordedFrame,
    repositories::recordings::{count_frames, fetch_frames},
    Database,
};

/// Random-access supply of a closed session's frames, in timestamp order.
pub trait FrameSource {
    fn frame_count(&self) -> Result<u64>;

    /// Up to `limit` frames starting at `offset`. Fewer are returned past the end.
    fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<RecordedFrame>>;
}

/// A recorded session read through the database worker.
#[derive(Clone)]
pub struct SessionFrames {
    db: Database,
    identifier: String,
}

impl SessionFrames {
    pub fn new(db: Database, identifier: impl Into<String>) -> Self {
        Self {
            db,
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl FrameSource for SessionFrames {
    fn frame_count(&self) -> Result<u64> {
        let identifier = self.identifier.clone();
        self.db
            .execute_blocking(move |conn| count_frames(conn, &identifier))
    }

    fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<RecordedFrame>> {
        let identifier = self.identifier.clone();
        self.db
            .execute_blocking(move |conn| fetch_frames(conn, &identifier, offset, limit))
    }
}

impl FrameSource for Vec<RecordedFrame> {
    fn frame_count(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<RecordedFrame>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let end = start
            .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
            .min(self.len());
        Ok(self[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Telemetry;

    fn frames(n: i64) -> Vec<RecordedFrame> {
        (0..n)
            .map(|id| RecordedFrame {
                id,
                session_id: 1,
                timestamp_secs: id as f64,
                histogram: vec![0; 4],
                telemetry: Telemetry::default(),
                energy_sum: 0,
            })
            .collect()
    }

    #[test]
    fn in_memory_pages_stop_at_the_end() -> Result<()> {
        let source = frames(5);
        assert_eq!(source.frame_count()?, 5);
        let ids: Vec<i64> = source.fetch(3, 10)?.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(source.fetch(9, 2)?.is_empty());
        Ok(())
    }
}
