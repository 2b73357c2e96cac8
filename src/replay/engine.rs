use std::collections::VecDeque;
use std::ops::Range;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use super::clock::PlaybackClock;
use super::source::FrameSource;
use crate::db::models::RecordedFrame;
use crate::log_debug;
use crate::settings::ReplaySettings;

const ENABLE_LOGS: bool = true;

/// Result of one playback tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub advanced: u64,
    /// The cursor is on the final frame and playback paused there.
    pub reached_end: bool,
}

/// Seekable playback over a closed session, holding a bounded window of
/// frames in memory.
pub struct ReplayEngine<S> {
    source: S,
    total: u64,
    chunk: u64,
    buffer_size: usize,
    speed_options: Vec<u32>,
    buffer: VecDeque<RecordedFrame>,
    buffer_start: u64,
    index: u64,
    clock: PlaybackClock,
}

impl<S: FrameSource> ReplayEngine<S> {
    pub fn open(source: S, settings: &ReplaySettings) -> Result<Self> {
        Self::open_at(source, settings, Instant::now())
    }

    /// Loads the first chunk and starts playing from frame 0.
    pub fn open_at(source: S, settings: &ReplaySettings, now: Instant) -> Result<Self> {
        if settings.fetch_chunk_size == 0 {
            bail!("replay fetch chunk size must be positive");
        }
        if settings.buffer_size < settings.fetch_chunk_size {
            bail!(
                "replay buffer ({}) must hold at least one fetch chunk ({})",
                settings.buffer_size,
                settings.fetch_chunk_size
            );
        }
        let speed = match settings.speed_options.first() {
            Some(&speed) if speed > 0 => speed,
            _ => bail!("replay needs at least one positive speed option"),
        };

        let total = source.frame_count().context("failed to count session frames")?;
        if total == 0 {
            bail!("session has no frames to replay");
        }

        let chunk = settings.fetch_chunk_size as u64;
        let initial = source.fetch(0, chunk).context("failed to load first replay chunk")?;
        let Some(first) = initial.first() else {
            bail!("session reported {total} frames but none could be read");
        };
        let clock = PlaybackClock::started(first.timestamp_secs, speed, now);

        info!("Replay opened with {total} frames");

        Ok(Self {
            source,
            total,
            chunk,
            buffer_size: settings.buffer_size,
            speed_options: settings.speed_options.clone(),
            buffer: initial.into(),
            buffer_start: 0,
            index: 0,
            clock,
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_paused(&self) -> bool {
        !self.clock.is_running()
    }

    pub fn speed(&self) -> u32 {
        self.clock.speed()
    }

    pub fn speed_options(&self) -> &[u32] {
        &self.speed_options
    }

    pub fn position_at(&self, now: Instant) -> f64 {
        self.clock.position_at(now)
    }

    /// Frame indices currently held in memory.
    pub fn buffered_range(&self) -> Range<u64> {
        self.buffer_start..self.buffer_end()
    }

    pub fn current(&self) -> Option<&RecordedFrame> {
        self.frame(self.index)
    }

    /// A buffered frame by session index; `None` outside the window.
    pub fn frame(&self, index: u64) -> Option<&RecordedFrame> {
        let offset = index.checked_sub(self.buffer_start)?;
        self.buffer.get(usize::try_from(offset).ok()?)
    }

    /// Up to `n` histograms ending at the cursor, newest first.
    pub fn recent_histograms(&self, n: usize) -> Vec<&[u32]> {
        (0..=self.index)
            .rev()
            .take(n)
            .map_while(|i| self.frame(i))
            .map(|frame| frame.histogram.as_slice())
            .collect()
    }

    pub fn seek(&mut self, index: u64) -> Result<()> {
        self.seek_at(index, Instant::now())
    }

    /// Reloads the window around `index` (clamped to the session). The
    /// pause state is unchanged.
    pub fn seek_at(&mut self, index: u64, now: Instant) -> Result<()> {
        let target = index.min(self.total - 1);
        let start = target
            .saturating_sub(self.chunk / 2)
            .min(self.total.saturating_sub(self.chunk));

        log_debug!("Seeking to frame {target}; reloading from {start}");
        let chunk = self
            .source
            .fetch(start, self.chunk)
            .with_context(|| format!("failed to load replay chunk at {start}"))?;
        if start + (chunk.len() as u64) <= target {
            bail!("replay chunk at {start} does not reach frame {target}");
        }

        self.buffer = chunk.into();
        self.buffer_start = start;
        self.index = target;
        if let Some(position) = self.current().map(|frame| frame.timestamp_secs) {
            self.clock.jump_to(position, now);
        }
        Ok(())
    }

    pub fn set_speed(&mut self, multiplier: u32) -> Result<()> {
        self.set_speed_at(multiplier, Instant::now())
    }

    pub fn set_speed_at(&mut self, multiplier: u32, now: Instant) -> Result<()> {
        if multiplier == 0 || !self.speed_options.contains(&multiplier) {
            bail!("unsupported replay speed {multiplier}x");
        }
        self.clock.set_speed_at(multiplier, now);
        Ok(())
    }

    pub fn toggle_pause(&mut self) -> Result<()> {
        self.toggle_pause_at(Instant::now())
    }

    /// Pauses or resumes. Resuming while paused on the final frame restarts
    /// from the first one.
    pub fn toggle_pause_at(&mut self, now: Instant) -> Result<()> {
        if self.is_paused() && self.index + 1 >= self.total {
            info!("Replay restarting from the beginning");
            self.seek_at(0, now)?;
            self.clock.resume_at(now);
        } else if self.is_paused() {
            self.clock.resume_at(now);
        } else {
            self.clock.pause_at(now);
        }
        Ok(())
    }

    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.tick_at(Instant::now())
    }

    /// Advances past every frame whose timestamp is due at `now`.
    pub fn tick_at(&mut self, now: Instant) -> Result<TickOutcome> {
        let mut outcome = TickOutcome::default();
        if self.is_paused() {
            return Ok(outcome);
        }

        let position = self.clock.position_at(now);
        while self.index + 1 < self.total {
            self.refill()?;
            let due = match self.frame(self.index + 1) {
                Some(next) => next.timestamp_secs <= position,
                None => break,
            };
            if !due {
                break;
            }
            self.index += 1;
            outcome.advanced += 1;
        }

        if self.index + 1 >= self.total {
            self.clock.pause_at(now);
            outcome.reached_end = true;
        }
        Ok(outcome)
    }

    fn buffer_end(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    /// Fetches the next chunk once the cursor is within half a chunk of the
    /// window's end, dropping frames from the front beyond the buffer size.
    fn refill(&mut self) -> Result<()> {
        let end = self.buffer_end();
        if end >= self.total {
            return Ok(());
        }
        let near_end = self.index >= end.saturating_sub(self.chunk / 2);
        let next_missing = self.index + 1 >= end;
        if !near_end && !next_missing {
            return Ok(());
        }

        let chunk = self
            .source
            .fetch(end, self.chunk)
            .with_context(|| format!("failed to load replay chunk at {end}"))?;
        if chunk.is_empty() {
            warn!("Session ended early at frame {end} of {}", self.total);
            self.total = end;
            return Ok(());
        }
        log_debug!("Buffered {} more frames from {end}", chunk.len());
        self.buffer.extend(chunk);

        while self.buffer.len() > self.buffer_size && self.buffer_start < self.index {
            self.buffer.pop_front();
            self.buffer_start += 1;
        }
        Ok(())
    }
}
