use std::time::Instant;

/// Maps wall-clock time onto a session's relative timeline.
///
/// Position is `baseline_secs` plus the scaled time since `running_anchor`.
/// Every change of speed, pause state or position folds the elapsed part
/// into the baseline first, so the position never jumps.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    speed: u32,
    baseline_secs: f64,
    running_anchor: Option<Instant>,
}

impl PlaybackClock {
    pub fn started(position_secs: f64, speed: u32, now: Instant) -> Self {
        Self {
            speed,
            baseline_secs: position_secs,
            running_anchor: Some(now),
        }
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn is_running(&self) -> bool {
        self.running_anchor.is_some()
    }

    /// Session-relative seconds at `now`.
    pub fn position_at(&self, now: Instant) -> f64 {
        match self.running_anchor {
            Some(anchor) => {
                self.baseline_secs
                    + now.saturating_duration_since(anchor).as_secs_f64() * f64::from(self.speed)
            }
            None => self.baseline_secs,
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.running_anchor.is_some() {
            self.baseline_secs = self.position_at(now);
            self.running_anchor = None;
        }
    }

    pub fn resume_at(&mut self, now: Instant) {
        if self.running_anchor.is_none() {
            self.running_anchor = Some(now);
        }
    }

    pub fn set_speed_at(&mut self, speed: u32, now: Instant) {
        self.rebase(now);
        self.speed = speed;
    }

    /// Moves the position without touching the pause state.
    pub fn jump_to(&mut self, position_secs: f64, now: Instant) {
        self.baseline_secs = position_secs;
        if self.running_anchor.is_some() {
            self.running_anchor = Some(now);
        }
    }

    fn rebase(&mut self, now: Instant) {
        if self.running_anchor.is_some() {
            self.baseline_secs = self.position_at(now);
            self.running_anchor = Some(now);
        }
    }
}
