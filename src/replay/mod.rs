pub mod clock;
pub mod engine;
pub mod source;

pub use clock::PlaybackClock;
pub use engine::{ReplayEngine, TickOutcome};
pub use source::{FrameSource, SessionFrames};
