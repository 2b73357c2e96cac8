pub mod pipeline;
pub mod rate;
pub mod reader;
pub mod recorder;
pub mod writer;

pub use pipeline::{AcquisitionPipeline, TickReport};
pub use rate::RateLimiter;
pub use reader::{spawn_reader, Arrival, ReaderExit, ReaderHandle};
pub use recorder::{new_session_identifier, SessionRecorder};
pub use writer::{RecordingWriter, WriterStats};
