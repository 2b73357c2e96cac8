pub mod point_of_interest;
pub mod recording;
pub mod session;

pub use point_of_interest::{NewPointOfInterest, PointOfInterest, SessionPointOfInterest};
pub use recording::{NewRecordedFrame, RecordedFrame};
pub use session::{Session, SessionFilter, SessionSummary};
