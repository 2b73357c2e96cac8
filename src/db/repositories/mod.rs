pub mod points_of_interest;
pub mod recordings;
pub mod sessions;
