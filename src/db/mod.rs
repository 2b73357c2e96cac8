pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::{open_connection, Database};
pub use migrations::run_migrations;
