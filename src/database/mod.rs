/*!
 * SQLite persistence for synthesis jobs.
 *
 * One row per job and one row per segment, so an interrupted conversion can
 * pick up exactly where it stopped.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{JobRecord, JobStatus, SegmentRecord};
pub use repository::Repository;
