/*!
 * Resumable synthesis jobs.
 *
 * A job is one document converted with one provider, model, voice and
 * segment size. Its progress is stored after every segment transition.
 */

pub mod manager;
pub mod models;
pub mod store;

pub use manager::{JobManager, ResumeResult};
pub use models::{JobIdentity, JobProgress, JobStatus, SegmentState, SegmentStatus};
pub use store::{MemoryProgressStore, ProgressStore, SqliteProgressStore};
