/*!
 * Progress persistence.
 *
 * `ProgressStore` is the seam between the orchestrator and durable storage.
 * `SqliteProgressStore` is what the binary uses; `MemoryProgressStore` keeps
 * everything in a map and can be told to fail, which tests use to exercise
 * the abort path.
 */

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::database::Repository;
use crate::errors::PersistenceError;

use super::models::{JobProgress, JobStatus, SegmentState};

/// Durable job progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load a job with all its segments
    async fn load(&self, job_id: &str) -> Result<Option<JobProgress>, PersistenceError>;

    /// Write the whole job, replacing any stored segments
    async fn save(&self, progress: &JobProgress) -> Result<(), PersistenceError>;

    /// Write one segment transition
    async fn save_segment(&self, job_id: &str, segment: &SegmentState) -> Result<(), PersistenceError>;

    /// Remove a job; returns whether it existed
    async fn delete(&self, job_id: &str) -> Result<bool, PersistenceError>;

    /// Every stored job, most recently updated first
    async fn list(&self) -> Result<Vec<JobProgress>, PersistenceError>;

    /// Remove finished jobs not touched for `days` days; returns how many
    async fn delete_finished_older_than(&self, days: i64) -> Result<usize, PersistenceError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut deleted = 0;
        for job in self.list().await? {
            let finished = job.status.is_finished() || job.status == JobStatus::Failed;
            if finished && job.updated_at < cutoff && self.delete(&job.job_id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    repo: Repository,
}

impl SqliteProgressStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Open the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let db = crate::database::DatabaseConnection::new(path)?;
        Ok(Self::new(Repository::new(db)))
    }

    /// Open the database at its default location
    pub fn open_default() -> Result<Self, PersistenceError> {
        Ok(Self::new(Repository::new_default()?))
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::new(Repository::new_in_memory()?))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn load(&self, job_id: &str) -> Result<Option<JobProgress>, PersistenceError> {
        let Some(job) = self.repo.get_job(job_id).await? else {
            return Ok(None);
        };
        let segments = self.repo.get_segments(job_id).await?;
        JobProgress::from_records(job, &segments).map(Some)
    }

    async fn save(&self, progress: &JobProgress) -> Result<(), PersistenceError> {
        self.repo.save_job(&progress.to_record(), progress.segment_records()).await?;
        Ok(())
    }

    async fn save_segment(&self, job_id: &str, segment: &SegmentState) -> Result<(), PersistenceError> {
        self.repo.upsert_segment(&segment.to_record(job_id)).await?;
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.repo.delete_job(job_id).await?)
    }

    async fn list(&self) -> Result<Vec<JobProgress>, PersistenceError> {
        let mut jobs = Vec::new();
        for record in self.repo.list_jobs(None).await? {
            let segments = self.repo.get_segments(&record.id).await?;
            jobs.push(JobProgress::from_records(record, &segments)?);
        }
        Ok(jobs)
    }

    async fn delete_finished_older_than(&self, days: i64) -> Result<usize, PersistenceError> {
        let deleted = self.repo.delete_finished_jobs_older_than(days).await?;
        Ok(deleted as usize)
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    jobs: Mutex<HashMap<String, JobProgress>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later write fail with a database error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of a stored job without going through the async API
    pub fn snapshot(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs.lock().get(job_id).cloned()
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self, job_id: &str) -> Result<Option<JobProgress>, PersistenceError> {
        Ok(self.jobs.lock().get(job_id).cloned())
    }

    async fn save(&self, progress: &JobProgress) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.jobs.lock().insert(progress.job_id.clone(), progress.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_segment(&self, job_id: &str, segment: &SegmentState) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PersistenceError::Corrupt(format!("unknown job {}", job_id)))?;
        let slot = job.segments.get_mut(segment.index).ok_or_else(|| {
            PersistenceError::Corrupt(format!("segment {} out of range for job {}", segment.index, job_id))
        })?;
        *slot = segment.clone();
        job.touch();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.jobs.lock().remove(job_id).is_some())
    }

    async fn list(&self) -> Result<Vec<JobProgress>, PersistenceError> {
        let mut jobs: Vec<JobProgress> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(jobs)
    }
}
