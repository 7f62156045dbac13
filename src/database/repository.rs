/*!
 * Repository layer for database operations.
 *
 * Typed access to the `jobs` and `segments` tables. Every call runs on the
 * blocking pool through `DatabaseConnection`.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::connection::DatabaseConnection;
use super::models::{JobRecord, JobStatus, SegmentRecord};

const JOB_COLUMNS: &str = "id, source_path, source_hash, voice, provider, model, max_unit_size, \
                           total_segments, status, created_at, updated_at, completed_at";

const SEGMENT_COLUMNS: &str =
    "job_id, segment_index, status, attempts, last_error, audio_path, duration_seconds, updated_at";

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Repository over the default database location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Repository over an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert a job or overwrite its columns
    pub async fn upsert_job(&self, job: &JobRecord) -> Result<()> {
        let job = job.clone();
        self.db.execute_async(move |conn| Self::upsert_job_sync(conn, &job)).await
    }

    fn upsert_job_sync(conn: &Connection, job: &JobRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO jobs (
                id, source_path, source_hash, voice, provider, model, max_unit_size,
                total_segments, status, created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                source_path = excluded.source_path,
                source_hash = excluded.source_hash,
                voice = excluded.voice,
                provider = excluded.provider,
                model = excluded.model,
                max_unit_size = excluded.max_unit_size,
                total_segments = excluded.total_segments,
                status = excluded.status,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at
            "#,
            params![
                job.id,
                job.source_path,
                job.source_hash,
                job.voice,
                job.provider,
                job.model,
                job.max_unit_size,
                job.total_segments,
                job.status.to_string(),
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    }

    /// Get a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
                let job = conn.query_row(&sql, [&job_id], parse_job_row).optional()?;
                Ok(job)
            })
            .await
    }

    /// All jobs, most recently updated first
    pub async fn list_jobs(&self, status_filter: Option<JobStatus>) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let jobs: Vec<JobRecord> = if let Some(status) = status_filter {
                    let sql = format!(
                        "SELECT {} FROM jobs WHERE status = ?1 ORDER BY updated_at DESC",
                        JOB_COLUMNS
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([status.to_string()], parse_job_row)?
                        .collect::<rusqlite::Result<_>>()?
                } else {
                    let sql = format!("SELECT {} FROM jobs ORDER BY updated_at DESC", JOB_COLUMNS);
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([], parse_job_row)?.collect::<rusqlite::Result<_>>()?
                };

                Ok(jobs)
            })
            .await
    }

    /// Set a job's status; `completed_at` is stamped for finished states
    pub async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<()> {
        let job_id = job_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let completed_at = if status.is_finished() { Some(now.clone()) } else { None };

                conn.execute(
                    r#"
                    UPDATE jobs
                    SET status = ?1, updated_at = ?2, completed_at = COALESCE(?3, completed_at)
                    WHERE id = ?4
                    "#,
                    params![status.to_string(), now, completed_at, job_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Delete a job and, by cascade, its segments. Returns whether it existed
    pub async fn delete_job(&self, job_id: &str) -> Result<bool> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", [&job_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Delete finished jobs last touched more than `days` days ago
    pub async fn delete_finished_jobs_older_than(&self, days: i64) -> Result<i64> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    r#"
                    DELETE FROM jobs
                    WHERE status IN ('completed', 'completed_with_gaps', 'failed')
                      AND updated_at < ?1
                    "#,
                    [cutoff],
                )?;
                debug!("Deleted {} old jobs", deleted);
                Ok(deleted as i64)
            })
            .await
    }

    // =========================================================================
    // Segment Operations
    // =========================================================================

    /// Insert or overwrite one segment row and touch its job
    pub async fn upsert_segment(&self, segment: &SegmentRecord) -> Result<()> {
        let segment = segment.clone();

        self.db
            .transaction_async(move |tx| {
                Self::upsert_segment_sync(tx, &segment)?;
                tx.execute(
                    "UPDATE jobs SET updated_at = ?1 WHERE id = ?2",
                    params![segment.updated_at, segment.job_id],
                )?;
                Ok(())
            })
            .await
    }

    fn upsert_segment_sync(conn: &Connection, segment: &SegmentRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO segments (
                job_id, segment_index, status, attempts, last_error, audio_path,
                duration_seconds, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(job_id, segment_index) DO UPDATE SET
                status = excluded.status,
                attempts = excluded.attempts,
                last_error = excluded.last_error,
                audio_path = excluded.audio_path,
                duration_seconds = excluded.duration_seconds,
                updated_at = excluded.updated_at
            "#,
            params![
                segment.job_id,
                segment.segment_index,
                segment.status,
                segment.attempts,
                segment.last_error,
                segment.audio_path,
                segment.duration_seconds,
                segment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Segments of a job in index order
    pub async fn get_segments(&self, job_id: &str) -> Result<Vec<SegmentRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM segments WHERE job_id = ?1 ORDER BY segment_index",
                    SEGMENT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let segments = stmt
                    .query_map([&job_id], parse_segment_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(segments)
            })
            .await
    }

    /// Write a job and replace its whole segment set atomically
    pub async fn save_job(&self, job: &JobRecord, segments: Vec<SegmentRecord>) -> Result<()> {
        let job = job.clone();

        self.db
            .transaction_async(move |tx| {
                Self::upsert_job_sync(tx, &job)?;
                tx.execute("DELETE FROM segments WHERE job_id = ?1", [&job.id])?;
                for segment in &segments {
                    Self::upsert_segment_sync(tx, segment)?;
                }
                debug!("Saved job {} with {} segments", job.id, segments.len());
                Ok(())
            })
            .await
    }
}

fn parse_job_row(row: &Row) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(8)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(JobRecord {
        id: row.get(0)?,
        source_path: row.get(1)?,
        source_hash: row.get(2)?,
        voice: row.get(3)?,
        provider: row.get(4)?,
        model: row.get(5)?,
        max_unit_size: row.get(6)?,
        total_segments: row.get(7)?,
        status,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

fn parse_segment_row(row: &Row) -> rusqlite::Result<SegmentRecord> {
    Ok(SegmentRecord {
        job_id: row.get(0)?,
        segment_index: row.get(1)?,
        status: row.get(2)?,
        attempts: row.get(3)?,
        last_error: row.get(4)?,
        audio_path: row.get(5)?,
        duration_seconds: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
