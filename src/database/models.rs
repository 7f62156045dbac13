/*!
 * Database entity models.
 *
 * These structures map one-to-one onto the `jobs` and `segments` tables.
 * The richer in-memory view lives in `job::models`.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Segments are still being synthesized
    InProgress,
    /// Interrupted; can be resumed
    Paused,
    /// Every segment succeeded and output was assembled
    Completed,
    /// Output was assembled but some segments were exhausted
    CompletedWithGaps,
    /// No segment could be synthesized, or the run aborted
    Failed,
}

impl JobStatus {
    /// Whether a later run picks this job up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithGaps)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::CompletedWithGaps => write!(f, "completed_with_gaps"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(JobStatus::InProgress),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "completed_with_gaps" => Ok(JobStatus::CompletedWithGaps),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Row of the `jobs` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Truncated SHA-256 job identity
    pub id: String,
    pub source_path: String,
    /// SHA-256 of the input file contents
    pub source_hash: String,
    pub voice: String,
    pub provider: String,
    pub model: String,
    pub max_unit_size: i64,
    pub total_segments: i64,
    pub status: JobStatus,
    /// RFC 3339 timestamps
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// Row of the `segments` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub job_id: String,
    pub segment_index: i64,
    /// `pending`, `in_flight`, `succeeded`, `failed` or `exhausted`
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub audio_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub updated_at: String,
}
