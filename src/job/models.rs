/*!
 * In-memory view of a synthesis job and its segments.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use crate::database::models::JobStatus;
use crate::database::models::{JobRecord, SegmentRecord};
use crate::errors::PersistenceError;

/// Lifecycle of one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentStatus {
    Pending,
    /// A synthesis call is running or was running when the process stopped
    InFlight,
    Succeeded,
    /// Last attempt failed; may be retried
    Failed(String),
    /// Attempt budget spent or a fatal error
    Exhausted,
}

impl SegmentStatus {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
            Self::Exhausted => "exhausted",
        }
    }

    /// Rebuild from the stored name and last error
    pub fn from_parts(status: &str, last_error: Option<&str>) -> Result<Self, PersistenceError> {
        match status {
            "pending" => Ok(Self::Pending),
            "in_flight" => Ok(Self::InFlight),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed(last_error.unwrap_or_default().to_string())),
            "exhausted" => Ok(Self::Exhausted),
            other => Err(PersistenceError::Corrupt(format!("unknown segment status '{}'", other))),
        }
    }

    /// Succeeded or Exhausted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentState {
    pub index: usize,
    pub status: SegmentStatus,
    /// Synthesis calls made in the current attempt budget
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Committed audio file, set once the segment succeeded
    pub audio_path: Option<PathBuf>,
    pub duration_seconds: Option<f64>,
}

impl SegmentState {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            status: SegmentStatus::Pending,
            attempts: 0,
            last_error: None,
            audio_path: None,
            duration_seconds: None,
        }
    }

    /// Forget an interrupted or failed attempt; exhausted segments get a fresh budget.
    ///
    /// An InFlight call never returned, so it is given back and redone.
    pub fn reset_for_resume(&mut self) -> bool {
        match self.status {
            SegmentStatus::InFlight => {
                self.status = SegmentStatus::Pending;
                self.attempts = self.attempts.saturating_sub(1);
                true
            }
            SegmentStatus::Failed(_) => {
                self.status = SegmentStatus::Pending;
                true
            }
            SegmentStatus::Exhausted => {
                self.status = SegmentStatus::Pending;
                self.attempts = 0;
                true
            }
            SegmentStatus::Pending | SegmentStatus::Succeeded => false,
        }
    }

    pub fn to_record(&self, job_id: &str) -> SegmentRecord {
        SegmentRecord {
            job_id: job_id.to_string(),
            segment_index: self.index as i64,
            status: self.status.as_str().to_string(),
            attempts: i64::from(self.attempts),
            last_error: self.last_error.clone(),
            audio_path: self.audio_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            duration_seconds: self.duration_seconds,
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn from_record(record: &SegmentRecord) -> Result<Self, PersistenceError> {
        let index = usize::try_from(record.segment_index)
            .map_err(|_| PersistenceError::Corrupt(format!("negative segment index {}", record.segment_index)))?;
        Ok(Self {
            index,
            status: SegmentStatus::from_parts(&record.status, record.last_error.as_deref())?,
            attempts: u32::try_from(record.attempts).unwrap_or(0),
            last_error: record.last_error.clone(),
            audio_path: record.audio_path.as_ref().map(PathBuf::from),
            duration_seconds: record.duration_seconds,
        })
    }
}

/// Identity of a job, everything that decides whether earlier audio is reusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub source_path: PathBuf,
    pub source_hash: String,
    pub provider: String,
    pub model: String,
    pub voice: String,
    pub max_unit_size: usize,
}

/// Progress of one document conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub source_path: PathBuf,
    pub source_hash: String,
    pub voice: String,
    pub provider: String,
    pub model: String,
    pub max_unit_size: usize,
    pub status: JobStatus,
    /// One entry per segment, indexed by segment index
    pub segments: Vec<SegmentState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    /// Fresh job with every segment pending
    pub fn new(job_id: impl Into<String>, identity: &JobIdentity, total_segments: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            source_path: identity.source_path.clone(),
            source_hash: identity.source_hash.clone(),
            voice: identity.voice.clone(),
            provider: identity.provider.clone(),
            model: identity.model.clone(),
            max_unit_size: identity.max_unit_size,
            status: JobStatus::InProgress,
            segments: (0..total_segments).map(SegmentState::pending).collect(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, index: usize) -> Option<&SegmentState> {
        self.segments.get(index)
    }

    pub fn segment_mut(&mut self, index: usize) -> Option<&mut SegmentState> {
        self.segments.get_mut(index)
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(|s| s == &SegmentStatus::Succeeded)
    }

    pub fn exhausted_count(&self) -> usize {
        self.count(|s| s == &SegmentStatus::Exhausted)
    }

    fn count(&self, predicate: impl Fn(&SegmentStatus) -> bool) -> usize {
        self.segments.iter().filter(|s| predicate(&s.status)).count()
    }

    /// Indices that still need a synthesis call
    pub fn pending_indices(&self) -> Vec<usize> {
        self.segments
            .iter()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.index)
            .collect()
    }

    /// Every segment is Succeeded or Exhausted
    pub fn is_settled(&self) -> bool {
        self.segments.iter().all(|s| s.status.is_terminal())
    }

    pub fn completion_percentage(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        (self.succeeded_count() as f64 / self.segments.len() as f64) * 100.0
    }

    /// Apply the resume rules to every segment; returns how many changed
    pub fn reset_for_resume(&mut self) -> usize {
        self.segments.iter_mut().map(|s| s.reset_for_resume()).filter(|changed| *changed).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            id: self.job_id.clone(),
            source_path: self.source_path.to_string_lossy().to_string(),
            source_hash: self.source_hash.clone(),
            voice: self.voice.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            max_unit_size: self.max_unit_size as i64,
            total_segments: self.segments.len() as i64,
            status: self.status,
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
            completed_at: self.completed_at.map(|t| t.to_rfc3339()),
        }
    }

    pub fn segment_records(&self) -> Vec<SegmentRecord> {
        self.segments.iter().map(|s| s.to_record(&self.job_id)).collect()
    }

    /// Rebuild from stored rows; segment rows must cover 0..total exactly once
    pub fn from_records(job: JobRecord, segments: &[SegmentRecord]) -> Result<Self, PersistenceError> {
        let total = usize::try_from(job.total_segments)
            .map_err(|_| PersistenceError::Corrupt(format!("negative segment total for job {}", job.id)))?;

        let mut states: Vec<Option<SegmentState>> = vec![None; total];
        for record in segments {
            let state = SegmentState::from_record(record)?;
            let slot = states.get_mut(state.index).ok_or_else(|| {
                PersistenceError::Corrupt(format!(
                    "segment {} out of range for job {} ({} segments)",
                    state.index, job.id, total
                ))
            })?;
            *slot = Some(state);
        }

        let segments = states
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                s.ok_or_else(|| PersistenceError::Corrupt(format!("segment {} missing for job {}", i, job.id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            job_id: job.id,
            source_path: PathBuf::from(job.source_path),
            source_hash: job.source_hash,
            voice: job.voice,
            provider: job.provider,
            model: job.model,
            max_unit_size: usize::try_from(job.max_unit_size).unwrap_or(0),
            status: job.status,
            segments,
            created_at: parse_timestamp(&job.created_at)?,
            updated_at: parse_timestamp(&job.updated_at)?,
            completed_at: job.completed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

/// Summary line for `jobs list`
impl fmt::Display for JobProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}/{}, {}/{} segments, {:.1}%, {})",
            self.job_id,
            self.source_path.display(),
            self.provider,
            self.voice,
            self.succeeded_count(),
            self.total_segments(),
            self.completion_percentage(),
            self.status
        )
    }
}
