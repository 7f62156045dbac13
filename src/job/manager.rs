/*!
 * Job lifecycle: identity, resume decisions, maintenance.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::errors::PersistenceError;
use crate::normalizer::NORMALIZER_REVISION;

use super::models::{JobIdentity, JobProgress, JobStatus, SegmentStatus};
use super::store::ProgressStore;

/// Hex characters kept from the identity digest
const JOB_ID_LEN: usize = 16;

/// Outcome of looking for earlier progress
#[derive(Debug)]
pub enum ResumeResult {
    /// No earlier job; a fresh one was stored
    Created(JobProgress),
    /// Earlier progress is reused
    Resumed {
        progress: JobProgress,
        /// Segments put back to pending
        reset_segments: usize,
    },
    /// The job already finished without gaps
    AlreadyCompleted(JobProgress),
    /// Earlier progress was discarded and a fresh job stored
    Restarted { progress: JobProgress, reason: String },
}

impl ResumeResult {
    pub fn progress(&self) -> &JobProgress {
        match self {
            Self::Created(progress) | Self::AlreadyCompleted(progress) => progress,
            Self::Resumed { progress, .. } | Self::Restarted { progress, .. } => progress,
        }
    }

    pub fn into_progress(self) -> JobProgress {
        match self {
            Self::Created(progress) | Self::AlreadyCompleted(progress) => progress,
            Self::Resumed { progress, .. } | Self::Restarted { progress, .. } => progress,
        }
    }

    /// Whether synthesis should run
    pub fn can_proceed(&self) -> bool {
        !matches!(self, Self::AlreadyCompleted(_))
    }
}

/// Manages jobs in a progress store
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn ProgressStore>,
}

impl JobManager {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn ProgressStore> {
        self.store.clone()
    }

    /// Deterministic job id for an identity
    pub fn job_id(identity: &JobIdentity) -> String {
        let mut hasher = Sha256::new();
        for part in [
            identity.source_hash.as_str(),
            identity.provider.as_str(),
            identity.model.as_str(),
            identity.voice.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(identity.max_unit_size.to_le_bytes());
        hasher.update(NORMALIZER_REVISION.to_le_bytes());

        let digest = format!("{:x}", hasher.finalize());
        digest[..JOB_ID_LEN].to_string()
    }

    /// Build the identity of a conversion, hashing the input file
    pub async fn identify(
        path: &Path,
        provider: &str,
        model: &str,
        voice: &str,
        max_unit_size: usize,
    ) -> Result<JobIdentity> {
        Ok(JobIdentity {
            source_path: path.to_path_buf(),
            source_hash: Self::hash_file(path).await?,
            provider: provider.to_string(),
            model: model.to_string(),
            voice: voice.to_string(),
            max_unit_size,
        })
    }

    /// SHA-256 of a file's contents
    pub async fn hash_file(path: &Path) -> Result<String> {
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let mut file = std::fs::File::open(&path)
                .with_context(|| format!("Failed to open file for hashing: {:?}", path))?;

            let mut hasher = Sha256::new();
            let mut buffer = [0u8; 8192];

            loop {
                let bytes_read = file.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }

            Ok(format!("{:x}", hasher.finalize()))
        })
        .await
        .context("File hashing task panicked")?
    }

    /// Reuse earlier progress for this identity or start a new job.
    ///
    /// `fresh` discards earlier progress. A stored job whose segment count
    /// differs from `total_segments` cannot be matched index by index and is
    /// restarted.
    pub async fn resume_or_create(
        &self,
        identity: &JobIdentity,
        total_segments: usize,
        fresh: bool,
    ) -> Result<ResumeResult, PersistenceError> {
        let job_id = Self::job_id(identity);

        let Some(mut existing) = self.store.load(&job_id).await? else {
            let progress = JobProgress::new(&job_id, identity, total_segments);
            self.store.save(&progress).await?;
            info!("Created job {} ({} segments)", job_id, total_segments);
            return Ok(ResumeResult::Created(progress));
        };

        let restart_reason = if fresh {
            Some("fresh start requested".to_string())
        } else if existing.total_segments() != total_segments {
            Some(format!(
                "segment count changed from {} to {}",
                existing.total_segments(),
                total_segments
            ))
        } else {
            None
        };

        if let Some(reason) = restart_reason {
            warn!("Restarting job {}: {}", job_id, reason);
            self.store.delete(&job_id).await?;
            let progress = JobProgress::new(&job_id, identity, total_segments);
            self.store.save(&progress).await?;
            return Ok(ResumeResult::Restarted { progress, reason });
        }

        if existing.status == JobStatus::Completed {
            info!("Job {} is already complete", job_id);
            return Ok(ResumeResult::AlreadyCompleted(existing));
        }

        let mut reset_segments = existing.reset_for_resume();

        // audio deleted from disk has to be synthesized again; silent segments have none
        for segment in existing.segments.iter_mut() {
            if segment.status != SegmentStatus::Succeeded {
                continue;
            }
            let missing = segment.audio_path.as_deref().is_some_and(|p| !p.is_file());
            if missing {
                debug!("Audio for segment {} is missing; resetting", segment.index);
                segment.status = SegmentStatus::Pending;
                segment.attempts = 0;
                segment.audio_path = None;
                segment.duration_seconds = None;
                reset_segments += 1;
            }
        }

        // a new source path for identical contents is fine
        existing.source_path = identity.source_path.clone();
        existing.status = JobStatus::InProgress;
        existing.completed_at = None;
        existing.touch();
        self.store.save(&existing).await?;

        info!(
            "Resuming job {} ({}/{} segments done, {} reset)",
            job_id,
            existing.succeeded_count(),
            existing.total_segments(),
            reset_segments
        );

        Ok(ResumeResult::Resumed { progress: existing, reset_segments })
    }

    /// Set the final status of a job and store it
    pub async fn finish(&self, progress: &mut JobProgress, status: JobStatus) -> Result<(), PersistenceError> {
        progress.status = status;
        progress.touch();
        if status.is_finished() {
            progress.completed_at = Some(progress.updated_at);
        }
        self.store.save(progress).await
    }

    pub async fn list(&self) -> Result<Vec<JobProgress>, PersistenceError> {
        self.store.list().await
    }

    /// Find a job by full id or unique prefix
    pub async fn find(&self, id_or_prefix: &str) -> Result<Option<JobProgress>, PersistenceError> {
        if let Some(job) = self.store.load(id_or_prefix).await? {
            return Ok(Some(job));
        }

        let mut matches: Vec<JobProgress> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|job| job.job_id.starts_with(id_or_prefix))
            .collect();

        match matches.len() {
            1 => Ok(matches.pop()),
            0 => Ok(None),
            n => {
                warn!("Job id prefix '{}' is ambiguous ({} matches)", id_or_prefix, n);
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, job_id: &str) -> Result<bool, PersistenceError> {
        info!("Deleting job {}", job_id);
        self.store.delete(job_id).await
    }

    /// Drop finished jobs older than `days` days
    pub async fn cleanup(&self, days: i64) -> Result<usize, PersistenceError> {
        info!("Cleaning up finished jobs older than {} days", days);
        self.store.delete_finished_older_than(days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::store::MemoryProgressStore;
    use std::path::PathBuf;

    fn identity() -> JobIdentity {
        JobIdentity {
            source_path: PathBuf::from("/livros/a.txt"),
            source_hash: "0f0f".to_string(),
            provider: "mock".to_string(),
            model: "silence".to_string(),
            voice: "pt-BR-FranciscaNeural".to_string(),
            max_unit_size: 2000,
        }
    }

    fn manager() -> (JobManager, Arc<MemoryProgressStore>) {
        let store = Arc::new(MemoryProgressStore::new());
        (JobManager::new(store.clone()), store)
    }

    #[test]
    fn test_jobId_shouldBeStableAndSensitiveToIdentity() {
        let a = JobManager::job_id(&identity());
        assert_eq!(a.len(), 16);
        assert_eq!(a, JobManager::job_id(&identity()));

        let mut other_voice = identity();
        other_voice.voice = "nova".to_string();
        assert_ne!(a, JobManager::job_id(&other_voice));

        let mut other_size = identity();
        other_size.max_unit_size = 1000;
        assert_ne!(a, JobManager::job_id(&other_size));

        // the path is not part of the identity
        let mut moved = identity();
        moved.source_path = PathBuf::from("/elsewhere/a.txt");
        assert_eq!(a, JobManager::job_id(&moved));
    }

    #[tokio::test]
    async fn test_hashFile_shouldMatchKnownDigest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();

        let hash = JobManager::hash_file(&path).await.unwrap();
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[tokio::test]
    async fn test_resumeOrCreate_newJob_shouldCreate() {
        let (manager, store) = manager();
        let result = manager.resume_or_create(&identity(), 3, false).await.unwrap();

        assert!(matches!(result, ResumeResult::Created(_)));
        let job_id = result.progress().job_id.clone();
        assert_eq!(store.snapshot(&job_id).unwrap().total_segments(), 3);
    }

    #[tokio::test]
    async fn test_resumeOrCreate_existingJob_shouldResetInterruptedSegments() {
        let (manager, store) = manager();
        let created = manager.resume_or_create(&identity(), 3, false).await.unwrap().into_progress();

        let mut interrupted = created.clone();
        interrupted.status = JobStatus::Paused;
        interrupted.segments[0].status = SegmentStatus::InFlight;
        interrupted.segments[1].status = SegmentStatus::Exhausted;
        interrupted.segments[1].attempts = 3;
        store.save(&interrupted).await.unwrap();

        let result = manager.resume_or_create(&identity(), 3, false).await.unwrap();
        let ResumeResult::Resumed { progress, reset_segments } = result else {
            panic!("expected a resumed job");
        };
        assert_eq!(reset_segments, 2);
        assert_eq!(progress.status, JobStatus::InProgress);
        assert_eq!(progress.segments[1].attempts, 0);
        assert_eq!(progress.pending_indices(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_resumeOrCreate_missingAudio_shouldResynthesize() {
        let (manager, store) = manager();
        let mut progress = manager.resume_or_create(&identity(), 2, false).await.unwrap().into_progress();
        progress.segments[0].status = SegmentStatus::Succeeded;
        progress.segments[0].audio_path = Some(PathBuf::from("/nonexistent/seg_00000.wav"));
        store.save(&progress).await.unwrap();

        let resumed = manager.resume_or_create(&identity(), 2, false).await.unwrap().into_progress();
        assert_eq!(resumed.segments[0].status, SegmentStatus::Pending);
        assert!(resumed.segments[0].audio_path.is_none());
    }

    #[tokio::test]
    async fn test_resumeOrCreate_silentSegment_shouldStaySucceeded() {
        let (manager, store) = manager();
        let mut progress = manager.resume_or_create(&identity(), 2, false).await.unwrap().into_progress();
        progress.segments[0].status = SegmentStatus::Succeeded;
        progress.segments[0].duration_seconds = Some(0.0);
        store.save(&progress).await.unwrap();

        let resumed = manager.resume_or_create(&identity(), 2, false).await.unwrap().into_progress();
        assert_eq!(resumed.segments[0].status, SegmentStatus::Succeeded);
        assert_eq!(resumed.pending_indices(), vec![1]);
    }

    #[tokio::test]
    async fn test_resumeOrCreate_completedJob_shouldNotProceed() {
        let (manager, _store) = manager();
        let mut progress = manager.resume_or_create(&identity(), 1, false).await.unwrap().into_progress();
        manager.finish(&mut progress, JobStatus::Completed).await.unwrap();

        let result = manager.resume_or_create(&identity(), 1, false).await.unwrap();
        assert!(!result.can_proceed());
    }

    #[tokio::test]
    async fn test_resumeOrCreate_freshOrChangedTotal_shouldRestart() {
        let (manager, _store) = manager();
        manager.resume_or_create(&identity(), 2, false).await.unwrap();

        let fresh = manager.resume_or_create(&identity(), 2, true).await.unwrap();
        assert!(matches!(fresh, ResumeResult::Restarted { .. }));

        let changed = manager.resume_or_create(&identity(), 5, false).await.unwrap();
        let ResumeResult::Restarted { progress, reason } = changed else {
            panic!("expected a restart");
        };
        assert_eq!(progress.total_segments(), 5);
        assert!(reason.contains("segment count"));
    }

    #[tokio::test]
    async fn test_find_shouldAcceptUniquePrefix() {
        let (manager, _store) = manager();
        let job_id = manager.resume_or_create(&identity(), 1, false).await.unwrap().progress().job_id.clone();

        let found = manager.find(&job_id[..6]).await.unwrap().expect("prefix should match");
        assert_eq!(found.job_id, job_id);
        assert!(manager.find("zzzz").await.unwrap().is_none());
    }
}
