/*!
 * Tests for job progress persistence
 */

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use narrador::job::{
    JobIdentity, JobManager, JobStatus, ProgressStore, ResumeResult, SegmentStatus, SqliteProgressStore,
};
use crate::common;

fn identity(source_path: PathBuf) -> JobIdentity {
    JobIdentity {
        source_path,
        source_hash: "d1c2".to_string(),
        provider: "mock".to_string(),
        model: "silence".to_string(),
        voice: "pt-BR-FranciscaNeural".to_string(),
        max_unit_size: 80,
    }
}

/// Test that progress written by one store is resumed by a store opened later
#[tokio::test]
async fn test_sqliteStore_reopened_shouldResumeWhereItStopped() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("db").join("narrador.db");
    let audio_path = common::create_test_file(temp_dir.path(), "seg_00000.wav", "stand-in")?;
    let identity = identity(temp_dir.path().join("livro.txt"));

    {
        let manager = JobManager::new(Arc::new(SqliteProgressStore::open(&db_path)?));
        let mut progress = manager.resume_or_create(&identity, 3, false).await?.into_progress();

        let first = progress.segment_mut(0).unwrap();
        first.status = SegmentStatus::Succeeded;
        first.attempts = 1;
        first.audio_path = Some(audio_path.clone());
        first.duration_seconds = Some(1.25);
        let second = progress.segment_mut(1).unwrap();
        second.status = SegmentStatus::InFlight;
        second.attempts = 2;

        let store = manager.store();
        store.save_segment(&progress.job_id, progress.segment(0).unwrap()).await?;
        store.save_segment(&progress.job_id, progress.segment(1).unwrap()).await?;
    }

    let manager = JobManager::new(Arc::new(SqliteProgressStore::open(&db_path)?));
    let resume = manager.resume_or_create(&identity, 3, false).await?;

    let ResumeResult::Resumed { progress, reset_segments } = resume else {
        panic!("expected a resumed job");
    };
    assert_eq!(reset_segments, 1);
    assert_eq!(progress.status, JobStatus::InProgress);
    assert_eq!(progress.succeeded_count(), 1);
    assert_eq!(progress.segment(0).unwrap().audio_path.as_deref(), Some(audio_path.as_path()));
    assert_eq!(progress.segment(1).unwrap().status, SegmentStatus::Pending);
    assert_eq!(progress.pending_indices(), vec![1, 2]);
    Ok(())
}

/// Test that succeeded segments without audio on disk are synthesized again
#[tokio::test]
async fn test_resume_missingAudio_shouldResetSegment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let manager = JobManager::new(Arc::new(SqliteProgressStore::in_memory()?));
    let identity = identity(temp_dir.path().join("livro.txt"));

    let mut progress = manager.resume_or_create(&identity, 2, false).await?.into_progress();
    for segment in progress.segments.iter_mut() {
        segment.status = SegmentStatus::Succeeded;
        segment.attempts = 1;
        segment.audio_path = Some(temp_dir.path().join(format!("seg_{:05}.wav", segment.index)));
        segment.duration_seconds = Some(1.0);
    }
    manager.store().save(&progress).await?;

    let progress = manager.resume_or_create(&identity, 2, false).await?.into_progress();

    assert_eq!(progress.pending_indices(), vec![0, 1]);
    assert!(progress.segments.iter().all(|s| s.attempts == 0 && s.audio_path.is_none()));
    Ok(())
}

/// Test that a changed segment count discards earlier progress
#[tokio::test]
async fn test_resume_segmentCountChanged_shouldRestart() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let manager = JobManager::new(Arc::new(SqliteProgressStore::in_memory()?));
    let identity = identity(temp_dir.path().join("livro.txt"));

    manager.resume_or_create(&identity, 4, false).await?;
    let resume = manager.resume_or_create(&identity, 5, false).await?;

    assert!(matches!(resume, ResumeResult::Restarted { .. }));
    assert_eq!(resume.progress().total_segments(), 5);
    Ok(())
}

/// Test finding jobs by a prefix of their id
#[tokio::test]
async fn test_find_byPrefix_shouldReturnJob() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let manager = JobManager::new(Arc::new(SqliteProgressStore::in_memory()?));
    let identity = identity(temp_dir.path().join("livro.txt"));

    let job_id = manager.resume_or_create(&identity, 1, false).await?.progress().job_id.clone();
    let found = manager.find(&job_id[..8]).await?;

    assert_eq!(found.map(|job| job.job_id), Some(job_id));
    assert!(manager.find("zzzz").await?.is_none());
    Ok(())
}
