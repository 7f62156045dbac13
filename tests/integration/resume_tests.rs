/*!
 * Integration tests for interrupting and resuming conversions
 */

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use narrador::app_controller::ExitStatus;
use narrador::job::{JobStatus, MemoryProgressStore, ProgressStore, SegmentStatus, SqliteProgressStore};
use narrador::providers::mock::MockSynthesizer;
use crate::common;

/// Test that an interrupted conversion resumes without repeating work
#[tokio::test]
async fn test_run_interruptedThenResumed_shouldFinishEachSegmentOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let mock = MockSynthesizer::working();
    let controller = common::test_controller(common::test_config(&out_dir), mock.clone(), store.clone(), &segments_root);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let status = controller.run(&input, false, &cancelled).await?;

    assert_eq!(status, ExitStatus::Interrupted);
    assert_eq!(status.code(), 130);
    assert_eq!(mock.calls(), 0);
    let job = store.list().await?.remove(0);
    assert_eq!(job.status, JobStatus::Paused);
    assert!(job.segments.iter().all(|s| s.status == SegmentStatus::Pending));
    assert!(!out_dir.join("historia.wav").exists());

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(mock.calls(), job.total_segments());
    assert!(out_dir.join("historia.wav").is_file());
    Ok(())
}

/// Test cancelling while segments are being synthesized
#[tokio::test]
async fn test_run_cancelledMidway_shouldKeepFinishedSegments() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let mut config = common::test_config(&out_dir);
    config.synthesis.active_provider_config_mut().concurrent_requests = 1;

    let controller =
        common::test_controller(config.clone(), MockSynthesizer::slow(30), store.clone(), &segments_root);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let status = controller.run(&input, false, &cancel).await?;

    assert_eq!(status, ExitStatus::Interrupted);
    let job = store.list().await?.remove(0);
    let finished: HashSet<usize> = job
        .segments
        .iter()
        .filter(|s| s.status == SegmentStatus::Succeeded)
        .map(|s| s.index)
        .collect();
    assert!(!finished.is_empty());
    assert!(finished.len() < job.total_segments());

    let fast = MockSynthesizer::working();
    let resumed = common::test_controller(config, fast.clone(), store.clone(), &segments_root);
    let status = resumed.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(fast.calls(), job.total_segments() - finished.len());
    Ok(())
}

/// Test that a later run fills the gaps of an earlier one
#[tokio::test]
async fn test_run_afterGaps_shouldOnlySynthesizeMissingSegments() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let config = common::test_config(&out_dir);

    let rejecting = common::test_controller(
        config.clone(),
        MockSynthesizer::rejecting("feira"),
        store.clone(),
        &segments_root,
    );
    assert_eq!(
        rejecting.run(&input, false, &CancellationToken::new()).await?,
        ExitStatus::CompletedWithGaps
    );
    let job = store.list().await?.remove(0);
    let missing = job.exhausted_count();

    let mock = MockSynthesizer::working();
    let working = common::test_controller(config, mock.clone(), store.clone(), &segments_root);
    let status = working.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(mock.calls(), missing);
    assert_eq!(store.list().await?[0].status, JobStatus::Completed);
    assert!(out_dir.join("historia.wav").is_file());
    Ok(())
}

/// Test that --fresh throws earlier progress away
#[tokio::test]
async fn test_run_fresh_shouldSynthesizeEverythingAgain() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let mock = MockSynthesizer::working();
    let controller = common::test_controller(
        common::test_config(&temp_dir.path().join("out")),
        mock.clone(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );

    controller.run(&input, false, &CancellationToken::new()).await?;
    let first_run_calls = mock.calls();
    let status = controller.run(&input, true, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(mock.calls(), first_run_calls * 2);
    Ok(())
}

/// Test resuming from the SQLite database after the process went away
#[tokio::test]
async fn test_run_sqliteStore_shouldResumeAcrossControllers() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let db_path = temp_dir.path().join("narrador.db");
    let config = common::test_config(&out_dir);

    let missing = {
        let store = Arc::new(SqliteProgressStore::open(&db_path)?);
        let controller = narrador::Controller::with_components(
            config.clone(),
            Arc::new(MockSynthesizer::rejecting("feira")),
            store.clone(),
            &segments_root,
        );
        controller.run(&input, false, &CancellationToken::new()).await?;
        store.list().await?[0].exhausted_count()
    };
    assert!(missing > 0);

    let store = Arc::new(SqliteProgressStore::open(&db_path)?);
    let mock = MockSynthesizer::working();
    let controller = narrador::Controller::with_components(config, Arc::new(mock.clone()), store.clone(), &segments_root);
    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(mock.calls(), missing);
    assert_eq!(store.list().await?[0].status, JobStatus::Completed);
    Ok(())
}

/// Test deleting a job together with its segment audio
#[tokio::test]
async fn test_deleteJob_shouldRemoveProgressAndAudio() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let segments_root = temp_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let controller = common::test_controller(
        common::test_config(&temp_dir.path().join("out")),
        MockSynthesizer::rejecting("feira"),
        store.clone(),
        &segments_root,
    );
    controller.run(&input, false, &CancellationToken::new()).await?;
    let job_id = store.list().await?.remove(0).job_id;
    assert!(segments_root.join(&job_id).is_dir());

    assert!(controller.delete_job(&job_id[..6]).await?);

    assert!(store.list().await?.is_empty());
    assert!(!segments_root.join(&job_id).exists());
    assert!(!controller.delete_job(&job_id).await?);
    Ok(())
}

/// Test that an interrupted and resumed conversion writes the same artifact as a straight one
#[tokio::test]
async fn test_run_resumedConversion_shouldMatchUninterruptedOutput() -> Result<()> {
    let straight_dir = common::create_temp_dir()?;
    let straight_input = common::create_test_file(straight_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let straight_out = straight_dir.path().join("out");
    let straight = common::test_controller(
        common::test_config(&straight_out),
        MockSynthesizer::working(),
        Arc::new(MemoryProgressStore::new()),
        &straight_dir.path().join("segments"),
    );
    assert_eq!(
        straight.run(&straight_input, false, &CancellationToken::new()).await?,
        ExitStatus::Success
    );

    let resumed_dir = common::create_temp_dir()?;
    let input = common::create_test_file(resumed_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = resumed_dir.path().join("out");
    let segments_root = resumed_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let mut config = common::test_config(&out_dir);
    config.synthesis.active_provider_config_mut().concurrent_requests = 1;

    let interrupted =
        common::test_controller(config.clone(), MockSynthesizer::slow(30), store.clone(), &segments_root);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    assert_eq!(interrupted.run(&input, false, &cancel).await?, ExitStatus::Interrupted);
    assert!(!out_dir.join("historia.wav").exists());

    let resumed = common::test_controller(config, MockSynthesizer::working(), store, &segments_root);
    assert_eq!(resumed.run(&input, false, &CancellationToken::new()).await?, ExitStatus::Success);

    let expected = std::fs::read(straight_out.join("historia.wav"))?;
    let actual = std::fs::read(out_dir.join("historia.wav"))?;
    assert!(!expected.is_empty());
    assert!(expected == actual, "resumed artifact differs from the uninterrupted one");
    Ok(())
}
