/*!
 * Integration tests for converting documents through the controller
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use narrador::app_config::OutputMode;
use narrador::app_controller::{Controller, ExitStatus};
use narrador::job::{JobStatus, MemoryProgressStore, ProgressStore};
use narrador::output::assembler::wav_duration;
use narrador::providers::mock::MockSynthesizer;
use crate::common;

fn wav_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.retain(|p| p.extension().is_some_and(|ext| ext == "wav"));
    files.sort();
    files
}

fn segment_count(controller: &Controller, input: &Path) -> usize {
    let (normalizer, normalized) = controller.prepare_text(input).unwrap();
    controller.segment_text(&normalizer, normalized.text.as_str()).len()
}

async fn only_job_status(store: &MemoryProgressStore) -> JobStatus {
    let jobs = store.list().await.unwrap();
    assert_eq!(jobs.len(), 1);
    jobs[0].status
}

/// Test a full conversion into a single artifact
#[tokio::test]
async fn test_run_workingProvider_shouldProduceSingleArtifact() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let mock = MockSynthesizer::working();
    let store = Arc::new(MemoryProgressStore::new());
    let controller =
        common::test_controller(common::test_config(&out_dir), mock.clone(), store.clone(), &segments_root);
    let expected_segments = segment_count(&controller, &input);

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert!(expected_segments > 1);
    assert_eq!(mock.calls(), expected_segments);
    assert_eq!(wav_files(&out_dir), vec![out_dir.join("historia.wav")]);
    assert!(wav_duration(&out_dir.join("historia.wav"))? > 0.0);
    assert_eq!(only_job_status(&store).await, JobStatus::Completed);

    // segment audio is dropped after a gap-free assembly
    assert!(wav_files(&segments_root).is_empty());
    let leftover_dirs = std::fs::read_dir(&segments_root).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftover_dirs, 0);
    Ok(())
}

/// Test that a finished document is not synthesized twice
#[tokio::test]
async fn test_run_alreadyCompleted_shouldSkipSynthesis() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let mock = MockSynthesizer::working();
    let store = Arc::new(MemoryProgressStore::new());
    let controller = common::test_controller(
        common::test_config(&temp_dir.path().join("out")),
        mock.clone(),
        store,
        &temp_dir.path().join("segments"),
    );

    controller.run(&input, false, &CancellationToken::new()).await?;
    let calls_after_first_run = mock.calls();
    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(mock.calls(), calls_after_first_run);
    Ok(())
}

/// Test that a rejected segment leaves a gap but keeps the rest
#[tokio::test]
async fn test_run_rejectedSegment_shouldCompleteWithGaps() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let segments_root = temp_dir.path().join("segments");
    let store = Arc::new(MemoryProgressStore::new());
    let controller = common::test_controller(
        common::test_config(&out_dir),
        MockSynthesizer::rejecting("feira"),
        store.clone(),
        &segments_root,
    );

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::CompletedWithGaps);
    assert_eq!(status.code(), 2);
    assert!(!wav_files(&out_dir).is_empty());
    assert_eq!(only_job_status(&store).await, JobStatus::CompletedWithGaps);

    let job = store.list().await?.remove(0);
    let exhausted: Vec<_> = job.segments.iter().filter(|s| s.last_error.is_some()).collect();
    assert!(!exhausted.is_empty());
    // fatal errors are not retried
    assert!(exhausted.iter().all(|s| s.attempts == 1));
    // kept so a later run only has to fill the gaps
    assert!(!wav_files(&segments_root.join(&job.job_id)).is_empty());
    Ok(())
}

/// Test that a provider that never answers fails the conversion
#[tokio::test]
async fn test_run_failingProvider_shouldFailWithoutOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let mock = MockSynthesizer::failing();
    let store = Arc::new(MemoryProgressStore::new());
    let config = common::test_config(&out_dir);
    let max_attempts = config.synthesis.common.max_attempts as usize;
    let controller =
        common::test_controller(config, mock.clone(), store.clone(), &temp_dir.path().join("segments"));
    let expected_segments = segment_count(&controller, &input);

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Failed);
    assert_eq!(mock.calls(), expected_segments * max_attempts);
    assert!(wav_files(&out_dir).is_empty());
    assert_eq!(only_job_status(&store).await, JobStatus::Failed);
    Ok(())
}

/// Test one artifact per segment
#[tokio::test]
async fn test_run_separateMode_shouldWriteOneFilePerSegment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let mut config = common::test_config(&out_dir);
    config.output.mode = OutputMode::Separate;
    let controller = common::test_controller(
        config,
        MockSynthesizer::working(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );
    let expected_segments = segment_count(&controller, &input);

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    let files = wav_files(&out_dir);
    assert_eq!(files.len(), expected_segments);
    assert_eq!(files[0], out_dir.join("historia_part01.wav"));
    Ok(())
}

/// Test splitting the output by the duration ceiling
#[tokio::test]
async fn test_run_durationCeiling_shouldSplitIntoParts() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let mut config = common::test_config(&out_dir);
    // mock audio runs 0.06 s per character, so an 80 character segment is about 5 s
    config.output.max_artifact_duration_secs = 6.0;
    let controller = common::test_controller(
        config,
        MockSynthesizer::working(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );

    let status = controller.run(&input, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    let files = wav_files(&out_dir);
    assert!(files.len() > 1);
    for file in &files {
        assert!(wav_duration(file)? <= 6.0 + 1e-6);
    }
    Ok(())
}

/// Test converting every document in a directory
#[tokio::test]
async fn test_run_folder_shouldConvertEachDocument() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let books = temp_dir.path().join("livros");
    std::fs::create_dir_all(&books)?;
    common::create_test_file(&books, "um.txt", common::SAMPLE_STORY)?;
    common::create_test_file(&books, "dois.md", "# Outra história\n\nO gato dormiu a tarde inteira na janela.")?;
    common::create_test_file(&books, "notas.json", "{}")?;
    let out_dir = temp_dir.path().join("out");
    let controller = common::test_controller(
        common::test_config(&out_dir),
        MockSynthesizer::working(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );

    let status = controller.run(&books, false, &CancellationToken::new()).await?;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(wav_files(&out_dir), vec![out_dir.join("dois.wav"), out_dir.join("um.wav")]);
    Ok(())
}

/// Test writing the speakable text only
#[test]
fn test_normalizeOnly_shouldWriteSpeakableText() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let controller = common::test_controller(
        common::test_config(&out_dir),
        MockSynthesizer::working(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );

    let output = controller.normalize_only(&input)?;

    assert_eq!(output, out_dir.join("historia_speakable.txt"));
    let text = std::fs::read_to_string(&output)?;
    assert!(text.contains("Doutor Silva"));
    assert!(text.contains("primeiro lugar"));
    assert!(text.starts_with("Capítulo 1"));
    Ok(())
}

/// Test the chapter index in the exported text
#[test]
fn test_normalizeOnly_chapterIndex_shouldListChapters() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "historia.txt", common::SAMPLE_STORY)?;
    let out_dir = temp_dir.path().join("out");
    let mut config = common::test_config(&out_dir);
    config.normalization.chapter_index = true;

    let output = Controller::normalize_document(&config, &input)?;

    let text = std::fs::read_to_string(&output)?;
    assert!(text.starts_with("Índice. Capítulo 1: O Começo.\n\nCapítulo 1. O Começo.\n\n"));
    assert_eq!(text.matches("Índice.").count(), 1);
    Ok(())
}

/// Test that an empty document is an input error
#[test]
fn test_run_emptyDocument_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "vazio.txt", "\n  \n")?;
    let mock = MockSynthesizer::working();
    let controller = common::test_controller(
        common::test_config(&temp_dir.path().join("out")),
        mock.clone(),
        Arc::new(MemoryProgressStore::new()),
        &temp_dir.path().join("segments"),
    );

    let result = tokio_test::block_on(async { controller.run(&input, false, &CancellationToken::new()).await });

    assert!(result.is_err(), "an empty document should not be converted");
    assert_eq!(mock.calls(), 0);
    Ok(())
}
