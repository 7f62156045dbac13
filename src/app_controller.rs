use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::extraction::{DocumentExtractor, PlainTextExtractor};
use crate::file_utils::FileManager;
use crate::job::{JobManager, JobProgress, JobStatus, ProgressStore, ResumeResult, SqliteProgressStore};
use crate::normalizer::{NormalizedText, Normalizer};
use crate::output::{OutputArtifact, OutputAssembler, SegmentGap};
use crate::providers::{create_synthesizer, SpeechSynthesizer};
use crate::segmenter::{Segment, Segmenter, SegmenterConfig};
use crate::synthesis::{
    OrchestratorSettings, RunOutcome, SegmentAudioStore, SegmentFailure, SynthesisOrchestrator,
};

// @module: Application controller for document narration

/// Process exit status of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitStatus {
    Success,
    /// Finished, but some segments have no audio
    CompletedWithGaps,
    /// Stopped by the user; running again resumes
    Interrupted,
    /// Nothing usable was produced
    Failed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::CompletedWithGaps => 2,
            Self::Interrupted => 130,
        }
    }
}

/// Result of converting one document
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub source: PathBuf,
    pub job_id: String,
    pub status: ExitStatus,
    pub artifacts: Vec<OutputArtifact>,
    pub gaps: Vec<SegmentGap>,
    pub failures: Vec<SegmentFailure>,
    pub total_segments: usize,
    pub elapsed: Duration,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Speech backend
    synthesizer: Arc<dyn SpeechSynthesizer>,
    // @field: Job progress storage
    store: Arc<dyn ProgressStore>,
    // @field: Root directory of per-segment audio
    segments_root: PathBuf,
}

impl Controller {
    // @method: Create a controller with the backend and store the configuration selects
    pub fn with_config(config: Config) -> Result<Self> {
        let synthesizer = create_synthesizer(&config)?;

        let database_path = match &config.progress.database_path {
            Some(path) => path.clone(),
            None => crate::database::DatabaseConnection::default_database_path()?,
        };
        let store = SqliteProgressStore::open(&database_path)
            .with_context(|| format!("Failed to open progress database {:?}", database_path))?;

        let segments_root = match &config.progress.segments_dir {
            Some(dir) => dir.clone(),
            None => database_path
                .parent()
                .map(|parent| parent.join("segments"))
                .map_or_else(SegmentAudioStore::default_root, Ok)?,
        };

        Ok(Self::with_components(config, synthesizer, Arc::new(store), segments_root))
    }

    // @method: Create a controller from explicit parts (tests, embedding)
    pub fn with_components(
        config: Config,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ProgressStore>,
        segments_root: impl AsRef<Path>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            store,
            segments_root: segments_root.as_ref().to_path_buf(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job_manager(&self) -> JobManager {
        JobManager::new(self.store.clone())
    }

    /// Convert a file, or every supported document under a directory
    pub async fn run(&self, input: &Path, fresh: bool, cancel: &CancellationToken) -> Result<ExitStatus> {
        if input.is_dir() {
            return self.run_folder(input, fresh, cancel).await;
        }
        if !input.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }

        let multi_progress = MultiProgress::new();
        let summary = self.convert_file(input, fresh, cancel, &multi_progress).await?;
        Self::log_summary(&summary);
        Ok(summary.status)
    }

    /// Convert every supported document under `input_dir`, one after another
    pub async fn run_folder(&self, input_dir: &Path, fresh: bool, cancel: &CancellationToken) -> Result<ExitStatus> {
        let documents = FileManager::find_documents(input_dir)?;
        if documents.is_empty() {
            return Err(anyhow!("No supported documents found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        folder_pb.set_style(Self::bar_style("files"));
        folder_pb.set_message("Processing files");

        let mut worst = ExitStatus::Success;
        let mut converted = 0;
        let mut errors = 0;

        for document in &documents {
            if cancel.is_cancelled() {
                worst = worst.max(ExitStatus::Interrupted);
                break;
            }

            let file_name = document
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self.convert_file(document, fresh, cancel, &multi_progress).await {
                Ok(summary) => {
                    Self::log_summary(&summary);
                    worst = worst.max(summary.status);
                    converted += 1;
                }
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    worst = worst.max(ExitStatus::Failed);
                    errors += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!("Folder processing completed: {} converted, {} errors", converted, errors);
        Ok(worst)
    }

    /// Extract and normalize a document
    pub fn prepare_text(&self, input: &Path) -> Result<(Normalizer, NormalizedText)> {
        Self::prepare_document(&self.config, input)
    }

    fn prepare_document(config: &Config, input: &Path) -> Result<(Normalizer, NormalizedText)> {
        let document = PlainTextExtractor
            .extract_text(input)
            .with_context(|| format!("Failed to extract text from {:?}", input))?;

        let normalizer = Normalizer::new(&config.normalization);
        let normalized = normalizer
            .normalize(&document)
            .with_context(|| format!("Failed to normalize {:?}", input))?;

        if let Some(warning) = &normalized.warning {
            warn!("{:?}: {}", input, warning);
        }
        Ok((normalizer, normalized))
    }

    /// Split speakable text with the configured limits
    pub fn segment_text(&self, normalizer: &Normalizer, text: &str) -> Vec<Segment> {
        let segmenter = Segmenter::new(SegmenterConfig {
            max_unit_size: self.config.effective_max_unit_size(),
            terminal_punctuation: self.config.segmentation.terminal_punctuation.clone(),
            protected_abbreviations: normalizer.protected_abbreviations().to_vec(),
        });
        segmenter.segments(text).collect()
    }

    /// Write the speakable text of `input` as `<stem>_speakable.txt`
    pub fn normalize_only(&self, input: &Path) -> Result<PathBuf> {
        Self::normalize_document(&self.config, input)
    }

    /// Like `normalize_only`, without a synthesizer or progress store
    pub fn normalize_document(config: &Config, input: &Path) -> Result<PathBuf> {
        let (_, normalized) = Self::prepare_document(config, input)?;

        let output_dir = config
            .output
            .output_dir
            .clone()
            .or_else(|| input.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let output_path = FileManager::generate_output_path(input, &output_dir, "_speakable", "txt");

        FileManager::write_to_file(&output_path, normalized.text.as_str())?;
        info!(
            "Speakable text written to {:?} ({} chars)",
            output_path,
            normalized.text.as_str().chars().count()
        );
        Ok(output_path)
    }

    /// Run the full pipeline for one document
    pub async fn convert_file(
        &self,
        input: &Path,
        fresh: bool,
        cancel: &CancellationToken,
        multi_progress: &MultiProgress,
    ) -> Result<ConversionSummary> {
        let start_time = Instant::now();

        let (normalizer, normalized) = self.prepare_text(input)?;
        let segments = self.segment_text(&normalizer, normalized.text.as_str());
        debug!("{:?}: {} segments", input, segments.len());

        let synthesis = &self.config.synthesis;
        let voice = self.config.effective_voice();
        let identity = JobManager::identify(
            input,
            &synthesis.provider.to_lowercase_string(),
            &synthesis.get_model(),
            &voice,
            self.config.effective_max_unit_size(),
        )
        .await?;

        let manager = self.job_manager();
        let resume = manager.resume_or_create(&identity, segments.len(), fresh).await?;
        if let ResumeResult::Restarted { reason, .. } = &resume {
            info!("Starting over: {}", reason);
        }
        if let ResumeResult::AlreadyCompleted(progress) = &resume {
            info!(
                "{:?} was already converted (job {}); use --fresh to convert it again",
                input, progress.job_id
            );
            return Ok(ConversionSummary {
                source: input.to_path_buf(),
                job_id: progress.job_id.clone(),
                status: ExitStatus::Success,
                artifacts: Vec::new(),
                gaps: Vec::new(),
                failures: Vec::new(),
                total_segments: progress.total_segments(),
                elapsed: start_time.elapsed(),
            });
        }
        let progress = resume.into_progress();
        let job_id = progress.job_id.clone();

        info!(
            "🚀 {}: {} - {} ({} segments, voice {})",
            FileManager::file_stem(input),
            synthesis.provider.display_name(),
            synthesis.get_model(),
            segments.len(),
            voice
        );

        let orchestrator = SynthesisOrchestrator::new(
            self.synthesizer.clone(),
            self.store.clone(),
            &self.segments_root,
            OrchestratorSettings::from_config(&self.config),
        );

        let progress_bar = multi_progress.add(ProgressBar::new(segments.len() as u64));
        progress_bar.set_style(Self::bar_style("segments"));
        progress_bar.set_message("Synthesizing");
        let pb = progress_bar.clone();

        let report = orchestrator
            .run(progress, &segments, &voice, cancel, move |done, _total| {
                pb.set_position(done as u64);
            })
            .await?;
        progress_bar.finish_and_clear();

        let mut summary = ConversionSummary {
            source: input.to_path_buf(),
            job_id: job_id.clone(),
            status: ExitStatus::Success,
            artifacts: Vec::new(),
            gaps: Vec::new(),
            failures: report.failures.clone(),
            total_segments: segments.len(),
            elapsed: start_time.elapsed(),
        };

        match report.outcome() {
            RunOutcome::Interrupted => {
                summary.status = ExitStatus::Interrupted;
                return Ok(summary);
            }
            RunOutcome::AllExhausted => {
                error!("Every segment of {:?} failed; no audio was produced", input);
                summary.status = ExitStatus::Failed;
                return Ok(summary);
            }
            RunOutcome::Complete | RunOutcome::CompleteWithGaps => {}
        }

        let assembler = OutputAssembler::for_source(&self.config.output, input);
        let plan = assembler.plan(&report.progress, &report.results);
        let assembly = assembler
            .assemble(&plan)
            .await
            .with_context(|| format!("Failed to assemble audio for {:?}", input))?;

        let mut progress = report.progress;
        let final_status = if assembly.has_gaps() {
            JobStatus::CompletedWithGaps
        } else {
            JobStatus::Completed
        };
        manager.finish(&mut progress, final_status).await?;

        if !assembly.has_gaps() && !self.config.output.keep_segment_files {
            let audio_store = orchestrator.audio_store(&job_id);
            match audio_store.remove_all() {
                Ok(_) => debug!("Removed segment audio in {:?}", audio_store.dir()),
                Err(e) => warn!("Failed to remove segment audio in {:?}: {}", audio_store.dir(), e),
            }
        }

        summary.status = if assembly.has_gaps() {
            ExitStatus::CompletedWithGaps
        } else {
            ExitStatus::Success
        };
        summary.artifacts = assembly.artifacts;
        summary.gaps = assembly.gaps;
        summary.elapsed = start_time.elapsed();
        Ok(summary)
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobProgress>> {
        Ok(self.job_manager().list().await?)
    }

    /// Find a job by id or unique id prefix
    pub async fn show_job(&self, id_or_prefix: &str) -> Result<Option<JobProgress>> {
        Ok(self.job_manager().find(id_or_prefix).await?)
    }

    /// Delete a job and its segment audio
    pub async fn delete_job(&self, id_or_prefix: &str) -> Result<bool> {
        let manager = self.job_manager();
        let Some(job) = manager.find(id_or_prefix).await? else {
            return Ok(false);
        };

        let deleted = manager.delete(&job.job_id).await?;
        SegmentAudioStore::for_job(&self.segments_root, &job.job_id)
            .remove_all()
            .with_context(|| format!("Failed to remove segment audio of job {}", job.job_id))?;
        Ok(deleted)
    }

    /// Delete finished jobs older than `days` days, with their segment audio
    pub async fn cleanup_jobs(&self, days: i64) -> Result<usize> {
        let manager = self.job_manager();
        let before: Vec<String> = manager.list().await?.into_iter().map(|j| j.job_id).collect();
        let removed = manager.cleanup(days).await?;

        if removed > 0 {
            let remaining: Vec<String> = manager.list().await?.into_iter().map(|j| j.job_id).collect();
            for job_id in before.iter().filter(|id| !remaining.contains(id)) {
                if let Err(e) = SegmentAudioStore::for_job(&self.segments_root, job_id).remove_all() {
                    warn!("Failed to remove segment audio of job {}: {}", job_id, e);
                }
            }
        }
        Ok(removed)
    }

    fn bar_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
                unit
            ))
            .or_else(|_| {
                ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}")
            })
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    fn log_summary(summary: &ConversionSummary) {
        let elapsed = Self::format_duration(summary.elapsed);
        match summary.status {
            ExitStatus::Success if summary.artifacts.is_empty() => {
                info!("✅ {:?}: nothing to do ({})", summary.source, elapsed);
            }
            ExitStatus::Success => info!("✅ {:?} converted in {}", summary.source, elapsed),
            ExitStatus::CompletedWithGaps => warn!(
                "⚠️ {:?} converted with {} missing segment(s) in {}",
                summary.source,
                summary.failures.len(),
                elapsed
            ),
            ExitStatus::Interrupted => warn!(
                "⏸️ {:?} interrupted; run the same command again to resume job {}",
                summary.source, summary.job_id
            ),
            ExitStatus::Failed => error!("❌ {:?} failed (job {})", summary.source, summary.job_id),
        }

        for artifact in &summary.artifacts {
            info!(
                "   {} ({} segments, {})",
                artifact.path.display(),
                artifact.segment_count,
                Self::format_duration(Duration::from_secs_f64(artifact.duration_seconds))
            );
        }
        for failure in &summary.failures {
            warn!("   segment {}: {}", failure.index, failure.reason);
        }
    }

    /// Format a duration as "1h 2m 3s", "2m 3s" or "3.250s"
    pub fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exitStatus_codes_shouldMatchCli() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
        assert_eq!(ExitStatus::CompletedWithGaps.code(), 2);
        assert_eq!(ExitStatus::Interrupted.code(), 130);
    }

    #[test]
    fn test_exitStatus_worst_shouldPreferFailure() {
        let worst = [ExitStatus::Success, ExitStatus::Failed, ExitStatus::CompletedWithGaps]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(worst, ExitStatus::Failed);
    }

    #[test]
    fn test_formatDuration_shouldPickUnits() {
        assert_eq!(Controller::format_duration(Duration::from_millis(3250)), "3.250s");
        assert_eq!(Controller::format_duration(Duration::from_secs(123)), "2m 3s");
        assert_eq!(Controller::format_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }
}
