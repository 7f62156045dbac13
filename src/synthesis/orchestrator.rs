/*!
 * Drives every pending segment of a job through the synthesizer.
 *
 * Segments are submitted in index order to at most `workers` concurrent
 * calls. Each segment walks `Pending -> InFlight -> Succeeded | Failed`,
 * retries recoverable failures with backoff and ends `Exhausted` when its
 * attempt budget runs out or the backend rejects it outright. A segment with
 * nothing to say succeeds without audio and never reaches the backend. Every
 * transition is stored before the next step starts, so an interrupted run
 * resumes where it stopped.
 */

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::errors::{PersistenceError, SynthesisError};
use crate::job::{JobProgress, JobStatus, ProgressStore, SegmentStatus};
use crate::providers::{SpeechSynthesizer, SynthesisOptions};
use crate::segmenter::Segment;

use super::audio_store::SegmentAudioStore;
use super::concurrency::{ProviderProfile, RequestPacer};
use super::retry::RetryPolicy;
use super::RunReport;

/// Tuning of one orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum concurrent synthesis calls
    pub workers: usize,
    pub retry: RetryPolicy,
    /// Limit for a single synthesis call
    pub call_timeout: Duration,
    /// Minimum spacing between call starts
    pub request_interval: Option<Duration>,
    pub options: SynthesisOptions,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let synthesis = &config.synthesis;
        let profile = ProviderProfile::for_provider(&synthesis.provider);
        Self {
            workers: profile.effective_workers(Some(synthesis.optimal_concurrent_requests())),
            retry: RetryPolicy::from_config(&synthesis.common),
            call_timeout: synthesis.get_call_timeout(),
            request_interval: profile.request_interval(),
            options: SynthesisOptions {
                model: synthesis.get_model(),
                speed: synthesis.common.speed,
            },
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How one segment left the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentOutcome {
    Succeeded,
    /// Whitespace only; settled without a call
    Silent,
    Exhausted,
    /// Stopped by cancellation; stays resumable
    Cancelled,
}

/// Single writer of a job's progress.
///
/// Every mutation happens under the lock and is stored before the lock is
/// released, so the store never lags behind what workers observed.
struct ProgressTracker {
    progress: JobProgress,
    store: Arc<dyn ProgressStore>,
}

impl ProgressTracker {
    async fn persist(&mut self, index: usize) -> Result<(), PersistenceError> {
        self.progress.touch();
        let segment = self
            .progress
            .segment(index)
            .ok_or_else(|| PersistenceError::Corrupt(format!("segment {} out of range", index)))?;
        self.store.save_segment(&self.progress.job_id, segment).await
    }

    fn segment_mut(&mut self, index: usize) -> Result<&mut crate::job::SegmentState, PersistenceError> {
        self.progress
            .segment_mut(index)
            .ok_or_else(|| PersistenceError::Corrupt(format!("segment {} out of range", index)))
    }

    /// Attempts already spent on a segment
    fn attempts(&self, index: usize) -> u32 {
        self.progress.segment(index).map(|s| s.attempts).unwrap_or(0)
    }

    /// Mark the segment InFlight and count the attempt; returns its number
    async fn begin_attempt(&mut self, index: usize) -> Result<u32, PersistenceError> {
        let segment = self.segment_mut(index)?;
        segment.status = SegmentStatus::InFlight;
        segment.attempts += 1;
        let attempt = segment.attempts;
        self.persist(index).await?;
        Ok(attempt)
    }

    async fn succeed(&mut self, index: usize, audio_path: PathBuf, duration: f64) -> Result<(), PersistenceError> {
        let segment = self.segment_mut(index)?;
        segment.status = SegmentStatus::Succeeded;
        segment.last_error = None;
        segment.audio_path = Some(audio_path);
        segment.duration_seconds = Some(duration);
        self.persist(index).await
    }

    /// Settle a segment that has nothing to synthesize
    async fn silence(&mut self, index: usize) -> Result<(), PersistenceError> {
        let segment = self.segment_mut(index)?;
        segment.status = SegmentStatus::Succeeded;
        segment.last_error = None;
        segment.audio_path = None;
        segment.duration_seconds = Some(0.0);
        self.persist(index).await
    }

    async fn fail(&mut self, index: usize, reason: &str) -> Result<(), PersistenceError> {
        let segment = self.segment_mut(index)?;
        segment.status = SegmentStatus::Failed(reason.to_string());
        segment.last_error = Some(reason.to_string());
        self.persist(index).await
    }

    async fn exhaust(&mut self, index: usize, reason: &str) -> Result<(), PersistenceError> {
        let segment = self.segment_mut(index)?;
        segment.status = SegmentStatus::Exhausted;
        segment.last_error = Some(reason.to_string());
        self.persist(index).await
    }

    /// Segments that reached Succeeded or Exhausted
    fn settled(&self) -> usize {
        self.progress.succeeded_count() + self.progress.exhausted_count()
    }
}

/// Synthesis orchestrator
pub struct SynthesisOrchestrator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ProgressStore>,
    segments_root: PathBuf,
    settings: OrchestratorSettings,
}

impl SynthesisOrchestrator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ProgressStore>,
        segments_root: impl AsRef<Path>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            synthesizer,
            store,
            segments_root: segments_root.as_ref().to_path_buf(),
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Segment audio directory for a job
    pub fn audio_store(&self, job_id: &str) -> SegmentAudioStore {
        SegmentAudioStore::for_job(&self.segments_root, job_id)
    }

    /// Synthesize every segment of `progress` that has no audio yet.
    ///
    /// `segments` must be the job's segments in index order. `on_progress`
    /// receives `(settled, total)` after each segment settles. Only storage
    /// failures abort the run; synthesis failures end up in the report.
    pub async fn run<F>(
        &self,
        progress: JobProgress,
        segments: &[Segment],
        voice: &str,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<RunReport, PersistenceError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        if segments.len() != progress.total_segments() {
            return Err(PersistenceError::Corrupt(format!(
                "job {} tracks {} segments but {} were given",
                progress.job_id,
                progress.total_segments(),
                segments.len()
            )));
        }

        let job_id = progress.job_id.clone();
        let total = progress.total_segments();
        let pending = progress.pending_indices();
        let audio_store = self.audio_store(&job_id);
        let workers = self.settings.workers.max(1);

        info!(
            "Synthesizing {} of {} segments for job {} with {} (voice {}, {} workers)",
            pending.len(),
            total,
            job_id,
            self.synthesizer.name(),
            voice,
            workers
        );

        let pacer = self.settings.request_interval.map(RequestPacer::new);
        let tracker = Mutex::new(ProgressTracker { progress, store: self.store.clone() });
        on_progress(tracker.lock().await.settled(), total);

        let outcomes: Vec<SegmentOutcome> = stream::iter(pending)
            .map(|index| {
                let tracker = &tracker;
                let audio_store = &audio_store;
                let pacer = pacer.as_ref();
                let on_progress = &on_progress;
                async move {
                    let outcome = self
                        .process_segment(tracker, audio_store, pacer, &segments[index], voice, cancel)
                        .await?;
                    if outcome != SegmentOutcome::Cancelled {
                        on_progress(tracker.lock().await.settled(), total);
                    }
                    Ok::<_, PersistenceError>(outcome)
                }
            })
            .buffer_unordered(workers)
            .try_collect()
            .await?;

        let synthesized = outcomes.iter().filter(|o| **o == SegmentOutcome::Succeeded).count();
        let ProgressTracker { mut progress, store } = tracker.into_inner();

        let cancelled = cancel.is_cancelled() && !progress.is_settled();
        if cancelled {
            progress.status = JobStatus::Paused;
        } else if total > 0 && progress.exhausted_count() == total {
            progress.status = JobStatus::Failed;
        }
        progress.touch();
        store.save(&progress).await?;

        if cancelled {
            warn!(
                "Job {} paused after {}/{} segments; run again to resume",
                job_id,
                progress.succeeded_count(),
                total
            );
        } else {
            info!(
                "Job {} settled: {} succeeded, {} exhausted",
                job_id,
                progress.succeeded_count(),
                progress.exhausted_count()
            );
        }

        Ok(RunReport::from_progress(progress, synthesized, cancelled))
    }

    async fn process_segment(
        &self,
        tracker: &Mutex<ProgressTracker>,
        audio_store: &SegmentAudioStore,
        pacer: Option<&RequestPacer>,
        segment: &Segment,
        voice: &str,
        cancel: &CancellationToken,
    ) -> Result<SegmentOutcome, PersistenceError> {
        let index = segment.index;
        let retry = &self.settings.retry;
        let text = segment.text.trim();

        if text.is_empty() {
            debug!("Segment {} is whitespace only; nothing to synthesize", index);
            tracker.lock().await.silence(index).await?;
            return Ok(SegmentOutcome::Silent);
        }

        loop {
            if cancel.is_cancelled() {
                return Ok(SegmentOutcome::Cancelled);
            }

            if let Some(pacer) = pacer {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(SegmentOutcome::Cancelled),
                    _ = pacer.wait() => {}
                }
            }

            let attempt = {
                let mut tracker = tracker.lock().await;
                if !retry.allows_another(tracker.attempts(index)) {
                    let reason = tracker
                        .progress
                        .segment(index)
                        .and_then(|s| s.last_error.clone())
                        .unwrap_or_else(|| "attempt budget spent".to_string());
                    tracker.exhaust(index, &reason).await?;
                    return Ok(SegmentOutcome::Exhausted);
                }
                tracker.begin_attempt(index).await?
            };

            debug!("Segment {} attempt {}/{}", index, attempt, retry.max_attempts);

            let call = self.synthesizer.synthesize(text, voice, &self.settings.options);
            let result = match tokio::time::timeout(self.settings.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(SynthesisError::Recoverable(format!(
                    "call timed out after {:?}",
                    self.settings.call_timeout
                ))),
            };

            match result {
                Ok(audio) => {
                    let path = audio_store.commit(index, &audio.bytes).await?;
                    tracker.lock().await.succeed(index, path, audio.duration_seconds).await?;
                    debug!("Segment {} done ({:.2}s of audio)", index, audio.duration_seconds);
                    return Ok(SegmentOutcome::Succeeded);
                }
                Err(error) if error.is_recoverable() && retry.allows_another(attempt) => {
                    tracker.lock().await.fail(index, error.reason()).await?;
                    let delay = retry.backoff(attempt);
                    warn!(
                        "Segment {} attempt {}/{} failed: {}; retrying in {:?}",
                        index,
                        attempt,
                        retry.max_attempts,
                        error.reason(),
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(SegmentOutcome::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => {
                    warn!("Segment {} exhausted after {} attempt(s): {}", index, attempt, error);
                    tracker.lock().await.exhaust(index, error.reason()).await?;
                    return Ok(SegmentOutcome::Exhausted);
                }
            }
        }
    }
}
