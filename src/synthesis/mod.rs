/*!
 * Resumable, fault-tolerant synthesis of segmented text.
 *
 * - `orchestrator`: drives segments through the synthesizer with bounded concurrency
 * - `retry`: attempt budget and exponential backoff
 * - `concurrency`: per-provider worker limits and request pacing
 * - `audio_store`: atomic per-segment audio files
 */

use serde::Serialize;
use std::path::PathBuf;

use crate::job::{JobProgress, SegmentStatus};

pub mod audio_store;
pub mod concurrency;
pub mod orchestrator;
pub mod retry;

pub use audio_store::SegmentAudioStore;
pub use concurrency::{ProviderProfile, RequestPacer};
pub use orchestrator::{OrchestratorSettings, SynthesisOrchestrator};
pub use retry::RetryPolicy;

/// Audio of one succeeded segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSegmentResult {
    pub index: usize,
    /// Committed WAV file
    pub audio_path: PathBuf,
    pub duration_seconds: f64,
}

/// A segment that produced no audio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub reason: String,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every segment has audio
    Complete,
    /// Every segment settled, some without audio
    CompleteWithGaps,
    /// Every segment exhausted its attempts
    AllExhausted,
    /// Cancelled before every segment settled
    Interrupted,
}

/// Result of one orchestrator run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Job state after the run, as stored
    pub progress: JobProgress,
    /// Succeeded segments in index order, earlier runs included
    pub results: Vec<AudioSegmentResult>,
    /// Exhausted segments in index order
    pub failures: Vec<SegmentFailure>,
    /// Segments that succeeded during this run
    pub synthesized: usize,
    pub cancelled: bool,
}

impl RunReport {
    /// Build the report from the final job state
    pub fn from_progress(progress: JobProgress, synthesized: usize, cancelled: bool) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for segment in &progress.segments {
            match (&segment.status, &segment.audio_path) {
                (SegmentStatus::Succeeded, Some(path)) => results.push(AudioSegmentResult {
                    index: segment.index,
                    audio_path: path.clone(),
                    duration_seconds: segment.duration_seconds.unwrap_or(0.0),
                }),
                (SegmentStatus::Exhausted, _) => failures.push(SegmentFailure {
                    index: segment.index,
                    reason: segment.last_error.clone().unwrap_or_else(|| "unknown error".to_string()),
                }),
                _ => {}
            }
        }

        Self { progress, results, failures, synthesized, cancelled }
    }

    pub fn outcome(&self) -> RunOutcome {
        if !self.progress.is_settled() {
            return RunOutcome::Interrupted;
        }
        let total = self.progress.total_segments();
        if self.failures.is_empty() {
            RunOutcome::Complete
        } else if self.failures.len() == total {
            RunOutcome::AllExhausted
        } else {
            RunOutcome::CompleteWithGaps
        }
    }

    /// Total duration of all succeeded audio
    pub fn total_duration(&self) -> f64 {
        self.results.iter().map(|r| r.duration_seconds).sum()
    }
}
