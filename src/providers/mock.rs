/*!
 * Offline synthesizer for dry runs and tests.
 *
 * Produces silent WAV audio whose length grows with the text, so assembly
 * and duration ceilings behave as with a real voice:
 * - `MockSynthesizer::working()` - always succeeds
 * - `MockSynthesizer::intermittent(n)` - every n-th call fails recoverably
 * - `MockSynthesizer::flaky(n)` - each text fails its first n calls
 * - `MockSynthesizer::failing()` - always fails recoverably
 * - `MockSynthesizer::rejecting(needle)` - fatal error for texts containing `needle`
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::SynthesisError;

use super::audio::silent_wav;
use super::{SpeechSynthesizer, SynthesisOptions, SynthesizedAudio};

/// Sample rate of the generated audio
const MOCK_SAMPLE_RATE: u32 = 8_000;

/// Seconds of audio per character of text
const SECONDS_PER_CHAR: f64 = 0.06;

/// Behavior mode for the mock synthesizer
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Every `fail_every`-th call (counted across all texts) fails recoverably
    Intermittent { fail_every: usize },
    /// Each distinct text fails its first `failures` calls, then succeeds
    FailFirst { failures: usize },
    /// Always fails recoverably
    Failing,
    /// Texts containing the needle fail fatally, others succeed
    RejectText { needle: String },
    /// Returns bytes that are not a WAV file
    Malformed,
    /// Sleeps before succeeding
    Slow { delay_ms: u64 },
}

/// Mock synthesizer; clones share their call counters
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    behavior: MockBehavior,
    call_count: Arc<AtomicUsize>,
    calls_per_text: Arc<Mutex<HashMap<String, usize>>>,
    /// Calls currently running, for concurrency checks
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            calls_per_text: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    pub fn flaky(failures: usize) -> Self {
        Self::new(MockBehavior::FailFirst { failures })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn rejecting(needle: impl Into<String>) -> Self {
        Self::new(MockBehavior::RejectText { needle: needle.into() })
    }

    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Total synthesize calls so far
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls made for one exact text
    pub fn calls_for(&self, text: &str) -> usize {
        self.calls_per_text.lock().get(text).copied().unwrap_or(0)
    }

    /// Highest number of calls that overlapped in time
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Audio length the mock produces for `text`
    pub fn duration_for(text: &str) -> f64 {
        let seconds = text.chars().count() as f64 * SECONDS_PER_CHAR;
        // whole samples only, so sums stay exact
        (seconds * f64::from(MOCK_SAMPLE_RATE)).round().max(1.0) / f64::from(MOCK_SAMPLE_RATE)
    }

    fn audio_for(text: &str) -> Result<SynthesizedAudio, SynthesisError> {
        let bytes = silent_wav(Self::duration_for(text), MOCK_SAMPLE_RATE)
            .map_err(|e| SynthesisError::Fatal(format!("mock audio generation failed: {}", e)))?;
        SynthesizedAudio::from_wav(bytes)
    }

    async fn respond(&self, text: &str, count: usize, text_count: usize) -> Result<SynthesizedAudio, SynthesisError> {
        match &self.behavior {
            MockBehavior::Working => Self::audio_for(text),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(SynthesisError::Recoverable(format!(
                        "Simulated intermittent failure (call #{})",
                        count + 1
                    )))
                } else {
                    Self::audio_for(text)
                }
            }

            MockBehavior::FailFirst { failures } => {
                if text_count <= *failures {
                    Err(SynthesisError::Recoverable(format!(
                        "Simulated busy service (attempt {} of this text)",
                        text_count
                    )))
                } else {
                    Self::audio_for(text)
                }
            }

            MockBehavior::Failing => Err(SynthesisError::Recoverable("Simulated service outage".to_string())),

            MockBehavior::RejectText { needle } => {
                if text.contains(needle.as_str()) {
                    Err(SynthesisError::Fatal(format!("Simulated rejection of text containing '{}'", needle)))
                } else {
                    Self::audio_for(text)
                }
            }

            MockBehavior::Malformed => SynthesizedAudio::from_wav(bytes::Bytes::from_static(b"definitely not audio")),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Self::audio_for(text)
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        _options: &SynthesisOptions,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let text_count = {
            let mut per_text = self.calls_per_text.lock();
            let entry = per_text.entry(text.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let result = self.respond(text, count, text_count).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
