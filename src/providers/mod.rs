/*!
 * Speech synthesis backends.
 *
 * - OpenAI: any OpenAI-compatible `/audio/speech` endpoint
 * - Mock: offline generator of silent WAV audio with scriptable failures
 */

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{Config, SynthesisProvider};
use crate::errors::SynthesisError;

pub mod audio;
pub mod mock;
pub mod openai;

pub use mock::{MockBehavior, MockSynthesizer};
pub use openai::OpenAiSynthesizer;

/// Per-call settings
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub model: String,
    /// Playback speed multiplier, 1.0 is normal
    pub speed: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self { model: String::new(), speed: 1.0 }
    }
}

/// Validated WAV audio returned by a backend
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    pub duration_seconds: f64,
}

impl SynthesizedAudio {
    /// Check that `bytes` is a readable WAV and measure it.
    ///
    /// Malformed payloads are recoverable: a second call usually returns good audio.
    pub fn from_wav(bytes: Bytes) -> Result<Self, SynthesisError> {
        let mut raw = bytes.to_vec();
        audio::repair_streamed_header(&mut raw);

        let info = audio::inspect_wav(&raw)
            .map_err(|e| SynthesisError::Recoverable(format!("malformed audio payload: {}", e)))?;
        if info.frames == 0 {
            return Err(SynthesisError::Recoverable("audio payload has no samples".to_string()));
        }

        Ok(Self { bytes: Bytes::from(raw), duration_seconds: info.duration_seconds })
    }
}

/// Common trait for all speech backends
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Synthesize one segment of text
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &SynthesisOptions,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

/// Build the backend selected in the configuration
pub fn create_synthesizer(config: &Config) -> Result<Arc<dyn SpeechSynthesizer>> {
    let synthesis = &config.synthesis;
    let synthesizer: Arc<dyn SpeechSynthesizer> = match synthesis.provider {
        SynthesisProvider::OpenAI => Arc::new(OpenAiSynthesizer::new(
            synthesis.get_api_key(),
            synthesis.get_endpoint(),
            synthesis.get_call_timeout(),
        )?),
        SynthesisProvider::Mock => Arc::new(MockSynthesizer::working()),
    };
    Ok(synthesizer)
}
