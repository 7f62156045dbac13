use async_trait::async_trait;
use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::errors::SynthesisError;

use super::{SpeechSynthesizer, SynthesisOptions, SynthesizedAudio};

/// Longest error body kept in a failure reason
const MAX_ERROR_BODY: usize = 300;

/// Client for an OpenAI-compatible text-to-speech endpoint
#[derive(Debug)]
pub struct OpenAiSynthesizer {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Full URL of the speech route
    speech_url: Url,
}

/// Body of a `/audio/speech` request
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

impl OpenAiSynthesizer {
    /// Create a client for `endpoint` (the API base, e.g. `https://api.openai.com/v1`)
    pub fn new(api_key: impl Into<String>, endpoint: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let base = endpoint.as_ref().trim_end_matches('/');
        let speech_url = Url::parse(&format!("{}/audio/speech", base))
            .with_context(|| format!("Invalid synthesis endpoint: {}", endpoint.as_ref()))?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, api_key: api_key.into(), speech_url })
    }

    pub fn speech_url(&self) -> &Url {
        &self.speech_url
    }
}

/// Map an HTTP error status onto retry semantics
pub fn classify_status(status: StatusCode, body: &str) -> SynthesisError {
    let mut detail: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    if detail.is_empty() {
        detail = status.canonical_reason().unwrap_or("no details").to_string();
    }
    let reason = format!("HTTP {}: {}", status.as_u16(), detail);

    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => SynthesisError::Recoverable(reason),
        s if s.is_server_error() => SynthesisError::Recoverable(reason),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SynthesisError::Fatal(format!("authentication rejected ({})", reason))
        }
        _ => SynthesisError::Fatal(reason),
    }
}

fn classify_transport(error: &reqwest::Error) -> SynthesisError {
    if error.is_timeout() {
        SynthesisError::Recoverable(format!("request timed out: {}", error))
    } else if error.is_builder() {
        SynthesisError::Fatal(format!("invalid request: {}", error))
    } else {
        SynthesisError::Recoverable(format!("network error: {}", error))
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        options: &SynthesisOptions,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let request = SpeechRequest {
            model: &options.model,
            input: text,
            voice,
            response_format: "wav",
            speed: ((options.speed - 1.0).abs() > f32::EPSILON).then_some(options.speed),
        };

        debug!("POST {} ({} chars, voice {})", self.speech_url, text.chars().count(), voice);

        let response = self
            .client
            .post(self.speech_url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(status, &body);
            error!("Speech API error: {}", error);
            return Err(error);
        }

        let bytes: Bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        SynthesizedAudio::from_wav(bytes)
    }
}
