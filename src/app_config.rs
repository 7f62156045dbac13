use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Voice id; empty means the active provider's default voice
    #[serde(default)]
    pub voice: String,

    /// Synthesis config
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Text normalization settings
    #[serde(default)]
    pub normalization: NormalizationConfig,

    /// Segmentation settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Output artifact settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Job progress storage
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech synthesis provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProvider {
    // @provider: OpenAI-compatible /audio/speech endpoint
    #[default]
    OpenAI,
    // @provider: Offline generator producing silent audio
    Mock,
}

impl SynthesisProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

impl std::fmt::Display for SynthesisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for SynthesisProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Default voice for this provider
    #[serde(default = "String::new")]
    pub voice: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Max chars per request
    #[serde(default = "default_max_chars_per_request")]
    pub max_chars_per_request: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: SynthesisProvider) -> Self {
        match provider_type {
            SynthesisProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                voice: default_openai_voice(),
                concurrent_requests: default_concurrent_requests(),
                max_chars_per_request: default_openai_max_chars_per_request(),
                timeout_secs: default_timeout_secs(),
            },
            SynthesisProvider::Mock => Self {
                provider_type: "mock".to_string(),
                model: default_mock_model(),
                api_key: String::new(),
                endpoint: String::new(),
                voice: default_mock_voice(),
                concurrent_requests: default_mock_concurrent_requests(),
                max_chars_per_request: default_max_chars_per_request(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Synthesis provider to use
    #[serde(default)]
    pub provider: SynthesisProvider,

    /// Available synthesis providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common synthesis settings
    #[serde(default)]
    pub common: SynthesisCommonConfig,
}

/// Settings shared by every provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisCommonConfig {
    /// Total calls allowed per segment before it is exhausted
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Add random jitter to backoff delays
    #[serde(default = "default_true")]
    pub retry_jitter: bool,

    /// Speaking speed passed to the provider (0.25 to 4.0)
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl Default for SynthesisCommonConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_jitter: true,
            speed: default_speed(),
        }
    }
}

/// Text normalization settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NormalizationConfig {
    /// Uppercase runs with more letters than this become title case
    #[serde(default = "default_case_threshold")]
    pub case_threshold: usize,

    /// Acronyms that keep their capitals
    #[serde(default = "default_protected_acronyms")]
    pub protected_acronyms: Vec<String>,

    /// Extra abbreviations merged into the built-in dictionary
    #[serde(default)]
    pub extra_abbreviations: HashMap<String, String>,

    /// Minimum share of Portuguese-looking words before a warning is raised
    #[serde(default = "default_language_threshold")]
    pub language_confidence_threshold: f32,

    /// Read a chapter list before the text when the document has chapters
    #[serde(default)]
    pub chapter_index: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            case_threshold: default_case_threshold(),
            protected_acronyms: default_protected_acronyms(),
            extra_abbreviations: HashMap::new(),
            language_confidence_threshold: default_language_threshold(),
            chapter_index: false,
        }
    }
}

/// Segmentation settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Maximum characters per segment; capped by the provider limit
    #[serde(default = "default_max_unit_size")]
    pub max_unit_size: usize,

    /// Characters that end a sentence
    #[serde(default = "default_terminal_punctuation")]
    pub terminal_punctuation: Vec<char>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_unit_size: default_max_unit_size(),
            terminal_punctuation: default_terminal_punctuation(),
        }
    }
}

/// Output artifact layout
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Concatenate segments, split only by the duration ceiling
    #[default]
    Single,
    /// One artifact per segment
    Separate,
}

/// Output settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: OutputMode,

    /// Maximum duration of a single artifact in seconds
    #[serde(default = "default_max_artifact_duration_secs")]
    pub max_artifact_duration_secs: f64,

    /// Keep per-segment audio after a gap-free assembly
    #[serde(default)]
    pub keep_segment_files: bool,

    /// Directory for artifacts; defaults to the input file's directory
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            max_artifact_duration_secs: default_max_artifact_duration_secs(),
            keep_segment_files: false,
            output_dir: None,
        }
    }
}

/// Job progress storage settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProgressConfig {
    /// SQLite database path; defaults to the user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory for per-segment audio; defaults next to the database
    #[serde(default)]
    pub segments_dir: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_mock_concurrent_requests() -> usize {
    8
}

fn default_max_chars_per_request() -> usize {
    5000
}

fn default_openai_max_chars_per_request() -> usize {
    4096
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_speed() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_case_threshold() -> usize {
    4
}

fn default_protected_acronyms() -> Vec<String> {
    crate::normalizer::casing::DEFAULT_ACRONYMS.iter().map(|s| s.to_string()).collect()
}

fn default_language_threshold() -> f32 {
    0.35
}

fn default_max_unit_size() -> usize {
    2000
}

fn default_terminal_punctuation() -> Vec<char> {
    vec!['.', '!', '?', '…']
}

fn default_max_artifact_duration_secs() -> f64 {
    43_200.0 // 12 hours
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini-tts".to_string()
}

fn default_openai_voice() -> String {
    "nova".to_string()
}

fn default_mock_model() -> String {
    "silence".to_string()
}

fn default_mock_voice() -> String {
    "pt-BR-FranciscaNeural".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.synthesis.provider == SynthesisProvider::OpenAI
            && self.synthesis.get_api_key().is_empty()
        {
            return Err(anyhow!("Synthesis API key is required for OpenAI provider"));
        }

        let voice = self.effective_voice();
        if voice.is_empty() {
            return Err(anyhow!("No voice configured for provider {}", self.synthesis.provider));
        }
        if let Some((prefix, _)) = voice.split_once('-') {
            crate::language_utils::get_language_name(prefix)
                .map_err(|_| anyhow!("Voice '{}' names an unknown language '{}'", voice, prefix))?;
        }

        if self.segmentation.max_unit_size == 0 {
            return Err(anyhow!("segmentation.max_unit_size must be positive"));
        }
        if self.segmentation.terminal_punctuation.is_empty() {
            return Err(anyhow!("segmentation.terminal_punctuation must not be empty"));
        }
        if self.synthesis.common.max_attempts == 0 {
            return Err(anyhow!("synthesis.common.max_attempts must be at least 1"));
        }
        if self.synthesis.optimal_concurrent_requests() == 0 {
            return Err(anyhow!("concurrent_requests must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.normalization.language_confidence_threshold) {
            return Err(anyhow!("normalization.language_confidence_threshold must be within 0..1"));
        }
        if self.output.max_artifact_duration_secs <= 0.0 {
            return Err(anyhow!("output.max_artifact_duration_secs must be positive"));
        }

        Ok(())
    }

    /// Voice override, or the active provider's voice
    pub fn effective_voice(&self) -> String {
        if !self.voice.is_empty() {
            return self.voice.clone();
        }
        self.synthesis.get_voice()
    }

    /// Segment size after applying the provider's request limit
    pub fn effective_max_unit_size(&self) -> usize {
        self.segmentation.max_unit_size.min(self.synthesis.get_max_chars_per_request())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            voice: String::new(),
            synthesis: SynthesisConfig::default(),
            normalization: NormalizationConfig::default(),
            segmentation: SegmentationConfig::default(),
            output: OutputConfig::default(),
            progress: ProgressConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn optimal_concurrent_requests(&self) -> usize {
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.concurrent_requests;
        }

        match self.provider {
            SynthesisProvider::OpenAI => default_concurrent_requests(),
            SynthesisProvider::Mock => default_mock_concurrent_requests(),
        }
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &SynthesisProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider entry, inserting defaults if missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let position = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(position) => position,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider.clone()));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[position]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            SynthesisProvider::OpenAI => default_openai_model(),
            SynthesisProvider::Mock => default_mock_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            SynthesisProvider::OpenAI => default_openai_endpoint(),
            SynthesisProvider::Mock => String::new(),
        }
    }

    /// Get the default voice for the active provider
    pub fn get_voice(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.voice.is_empty() {
                return provider_config.voice.clone();
            }
        }

        match self.provider {
            SynthesisProvider::OpenAI => default_openai_voice(),
            SynthesisProvider::Mock => default_mock_voice(),
        }
    }

    /// Get the max chars per request for the active provider
    pub fn get_max_chars_per_request(&self) -> usize {
        if let Some(provider_config) = self.get_active_provider_config() {
            if provider_config.max_chars_per_request > 0 {
                return provider_config.max_chars_per_request;
            }
        }

        match self.provider {
            SynthesisProvider::OpenAI => default_openai_max_chars_per_request(),
            SynthesisProvider::Mock => default_max_chars_per_request(),
        }
    }

    /// Per-call timeout for the active provider
    pub fn get_call_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SynthesisProvider::default(),
            available_providers: vec![
                ProviderConfig::new(SynthesisProvider::OpenAI),
                ProviderConfig::new(SynthesisProvider::Mock),
            ],
            common: SynthesisCommonConfig::default(),
        }
    }
}
