/*!
 * Error types for the narrador application.
 *
 * Each pipeline stage has its own error enum so callers can decide what
 * aborts a run and what only degrades it. All of them fold into `AppError`.
 */

use thiserror::Error;

/// Errors raised while reading or extracting an input document
#[derive(Error, Debug)]
pub enum InputError {
    /// The file could not be read at all
    #[error("Unable to read input {path}: {message}")]
    Unreadable {
        /// Path of the input file
        path: String,
        /// Underlying error message
        message: String,
    },

    /// The file type has no extractor
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// The extractor failed on the file contents
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Nothing speakable is left in the document
    #[error("Input contains no speakable text")]
    Empty,
}

/// Raised when the normalized text does not look like Portuguese.
///
/// This never aborts a run, it is reported next to the normalized text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Language confidence {confidence:.2} is below threshold {threshold:.2}; text may not be Portuguese")]
pub struct NormalizationWarning {
    /// Share of tokens recognized as Portuguese
    pub confidence: f32,
    /// Configured minimum
    pub threshold: f32,
}

/// Errors returned by a speech synthesis backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Transient failure (network, timeout, busy or rate limited); worth retrying
    #[error("Recoverable synthesis error: {0}")]
    Recoverable(String),

    /// Permanent failure (invalid voice, rejected input, bad credentials)
    #[error("Fatal synthesis error: {0}")]
    Fatal(String),
}

impl SynthesisError {
    /// Whether another attempt may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }

    /// The reason text without the variant prefix
    pub fn reason(&self) -> &str {
        match self {
            Self::Recoverable(reason) | Self::Fatal(reason) => reason,
        }
    }
}

/// Errors raised by the job progress store
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database access failed
    #[error("Progress database error: {0}")]
    Database(String),

    /// Filesystem access failed
    #[error("Progress storage I/O error: {0}")]
    Io(String),

    /// Stored progress could not be interpreted
    #[error("Stored progress is corrupt: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(error: anyhow::Error) -> Self {
        Self::Database(format!("{:#}", error))
    }
}

/// Errors raised while assembling the final audio artifacts
#[derive(Error, Debug)]
pub enum OutputError {
    /// Reading segment audio or writing an artifact failed
    #[error("Output I/O error: {0}")]
    Io(String),

    /// Segment audio is malformed or segments disagree on format
    #[error("Audio format error: {0}")]
    Format(String),

    /// No segment succeeded, so there is nothing to assemble
    #[error("No synthesized audio to assemble")]
    Empty,
}

impl From<std::io::Error> for OutputError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<hound::Error> for OutputError {
    fn from(error: hound::Error) -> Self {
        match error {
            hound::Error::IoError(e) => Self::Io(e.to_string()),
            other => Self::Format(other.to_string()),
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reading the input document
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Error from the synthesis backend that aborted the job
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Error from the progress store
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Error while assembling output
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
