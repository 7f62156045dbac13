/*!
 * # narrador - Portuguese documents to narrated audio
 *
 * A Rust library that turns long Portuguese texts into speech, surviving
 * crashes, rate limits and flaky backends along the way.
 *
 * ## Features
 *
 * - Rule-based normalization into speakable text:
 *   - numbers, currency, ordinals and roman numerals spelled out
 *   - abbreviations expanded, shouting tamed, markup and metadata removed
 * - Sentence-aware segmentation bounded by the provider's request size
 * - Resumable synthesis with retries, backoff and bounded concurrency
 * - WAV assembly with duration-based splitting
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `extraction`: Reading documents into raw text
 * - `normalizer`: Ordered rewrite rules producing speakable text
 * - `segmenter`: Splitting speakable text into provider-sized segments
 * - `job`: Job identity, progress model and progress stores
 * - `database`: SQLite persistence behind the progress store
 * - `synthesis`: The orchestrator driving segments through a synthesizer
 * - `providers`: Speech backends (OpenAI-compatible, mock)
 * - `output`: Assembly of segment audio into final artifacts
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod job;
pub mod language_utils;
pub mod normalizer;
pub mod output;
pub mod providers;
pub mod segmenter;
pub mod synthesis;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, ExitStatus};
pub use errors::{AppError, InputError, OutputError, PersistenceError, SynthesisError};
pub use normalizer::{Normalizer, SpeakableText};
pub use segmenter::{segment, Segment, Segmenter};
pub use synthesis::SynthesisOrchestrator;
