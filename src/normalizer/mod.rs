/*!
 * Text normalization for speech.
 *
 * Rewrites extracted document text into text a Portuguese voice reads aloud
 * correctly: markup and page furniture removed, headings canonicalized,
 * abbreviations, money, ordinals and numbers spelled out, shouting recased and
 * paragraphs tidied. The pipeline is a `RuleTable` run in category order, and
 * running it on its own output changes nothing. An optional chapter index is
 * read before the text.
 */

pub mod abbreviations;
pub mod casing;
pub mod cleanup;
pub mod expansions;
pub mod headings;
pub mod numbers;
pub mod rules;

use log::{debug, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::app_config::NormalizationConfig;
use crate::errors::{InputError, NormalizationWarning};
use crate::extraction::RawDocument;
use crate::language_utils::portuguese_confidence;

use abbreviations::AbbreviationDictionary;
use rules::{RuleCategory, RuleTable};

/// Bumped whenever a rule change alters output; part of the job identity
pub const NORMALIZER_REVISION: u32 = 2;

/// Normalized, speech-ready text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakableText(String);

impl SpeakableText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SpeakableText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SpeakableText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Result of normalizing one document
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: SpeakableText,
    /// Share of tokens recognized as Portuguese
    pub language_confidence: f32,
    /// Set when the confidence is below the configured threshold
    pub warning: Option<NormalizationWarning>,
}

/// Rule-based normalizer
#[derive(Debug)]
pub struct Normalizer {
    rules: RuleTable,
    confidence_threshold: f32,
    chapter_index: bool,
    protected_abbreviations: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizationConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &NormalizationConfig) -> Self {
        let acronyms: HashSet<String> = config.protected_acronyms.iter().cloned().collect();
        let dictionary = AbbreviationDictionary::new(&config.extra_abbreviations);
        let dotted = Arc::new(dictionary.dotted_forms());
        let protected_abbreviations = dictionary.protected_forms();

        let mut entries = Vec::new();
        entries.extend(cleanup::markup_rules());
        entries.extend(cleanup::metadata_rules());
        entries.extend(headings::heading_rules(acronyms.clone()));
        entries.extend(headings::roman_numeral_rules());
        entries.extend(abbreviations::abbreviation_rules(dictionary));
        entries.extend(expansions::currency_rules());
        entries.extend(expansions::symbol_rules());
        entries.extend(expansions::ordinal_rules());
        entries.extend(expansions::cardinal_rules());
        entries.extend(casing::casing_rules(config.case_threshold, acronyms));
        entries.extend(cleanup::whitespace_rules(dotted));

        Self {
            rules: RuleTable::new(entries),
            confidence_threshold: config.language_confidence_threshold,
            chapter_index: config.chapter_index,
            protected_abbreviations,
        }
    }

    /// The ordered rule table
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Abbreviations the segmenter must not split after
    pub fn protected_abbreviations(&self) -> &[String] {
        &self.protected_abbreviations
    }

    /// Normalize an extracted document
    pub fn normalize(&self, document: &RawDocument) -> Result<NormalizedText, InputError> {
        self.normalize_text(&document.text)
    }

    /// Normalize raw text
    pub fn normalize_text(&self, raw: &str) -> Result<NormalizedText, InputError> {
        if raw.trim().is_empty() {
            return Err(InputError::Empty);
        }

        let mut text = raw.to_string();
        for category in RuleCategory::ALL {
            text = self.rules.apply_category(category, &text);
            if category == RuleCategory::Metadata && !text.chars().any(char::is_alphanumeric) {
                return Err(InputError::Empty);
            }
        }

        if !text.chars().any(char::is_alphanumeric) {
            return Err(InputError::Empty);
        }

        if self.chapter_index {
            // already present when normalizing normalized text
            if let Some(index) = headings::chapter_index(&text).filter(|index| !text.starts_with(index.as_str())) {
                debug!("Prepending chapter index");
                text = format!("{}\n\n{}", index, text);
            }
        }

        let language_confidence = portuguese_confidence(&text);
        let warning = if language_confidence < self.confidence_threshold {
            let warning = NormalizationWarning {
                confidence: language_confidence,
                threshold: self.confidence_threshold,
            };
            warn!("{}", warning);
            Some(warning)
        } else {
            None
        };

        debug!(
            "Normalized {} chars into {} chars (language confidence {:.2})",
            raw.chars().count(),
            text.chars().count(),
            language_confidence
        );

        Ok(NormalizedText { text: SpeakableText(text), language_confidence, warning })
    }
}
