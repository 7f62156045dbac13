//! Language utilities
//!
//! ISO 639 code handling for voice identifiers, and a lexical heuristic that
//! estimates how much of a text is Portuguese.

use anyhow::{Result, anyhow};
use isolang::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// High-frequency Portuguese function words
const PORTUGUESE_LEXICON: &[&str] = &[
    "a", "o", "as", "os", "um", "uma", "uns", "umas", "de", "da", "do", "das", "dos", "em",
    "na", "no", "nas", "nos", "por", "pelo", "pela", "para", "com", "sem", "sob", "sobre",
    "e", "ou", "mas", "que", "se", "não", "sim", "mais", "muito", "muita", "já", "também",
    "ele", "ela", "eles", "elas", "eu", "você", "vocês", "nós", "meu", "minha", "seu", "sua",
    "este", "esta", "esse", "essa", "isso", "isto", "aquele", "aquela", "foi", "era", "é",
    "são", "está", "estava", "tem", "tinha", "ser", "ter", "há", "como", "quando", "onde",
    "porque", "então", "depois", "antes", "ainda", "sempre", "nunca", "ao", "aos", "à", "às",
    "lhe", "me", "te", "nosso", "nossa", "dele", "dela", "disse", "tudo", "nada", "cada",
];

/// Word endings typical of Portuguese
const PORTUGUESE_SUFFIXES: &[&str] = &[
    "ção", "ções", "são", "mente", "ão", "ões", "dade", "dades", "agem", "inho", "inha", "eiro",
    "eira", "ando", "endo", "indo", "ava", "avam", "ência",
];

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{M}]+").unwrap());
static LEXICON: Lazy<HashSet<&'static str>> =
    Lazy::new(|| PORTUGUESE_LEXICON.iter().copied().collect());

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => {
            if let Some(lang) = Language::from_639_1(&normalized_code) {
                return Ok(lang.to_639_3().to_string());
            }
        }
        3 => {
            if Language::from_639_3(&normalized_code).is_some() {
                return Ok(normalized_code);
            }
            if let Some((_, terminological)) =
                BIBLIOGRAPHIC_CODES.iter().find(|(b, _)| *b == normalized_code)
            {
                return Ok(terminological.to_string());
            }
        }
        _ => {}
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Language encoded in a locale-style voice id ("pt-BR-FranciscaNeural").
///
/// Returns `None` for voices without a locale prefix ("alloy", "nova").
pub fn voice_language(voice: &str) -> Option<String> {
    let (prefix, rest) = voice.split_once('-')?;
    if rest.is_empty() {
        return None;
    }
    normalize_to_part2t(prefix).ok()
}

/// Whether a voice is usable for Portuguese text.
///
/// Voices without a locale prefix are assumed multilingual.
pub fn voice_speaks_portuguese(voice: &str) -> bool {
    match voice_language(voice) {
        Some(code) => language_codes_match(&code, "pt"),
        None => true,
    }
}

/// Share of word tokens that look Portuguese, in `[0, 1]`.
///
/// A token counts when it is a known function word, carries a Portuguese-only
/// diacritic (ã, õ, ç) or ends with a typical suffix. Empty text scores 0.
pub fn portuguese_confidence(text: &str) -> f32 {
    let mut total = 0usize;
    let mut matched = 0usize;

    for token in RE_TOKEN.find_iter(text) {
        let word = token.as_str().to_lowercase();
        total += 1;

        let looks_portuguese = LEXICON.contains(word.as_str())
            || word.contains(['ã', 'õ', 'ç'])
            || (word.chars().count() > 4
                && PORTUGUESE_SUFFIXES.iter().any(|suffix| word.ends_with(suffix)));
        if looks_portuguese {
            matched += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    matched as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizeToPart2t_shouldHandleAllForms() {
        assert_eq!(normalize_to_part2t("pt").unwrap(), "por");
        assert_eq!(normalize_to_part2t("POR").unwrap(), "por");
        assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
        assert!(normalize_to_part2t("xx").is_err());
    }

    #[test]
    fn test_voiceLanguage_shouldReadLocalePrefix() {
        assert_eq!(voice_language("pt-BR-FranciscaNeural").as_deref(), Some("por"));
        assert_eq!(voice_language("alloy"), None);
        assert!(voice_speaks_portuguese("pt-PT-RaquelNeural"));
        assert!(voice_speaks_portuguese("nova"));
        assert!(!voice_speaks_portuguese("en-US-JennyNeural"));
    }

    #[test]
    fn test_portugueseConfidence_shouldSeparateLanguages() {
        let pt = "A casa era muito antiga e ninguém sabia quando tinha sido construída.";
        let en = "The quick brown fox jumps over the lazy dog while nobody watches.";
        assert!(portuguese_confidence(pt) > 0.35);
        assert!(portuguese_confidence(en) < 0.35);
        assert_eq!(portuguese_confidence(""), 0.0);
    }

    #[test]
    fn test_getLanguageName_shouldReturnEnglishName() {
        assert_eq!(get_language_name("pt").unwrap(), "Portuguese");
    }
}
