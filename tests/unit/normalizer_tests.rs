/*!
 * Tests for normalization through the public API
 */

use anyhow::Result;
use narrador::app_config::NormalizationConfig;
use narrador::extraction::{DocumentExtractor, PlainTextExtractor};
use narrador::{segment, InputError, Normalizer};
use crate::common;

fn normalize(text: &str) -> String {
    Normalizer::default().normalize_text(text).unwrap().text.into_string()
}

/// Test titles, ages and money in one sentence
#[test]
fn test_normalize_titleAgeAndMoney_shouldBeSpoken() {
    let out = normalize("Dr. Silva tem 25 anos e ganhou R$ 1000");

    assert!(out.contains("Doutor Silva"));
    assert!(out.contains("vinte e cinco"));
    assert!(out.contains("mil reais"));
    assert!(!out.chars().any(|c| c.is_ascii_digit()));
}

/// Test ordinal indicators
#[test]
fn test_normalize_ordinal_shouldBeSpoken() {
    assert!(normalize("1º lugar").contains("primeiro lugar"));
}

/// Test chapter headings in capitals
#[test]
fn test_normalize_shoutedChapterHeading_shouldBeCanonical() {
    let out = normalize("CAPÍTULO IV - A JORNADA");

    assert!(out.contains("Capítulo 4"));
    assert!(out.contains("A Jornada"));
}

/// Test that configured acronyms keep their capitals
#[test]
fn test_normalize_customAcronym_shouldStayUppercase() {
    let mut config = NormalizationConfig::default();
    config.protected_acronyms.push("PETROBRAS".to_string());
    let normalizer = Normalizer::new(&config);

    let out = normalizer.normalize_text("A PETROBRAS DECIDIU ADIAR O LEILÃO").unwrap().text.into_string();

    assert!(out.contains("PETROBRAS Decidiu Adiar"));
}

/// Test extra abbreviations from the configuration
#[test]
fn test_normalize_extraAbbreviation_shouldBeExpanded() {
    let mut config = NormalizationConfig::default();
    config.extra_abbreviations.insert("Des.".to_string(), "Desembargador".to_string());
    let normalizer = Normalizer::new(&config);

    let out = normalizer.normalize_text("O Des. Moura chegou cedo.").unwrap().text.into_string();

    assert!(out.contains("Desembargador Moura"));
}

/// Test reading a document with a byte order mark from disk
#[test]
fn test_normalize_fileWithBom_shouldIgnoreBom() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(common::SAMPLE_STORY.as_bytes());
    let path = temp_dir.path().join("historia.txt");
    std::fs::write(&path, bytes)?;

    let document = PlainTextExtractor.extract_text(&path)?;
    let normalized = Normalizer::default().normalize(&document)?;

    assert!(normalized.text.as_str().starts_with("Capítulo 1"));
    assert!(normalized.warning.is_none());
    Ok(())
}

/// Test that a document with nothing speakable is rejected
#[test]
fn test_normalize_onlyPageNumbers_shouldBeEmpty() {
    let result = Normalizer::default().normalize_text("1\n\n2\n\n3\n");
    assert!(matches!(result, Err(InputError::Empty)));
}

/// Test that normalized text splits without losing characters
#[test]
fn test_normalizeThenSegment_shouldReassembleExactly() {
    let normalizer = Normalizer::default();
    let text = normalizer.normalize_text(common::SAMPLE_STORY).unwrap().text;

    for limit in [20, 50, 120, 4096] {
        let segments = segment(text.as_str(), limit);
        let joined: String = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, text.as_str(), "lossy at limit {}", limit);
    }
}

/// Test that normalizing twice changes nothing
#[test]
fn test_normalize_sampleStory_shouldBeIdempotent() {
    let normalizer = Normalizer::default();
    let once = normalizer.normalize_text(common::SAMPLE_STORY).unwrap().text;
    let twice = normalizer.normalize_text(once.as_str()).unwrap().text;
    assert_eq!(once, twice);
}
