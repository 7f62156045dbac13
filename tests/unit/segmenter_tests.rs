/*!
 * Tests for sentence segmentation
 */

use narrador::segmenter::SegmenterConfig;
use narrador::{segment, Normalizer, Segmenter};
use crate::common;

/// Test initials that each fill a segment
#[test]
fn test_segment_shortSentences_atTightLimit_shouldStaySeparate() {
    let segments = segment("A. B. C.", 5);

    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].text.trim(), "A.");
    assert_eq!(segments[1].text.trim(), "B.");
    assert_eq!(segments[2].text.trim(), "C.");
    assert_eq!(segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
}

/// Test that the limit from the configuration is honored on normalized text
#[test]
fn test_segment_normalizedStory_shouldRespectLimit() {
    let normalizer = Normalizer::default();
    let text = normalizer.normalize_text(common::SAMPLE_STORY).unwrap().text;
    let segmenter = Segmenter::new(SegmenterConfig {
        max_unit_size: 60,
        terminal_punctuation: vec!['.', '!', '?'],
        protected_abbreviations: normalizer.protected_abbreviations().to_vec(),
    });

    let segments: Vec<_> = segmenter.segments(text.as_str()).collect();

    assert!(segments.len() > 1);
    assert!(segments.iter().all(|s| s.char_len <= 60));
    assert_eq!(segments.iter().filter(|s| s.is_final).count(), 1);
    assert!(segments.last().unwrap().is_final);
}

/// Test that multi-byte characters are counted as characters
#[test]
fn test_segment_accentedText_shouldCountChars() {
    let text = "Ação é emoção. Coração não é razão.";
    let segments = segment(text, 15);

    for s in &segments {
        assert_eq!(s.char_len, s.text.chars().count());
        assert_eq!(s.byte_len, s.text.len());
    }
    assert!(segments.iter().any(|s| s.byte_len > s.char_len));
}
