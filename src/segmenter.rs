/*!
 * Sentence-aware segmentation of speakable text.
 *
 * Text is cut into sentence units (each owning its trailing whitespace) and the
 * units are packed greedily into segments bounded by `max_unit_size`
 * characters. A sentence that alone exceeds the bound is wrapped at word
 * boundaries. Concatenating the segments in index order gives back the input
 * byte for byte, and the same input always yields the same segments.
 */

use std::collections::{HashSet, VecDeque};

use crate::normalizer::abbreviations::AbbreviationDictionary;
use crate::normalizer::numbers::is_number_word;

/// Closing characters allowed after sentence punctuation
const CLOSERS: &[char] = &['"', '\'', ')', ']', '»', '”', '’'];

/// Short words that bind a spoken number phrase together ("cento e vinte")
const CONNECTORS: &[&str] = &["e", "de"];

/// Segmentation settings
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Maximum characters per segment, trailing whitespace included
    pub max_unit_size: usize,
    /// Characters that end a sentence
    pub terminal_punctuation: Vec<char>,
    /// Dotted abbreviations that do not end a sentence ("Sr.", "Sto.")
    pub protected_abbreviations: Vec<String>,
}

impl SegmenterConfig {
    pub fn new(max_unit_size: usize) -> Self {
        Self {
            max_unit_size,
            terminal_punctuation: vec!['.', '!', '?', '…'],
            protected_abbreviations: AbbreviationDictionary::default().protected_forms(),
        }
    }
}

/// One provider-sized piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    pub char_len: usize,
    pub byte_len: usize,
    /// Only the last segment of a sequence is final
    pub is_final: bool,
}

/// Sentence segmenter
#[derive(Debug, Clone)]
pub struct Segmenter {
    limit: usize,
    terminals: Vec<char>,
    // lowercase
    protected: HashSet<String>,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            limit: config.max_unit_size.max(1),
            terminals: config.terminal_punctuation,
            protected: config.protected_abbreviations.iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    pub fn max_unit_size(&self) -> usize {
        self.limit
    }

    /// Lazily segment `text`
    pub fn segments<'a>(&'a self, text: &'a str) -> Segments<'a> {
        Segments {
            segmenter: self,
            text,
            cursor: 0,
            queue: VecDeque::new(),
            acc_start: 0,
            acc_end: 0,
            acc_chars: 0,
            index: 0,
        }
    }

    /// Byte offset where the sentence unit starting at `from` ends
    fn unit_end(&self, text: &str, from: usize) -> usize {
        let mut pos = from;

        // leading whitespace belongs to the unit that follows it
        while let Some(c) = text[pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            pos += c.len_utf8();
        }

        while let Some(c) = text[pos..].chars().next() {
            if self.terminals.contains(&c) {
                let run_end = self.punctuation_run_end(text, pos);
                match text[run_end..].chars().next() {
                    None => return text.len(),
                    Some(next) if next.is_whitespace() => {
                        if &text[pos..run_end] == "." && self.is_protected(text, from, pos) {
                            pos = run_end;
                            continue;
                        }
                        return whitespace_run_end(text, run_end);
                    }
                    Some(_) => pos = run_end,
                }
            } else if c.is_whitespace() {
                let run_end = whitespace_run_end(text, pos);
                if text[pos..run_end].matches('\n').count() >= 2 {
                    return run_end;
                }
                pos = run_end;
            } else {
                pos += c.len_utf8();
            }
        }

        text.len()
    }

    fn punctuation_run_end(&self, text: &str, from: usize) -> usize {
        let mut end = from;
        for c in text[from..].chars() {
            if self.terminals.contains(&c) || CLOSERS.contains(&c) {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        end
    }

    /// Whether the word ending at the period at `period` is a protected abbreviation
    fn is_protected(&self, text: &str, unit_start: usize, period: usize) -> bool {
        let before = &text[unit_start..period];
        let word_start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());
        let word = &before[word_start..];
        if word.is_empty() {
            return false;
        }
        self.protected.contains(&format!("{}.", word.to_lowercase()))
    }
}

/// Convenience wrapper with default punctuation and abbreviations
pub fn segment(text: &str, max_unit_size: usize) -> Vec<Segment> {
    let segmenter = Segmenter::new(SegmenterConfig::new(max_unit_size));
    segmenter.segments(text).collect()
}

/// Lazy segment sequence
#[derive(Debug)]
pub struct Segments<'a> {
    segmenter: &'a Segmenter,
    text: &'a str,
    cursor: usize,
    queue: VecDeque<&'a str>,
    acc_start: usize,
    acc_end: usize,
    acc_chars: usize,
    index: usize,
}

impl<'a> Segments<'a> {
    fn next_unit(&mut self) -> Option<&'a str> {
        if let Some(piece) = self.queue.pop_front() {
            return Some(piece);
        }
        if self.cursor >= self.text.len() {
            return None;
        }
        let end = self.segmenter.unit_end(self.text, self.cursor);
        let unit = &self.text[self.cursor..end];
        self.cursor = end;
        Some(unit)
    }

    /// Byte offset of a unit inside the source text
    fn offset_of(&self, unit: &str) -> usize {
        unit.as_ptr() as usize - self.text.as_ptr() as usize
    }

    fn take_accumulated(&mut self, is_final: bool) -> Segment {
        let text = &self.text[self.acc_start..self.acc_end];
        let segment = Segment {
            index: self.index,
            text: text.to_string(),
            char_len: self.acc_chars,
            byte_len: text.len(),
            is_final,
        };
        self.index += 1;
        self.acc_start = self.acc_end;
        self.acc_chars = 0;
        segment
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let limit = self.segmenter.limit;

        while let Some(unit) = self.next_unit() {
            let chars = unit.chars().count();
            if chars > limit {
                let pieces = hard_wrap(unit, limit);
                if pieces.len() > 1 {
                    for piece in pieces.into_iter().rev() {
                        self.queue.push_front(piece);
                    }
                    continue;
                }
            }

            let start = self.offset_of(unit);
            if self.acc_chars == 0 {
                self.acc_start = start;
                self.acc_end = start + unit.len();
                self.acc_chars = chars;
                continue;
            }

            // merge while the segment stays within the limit
            if self.acc_chars + chars <= limit {
                self.acc_end = start + unit.len();
                self.acc_chars += chars;
                continue;
            }

            let segment = self.take_accumulated(false);
            self.acc_start = start;
            self.acc_end = start + unit.len();
            self.acc_chars = chars;
            return Some(segment);
        }

        if self.acc_end > self.acc_start {
            return Some(self.take_accumulated(true));
        }
        None
    }
}

fn whitespace_run_end(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(i, _)| from + i)
}

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
    chars: usize,
    space: bool,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        match tokens.last_mut() {
            Some(last) if last.space == space => {
                last.end = i + c.len_utf8();
                last.chars += 1;
            }
            _ => tokens.push(Token { start: i, end: i + c.len_utf8(), chars: 1, space }),
        }
    }
    tokens
}

fn binds_number_phrase(word: &str) -> bool {
    let bare = word.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase();
    is_number_word(word) || CONNECTORS.contains(&bare.as_str())
}

/// Whether cutting at whitespace token `k` would split a spoken number phrase
fn is_glued(text: &str, tokens: &[Token], k: usize) -> bool {
    let prev = k.checked_sub(1).and_then(|p| tokens.get(p));
    let next = tokens.get(k + 1);
    let (Some(prev), Some(next)) = (prev, next) else {
        return false;
    };
    let a = &text[prev.start..prev.end];
    let b = &text[next.start..next.end];
    binds_number_phrase(a) && binds_number_phrase(b) && (is_number_word(a) || is_number_word(b))
}

/// Split an oversize sentence at word boundaries.
///
/// Whitespace runs may be split, words never; a word longer than the limit
/// becomes a piece of its own.
fn hard_wrap(text: &str, limit: usize) -> Vec<&str> {
    let tokens = tokenize(text);
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut len = 0usize;
    // (whitespace token index, piece length after it)
    let mut cuts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let from = token.start.max(start);
        let chars = if from == token.start {
            token.chars
        } else {
            text[from..token.end].chars().count()
        };

        if len + chars <= limit {
            len += chars;
            if token.space {
                cuts.push((i, len));
            }
            i += 1;
            continue;
        }

        if token.space {
            let room = limit - len;
            let cut = text[from..token.end]
                .char_indices()
                .nth(room)
                .map_or(token.end, |(b, _)| from + b);
            if cut > start {
                pieces.push(&text[start..cut]);
            }
            start = cut;
            len = 0;
            cuts.clear();
            continue;
        }

        if len == 0 {
            pieces.push(&text[start..token.end]);
            start = token.end;
            cuts.clear();
            i += 1;
            continue;
        }

        let chosen = cuts
            .iter()
            .rev()
            .find(|(k, _)| !is_glued(text, &tokens, *k))
            .or(cuts.last())
            .copied();

        match chosen {
            Some((k, at)) => {
                let cut = tokens[k].end;
                pieces.push(&text[start..cut]);
                start = cut;
                len -= at;
                cuts = cuts
                    .into_iter()
                    .filter(|(j, _)| *j > k)
                    .map(|(j, l)| (j, l - at))
                    .collect();
            }
            None => {
                pieces.push(&text[start..token.start]);
                start = token.start;
                len = 0;
                cuts.clear();
            }
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_segment_initials_shouldGiveOneSentenceEach() {
        let segments = segment("A. B. C.", 5);
        assert_eq!(texts(&segments), vec!["A. ", "B. ", "C."]);
        assert_eq!(segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(segments[2].is_final);
        assert!(!segments[0].is_final && !segments[1].is_final);
    }

    #[test]
    fn test_segment_emptyText_shouldYieldNothing() {
        assert!(segment("", 10).is_empty());
    }

    #[test]
    fn test_segment_whitespaceOnly_shouldYieldOneSegment() {
        let segments = segment("   ", 10);
        assert_eq!(texts(&segments), vec!["   "]);
        assert!(segments[0].is_final);
    }

    #[test]
    fn test_segment_shouldBeLossless() {
        let text = "  Era uma vez um menino. Ele tinha cento e vinte e três livros!\n\n\
                    Capítulo 2. A viagem... \"Vamos?\" perguntou o Sr. Souza. Fim sem ponto";
        for limit in 1..=60 {
            let joined: String = segment(text, limit).iter().map(|s| s.text.as_str()).collect();
            assert_eq!(joined, text, "lossy at limit {}", limit);
        }
    }

    #[test]
    fn test_segment_shouldRespectLimitAndWordBoundaries() {
        let text = "O rato roeu a roupa do rei de Roma. A rainha ficou furiosa e mandou prender o rato imediatamente.";
        for limit in 12..=40 {
            let segments = segment(text, limit);
            for pair in segments.windows(2) {
                let boundary_ok = pair[0].text.ends_with(char::is_whitespace)
                    || pair[1].text.starts_with(char::is_whitespace);
                assert!(boundary_ok, "split inside a word at limit {}: {:?}", limit, pair);
            }
            for s in &segments {
                let single_word = !s.text.trim().contains(char::is_whitespace);
                assert!(s.char_len <= limit || single_word, "segment too long: {:?}", s);
                assert_eq!(s.char_len, s.text.chars().count());
                assert_eq!(s.byte_len, s.text.len());
            }
        }
    }

    #[test]
    fn test_segment_oversizeWord_shouldStandAlone() {
        let segments = segment("ab inconstitucionalissimamente cd", 10);
        assert_eq!(texts(&segments), vec!["ab ", "inconstitucionalissimamente", " cd"]);
    }

    #[test]
    fn test_segment_numberPhrase_shouldStayTogether() {
        let segments = segment("Ele pagou cento e vinte e três reais hoje.", 20);
        assert!(
            segments.iter().any(|s| s.text.contains("cento e vinte e três")),
            "number phrase was split: {:?}",
            texts(&segments)
        );
    }

    #[test]
    fn test_segment_protectedAbbreviation_shouldNotEndSentence() {
        let segments = segment("O Sr. Silva chegou. Depois saiu.", 20);
        assert_eq!(texts(&segments), vec!["O Sr. Silva chegou. ", "Depois saiu."]);
    }

    #[test]
    fn test_segment_paragraphBreak_shouldEndSentence() {
        let segments = segment("Título\n\nEra uma vez.", 15);
        assert_eq!(texts(&segments), vec!["Título\n\n", "Era uma vez."]);
    }

    #[test]
    fn test_segment_shortSentences_shouldBeMerged() {
        let segments = segment("Um. Dois. Três.", 100);
        assert_eq!(texts(&segments), vec!["Um. Dois. Três."]);
    }

    #[test]
    fn test_segment_exactFit_shouldShareSegment() {
        let segments = segment("Ab. Cd.", 7);
        assert_eq!(texts(&segments), vec!["Ab. Cd."]);
        assert_eq!(segments[0].char_len, 7);

        let segments = segment("Ab. Cd. Ef.", 8);
        assert_eq!(texts(&segments), vec!["Ab. Cd. ", "Ef."]);
    }

    #[test]
    fn test_segments_shouldBeRestartable() {
        let segmenter = Segmenter::new(SegmenterConfig::new(12));
        let text = "Primeira frase aqui. Segunda frase. Terceira.";
        let first: Vec<Segment> = segmenter.segments(text).collect();
        let second: Vec<Segment> = segmenter.segments(text).collect();
        assert_eq!(first, second);
    }
}
