/*!
 * Chapter headings, the optional chapter index and section roman numerals.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

use super::casing::title_case;
use super::numbers::roman_to_arabic;
use super::rules::{RuleCategory, RuleEntry};

static RE_CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?i:cap[ií]tulo))[ \t]+([IVXLCDMivxlcdm]+|\d+)\b[ \t]*([:.\-–—])?[ \t]*(.*?)[ \t]*$",
    )
    .unwrap()
});

/// A heading as `canonical_heading` writes it, after paragraph tidy
static RE_CANONICAL_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Capítulo (\d+)\.(?: (.+))?$").unwrap());

/// Lead word of the index paragraph
pub const INDEX_TITLE: &str = "Índice.";

static RE_SECTION_ROMAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(Parte|PARTE|parte|Livro|LIVRO|livro|Título|TÍTULO|Volume|VOLUME|volume|Tomo|TOMO|tomo|Século|SÉCULO|século|Ato|ATO|ato)[ \t]+([IVXLCDM]+)\b",
    )
    .unwrap()
});

fn chapter_number(token: &str) -> Option<u32> {
    if token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        roman_to_arabic(&token.to_uppercase())
    }
}

/// Rewrite a chapter heading line as "Capítulo N. Title." on its own paragraph.
///
/// A lowercase keyword without separator followed by text is body prose
/// ("capítulo 3 mostra que...") and is left alone.
fn canonical_heading(caps: &Captures, acronyms: &HashSet<String>) -> Option<String> {
    let keyword = &caps[1];
    let separator = caps.get(3);
    let title = caps.get(4).map_or("", |m| m.as_str()).trim();

    let keyword_upper = keyword == keyword.to_uppercase();
    if !keyword_upper && separator.is_none() && !title.is_empty() {
        return None;
    }

    let number = chapter_number(&caps[2])?;
    if title.is_empty() {
        return Some(format!("\n\nCapítulo {}.\n\n", number));
    }

    let mut title = if title.chars().any(char::is_lowercase) {
        title.to_string()
    } else {
        title_case(title, acronyms)
    };
    if !title.ends_with(['.', '!', '?', '…', ':', ';']) {
        title.push('.');
    }
    Some(format!("\n\nCapítulo {}. {}\n\n", number, title))
}

/// One spoken paragraph listing every canonical chapter heading of `text`.
///
/// Entries read "Capítulo N: Title."; the paragraph never starts with the
/// chapter keyword, so it is not itself taken for a heading. `None` when the
/// text has no chapters.
pub fn chapter_index(text: &str) -> Option<String> {
    let entries: Vec<String> = RE_CANONICAL_HEADING
        .captures_iter(text)
        .map(|caps| {
            let title = caps
                .get(2)
                .map_or("", |m| m.as_str())
                .trim()
                .trim_end_matches(['.', ':', ';'])
                .trim_end();
            let mut entry = if title.is_empty() {
                format!("Capítulo {}", &caps[1])
            } else {
                format!("Capítulo {}: {}", &caps[1], title)
            };
            if !entry.ends_with(['!', '?', '…']) {
                entry.push('.');
            }
            entry
        })
        .collect();

    if entries.is_empty() {
        return None;
    }
    Some(format!("{} {}", INDEX_TITLE, entries.join(" ")))
}

/// Chapter heading rule
pub fn heading_rules(acronyms: HashSet<String>) -> Vec<RuleEntry> {
    vec![RuleEntry::regex(
        "chapter_heading",
        RuleCategory::ChapterHeading,
        0,
        RE_CHAPTER.clone(),
        move |caps, _| canonical_heading(caps, &acronyms),
    )]
}

/// Roman numerals after section keywords ("Parte II", "século XIX")
pub fn roman_numeral_rules() -> Vec<RuleEntry> {
    vec![RuleEntry::regex(
        "section_roman",
        RuleCategory::RomanNumeral,
        0,
        RE_SECTION_ROMAN.clone(),
        |caps, _| {
            let value = roman_to_arabic(&caps[2])?;
            Some(format!("{} {}", &caps[1], value))
        },
    )]
}
