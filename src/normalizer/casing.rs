/*!
 * Uppercase run normalization.
 *
 * Books often set headings and emphasis in capitals, which most voices spell
 * out letter by letter. Runs of uppercase words longer than the configured
 * threshold are converted to title case; known acronyms and roman numerals
 * keep their capitals.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::numbers::roman_to_arabic;
use super::rules::{RuleCategory, RuleEntry};

/// Acronyms read as letters or as a word in capitals
pub const DEFAULT_ACRONYMS: &[&str] = &[
    "ONU", "EUA", "CPF", "CNPJ", "CEP", "IBGE", "USP", "UFRJ", "UNICAMP", "UNESCO", "UNICEF",
    "NASA", "OTAN", "FIFA", "PIB", "INSS", "SUS", "STF", "STJ", "TSE", "BNDES", "DNA", "RNA",
    "HIV", "AIDS", "OMS", "MEC", "FGTS", "CLT", "OAB", "PF", "PM", "TV", "CD", "DVD", "ONG",
];

/// Words kept lowercase inside a title
const PARTICLES: &[&str] = &[
    "a", "o", "as", "os", "e", "de", "da", "do", "das", "dos", "em", "na", "no", "nas", "nos",
    "por", "para", "com", "um", "uma",
];

/// Valid roman numerals that are also Portuguese words
const ROMAN_LOOKALIKES: &[&str] = &["VI", "LI", "DI", "MI", "MIX"];

static RE_UPPER_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\p{Lu}[\p{Lu}\p{M}]*(?:[ \t]+\p{Lu}[\p{Lu}\p{M}]*)*\b").unwrap()
});
static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{M}]+").unwrap());

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

fn keeps_capitals(word: &str, acronyms: &HashSet<String>) -> bool {
    if acronyms.contains(word) {
        return true;
    }
    word.chars().count() > 1
        && !ROMAN_LOOKALIKES.contains(&word)
        && roman_to_arabic(word).is_some()
}

/// Title-case a phrase: particles stay lowercase except in first position
pub fn title_case(text: &str, acronyms: &HashSet<String>) -> String {
    let mut position = 0usize;
    RE_WORD
        .replace_all(text, |caps: &regex::Captures| {
            let word = &caps[0];
            let first = position == 0;
            position += 1;

            if keeps_capitals(word, acronyms) {
                return word.to_string();
            }
            let lower = word.to_lowercase();
            if !first && PARTICLES.contains(&lower.as_str()) {
                lower
            } else {
                capitalize_word(word)
            }
        })
        .into_owned()
}

/// Default acronym set
pub fn default_acronyms() -> HashSet<String> {
    DEFAULT_ACRONYMS.iter().map(|s| s.to_string()).collect()
}

/// Casing rule; `threshold` is the letter count a run must exceed
pub fn casing_rules(threshold: usize, acronyms: HashSet<String>) -> Vec<RuleEntry> {
    vec![RuleEntry::regex(
        "uppercase_runs",
        RuleCategory::Casing,
        0,
        RE_UPPER_RUN.clone(),
        move |caps, _| {
            let run = caps.get(0)?.as_str();
            let letters = run.chars().filter(|c| c.is_alphabetic()).count();
            if letters <= threshold {
                return None;
            }
            if run.split_whitespace().all(|w| keeps_capitals(w, &acronyms)) {
                return None;
            }
            Some(title_case(run, &acronyms))
        },
    )]
}
