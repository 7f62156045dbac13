/*!
 * Markup, metadata and whitespace rules.
 *
 * These run first (character and markup cleanup, page furniture removal) and
 * last (paragraph reflow) in the normalization pipeline.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use super::rules::{RuleCategory, RuleEntry};

static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>\n]{0,200}>").unwrap());
static RE_MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]\n]+)\]\([^)\n]*\)").unwrap());
static RE_MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static RE_HORIZONTAL_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*_][ \t]*){3,}$").unwrap());
static RE_LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+•][ \t]+").unwrap());
static RE_HYPHENATED_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

static RE_PAGE_NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d{1,5}[ \t]*(?:\n|$)").unwrap());
static RE_PAGE_OF_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d{1,5}[ \t]*/[ \t]*\d{1,5}[ \t]*(?:\n|$)").unwrap());
static RE_PAGE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^[ \t]*(?:p[áa]gina|p[áa]g\.|page)[ \t]+\d+(?:[ \t]+(?:de|of)[ \t]+\d+)?[ \t]*(?:\n|$)")
        .unwrap()
});
static RE_TYPESET_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^\n]*\.indd\b[^\n]*(?:\n|$)").unwrap());

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").unwrap());
static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\n]+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([,.;:!?…)\]])").unwrap());
static RE_SPACE_AFTER_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([(\[]) +").unwrap());

/// Characters that already close a paragraph
const TERMINALS: &[char] = &['.', '!', '?', '…', ':', ';'];

/// Closing characters that may follow the terminal punctuation
const CLOSERS: &[char] = &['"', '\'', ')', ']', '»', '”', '’'];

/// Fold typographic characters and drop control characters
pub fn clean_characters(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\u{FEFF}' | '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => {}
            '\u{000C}' => out.push_str("\n\n"),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\t' => out.push(' '),
            '“' | '”' | '„' | '«' | '»' => out.push('"'),
            '‘' | '’' | '‚' => out.push('\''),
            '–' | '—' | '‒' | '―' => out.push('-'),
            '…' => out.push_str("..."),
            '\n' => out.push('\n'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

/// Markup rules: characters, HTML, Markdown, broken hyphenation
pub fn markup_rules() -> Vec<RuleEntry> {
    let c = RuleCategory::Markup;
    vec![
        RuleEntry::transform("character_cleanup", c, 0, clean_characters),
        RuleEntry::template("html_tags", c, 10, RE_HTML_TAG.clone(), ""),
        RuleEntry::template("markdown_links", c, 20, RE_MARKDOWN_LINK.clone(), "$1"),
        RuleEntry::template("markdown_headings", c, 30, RE_MARKDOWN_HEADING.clone(), ""),
        RuleEntry::template("markdown_bold", c, 40, RE_BOLD.clone(), "$1$2"),
        RuleEntry::template("markdown_italic", c, 41, RE_ITALIC.clone(), "$1"),
        RuleEntry::template("inline_code", c, 42, RE_INLINE_CODE.clone(), "$1"),
        RuleEntry::template("horizontal_rules", c, 50, RE_HORIZONTAL_RULE.clone(), ""),
        RuleEntry::template("list_markers", c, 51, RE_LIST_MARKER.clone(), ""),
        RuleEntry::template("hyphenated_line_break", c, 60, RE_HYPHENATED_BREAK.clone(), "$1$2"),
    ]
}

/// Metadata rules: page numbers, running headers, typesetting footers
pub fn metadata_rules() -> Vec<RuleEntry> {
    let c = RuleCategory::Metadata;
    vec![
        RuleEntry::template("typesetting_footer", c, 0, RE_TYPESET_FOOTER.clone(), ""),
        RuleEntry::template("page_header", c, 10, RE_PAGE_HEADER.clone(), ""),
        RuleEntry::template("page_of_total", c, 20, RE_PAGE_OF_LINE.clone(), ""),
        RuleEntry::template("page_number_line", c, 30, RE_PAGE_NUMBER_LINE.clone(), ""),
    ]
}

/// Final paragraph tidy.
///
/// `abbreviations` holds lowercase dotted abbreviations; a paragraph whose last
/// word would become one of them does not get a period appended.
pub fn whitespace_rules(abbreviations: Arc<HashSet<String>>) -> Vec<RuleEntry> {
    vec![RuleEntry::transform(
        "paragraph_tidy",
        RuleCategory::Whitespace,
        0,
        move |text| tidy_paragraphs(text, &abbreviations),
    )]
}

fn tidy_paragraphs(text: &str, abbreviations: &HashSet<String>) -> String {
    RE_PARAGRAPH_BREAK
        .split(text)
        .filter_map(|paragraph| tidy_paragraph(paragraph, abbreviations))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn tidy_paragraph(paragraph: &str, abbreviations: &HashSet<String>) -> Option<String> {
    let collapsed = RE_HORIZONTAL_WS.replace_all(paragraph, " ");
    let collapsed = RE_SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    let collapsed = RE_SPACE_AFTER_OPEN.replace_all(&collapsed, "$1");
    let mut tidy = collapsed.trim().to_string();

    if !tidy.chars().any(char::is_alphanumeric) {
        return None;
    }

    if !ends_with_terminal(&tidy) {
        let last_word = tidy.rsplit(' ').next().unwrap_or("").to_lowercase();
        if !abbreviations.contains(&format!("{}.", last_word)) {
            tidy.push('.');
        }
    }

    Some(tidy)
}

fn ends_with_terminal(text: &str) -> bool {
    let trimmed = text.trim_end_matches(CLOSERS);
    trimmed.ends_with(TERMINALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::rules::RuleTable;

    fn apply(rules: Vec<RuleEntry>, text: &str) -> String {
        RuleTable::new(rules).apply(text)
    }

    #[test]
    fn test_cleanCharacters_shouldFoldTypography() {
        let cleaned = clean_characters("\u{FEFF}“Olá” – disse…\r\nfim\u{0007}");
        assert_eq!(cleaned, "\"Olá\" - disse...\nfim");
    }

    #[test]
    fn test_markupRules_shouldStripMarkdownAndHtml() {
        let text = "# Título\n**negrito** e *itálico* com [link](http://x.y) e <b>tag</b>";
        let cleaned = apply(markup_rules(), text);
        assert_eq!(cleaned, "Título\nnegrito e itálico com link e tag");
    }

    #[test]
    fn test_markupRules_shouldRejoinHyphenatedWords() {
        let cleaned = apply(markup_rules(), "um exem-\nplo simples");
        assert_eq!(cleaned, "um exemplo simples");
    }

    #[test]
    fn test_metadataRules_shouldDropPageFurniture() {
        let text = "Primeira linha\n12\nPágina 3 de 10\ncda_pr_livro.indd 45 10/02/2020\nSegunda linha";
        let cleaned = apply(metadata_rules(), text);
        assert_eq!(cleaned, "Primeira linha\nSegunda linha");
    }

    #[test]
    fn test_whitespaceRules_shouldReflowAndTerminate() {
        let rules = whitespace_rules(Arc::new(HashSet::new()));
        let tidy = apply(rules, "  linha um\nlinha  dois \n\n\n***\n\nOutro parágrafo!  ");
        assert_eq!(tidy, "linha um linha dois.\n\nOutro parágrafo!");
    }

    #[test]
    fn test_whitespaceRules_shouldNotTerminateWithAbbreviation() {
        let mut set = HashSet::new();
        set.insert("sr.".to_string());
        let tidy = apply(whitespace_rules(Arc::new(set)), "falou com o Sr");
        assert_eq!(tidy, "falou com o Sr");
    }

    #[test]
    fn test_whitespaceRules_shouldRespectClosingQuote() {
        let tidy = apply(whitespace_rules(Arc::new(HashSet::new())), "Ele disse: \"vamos.\"");
        assert_eq!(tidy, "Ele disse: \"vamos.\"");
    }
}
