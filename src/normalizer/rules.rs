/*!
 * Rule table primitives.
 *
 * A rule is either a regex with a replacement function or a whole-text
 * transform. Rules are grouped by category; categories run in declaration
 * order and rules inside a category run by ascending priority.
 */

use regex::{Captures, Regex};
use std::fmt;

/// Rule categories in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleCategory {
    /// Character cleanup, markup stripping, hyphenation repair
    Markup,
    /// Page numbers, running headers and footers
    Metadata,
    /// Chapter heading canonicalization
    ChapterHeading,
    /// Roman numerals after section keywords
    RomanNumeral,
    /// Dictionary abbreviations
    Abbreviation,
    /// Money amounts
    Currency,
    /// Symbols such as % and &
    Symbol,
    /// Numbers with an ordinal marker
    Ordinal,
    /// Plain numbers, ranges and decimals
    CardinalNumber,
    /// Uppercase run normalization
    Casing,
    /// Paragraph reflow and whitespace tidy
    Whitespace,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 11] = [
        RuleCategory::Markup,
        RuleCategory::Metadata,
        RuleCategory::ChapterHeading,
        RuleCategory::RomanNumeral,
        RuleCategory::Abbreviation,
        RuleCategory::Currency,
        RuleCategory::Symbol,
        RuleCategory::Ordinal,
        RuleCategory::CardinalNumber,
        RuleCategory::Casing,
        RuleCategory::Whitespace,
    ];
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleCategory::Markup => "markup",
            RuleCategory::Metadata => "metadata",
            RuleCategory::ChapterHeading => "chapter_heading",
            RuleCategory::RomanNumeral => "roman_numeral",
            RuleCategory::Abbreviation => "abbreviation",
            RuleCategory::Currency => "currency",
            RuleCategory::Symbol => "symbol",
            RuleCategory::Ordinal => "ordinal",
            RuleCategory::CardinalNumber => "cardinal_number",
            RuleCategory::Casing => "casing",
            RuleCategory::Whitespace => "whitespace",
        };
        write!(f, "{}", name)
    }
}

/// Replacement callback: receives the match and the whole haystack so it can
/// look at surrounding text. `None` keeps the matched text unchanged.
pub type Replacer = Box<dyn Fn(&Captures, &str) -> Option<String> + Send + Sync>;

/// Whole-text transform
pub type Transform = Box<dyn Fn(&str) -> String + Send + Sync>;

enum RuleAction {
    Regex { pattern: Regex, replace: Replacer },
    Transform(Transform),
}

/// One entry of the rule table
pub struct RuleEntry {
    pub name: &'static str,
    pub category: RuleCategory,
    pub priority: u16,
    action: RuleAction,
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .finish()
    }
}

impl RuleEntry {
    /// Regex rule with a replacement callback
    pub fn regex<F>(
        name: &'static str,
        category: RuleCategory,
        priority: u16,
        pattern: Regex,
        replace: F,
    ) -> Self
    where
        F: Fn(&Captures, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name,
            category,
            priority,
            action: RuleAction::Regex { pattern, replace: Box::new(replace) },
        }
    }

    /// Regex rule with a fixed template (`$1` style expansion)
    pub fn template(
        name: &'static str,
        category: RuleCategory,
        priority: u16,
        pattern: Regex,
        template: &'static str,
    ) -> Self {
        Self::regex(name, category, priority, pattern, move |caps, _| {
            let mut out = String::new();
            caps.expand(template, &mut out);
            Some(out)
        })
    }

    /// Whole-text rule
    pub fn transform<F>(name: &'static str, category: RuleCategory, priority: u16, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self { name, category, priority, action: RuleAction::Transform(Box::new(f)) }
    }

    /// Apply this rule to the text
    pub fn apply(&self, text: &str) -> String {
        match &self.action {
            RuleAction::Transform(f) => f(text),
            RuleAction::Regex { pattern, replace } => {
                let mut out = String::with_capacity(text.len());
                let mut last = 0;
                for caps in pattern.captures_iter(text) {
                    let Some(whole) = caps.get(0) else { continue };
                    out.push_str(&text[last..whole.start()]);
                    match replace(&caps, text) {
                        Some(replacement) => out.push_str(&replacement),
                        None => out.push_str(whole.as_str()),
                    }
                    last = whole.end();
                }
                out.push_str(&text[last..]);
                out
            }
        }
    }
}

/// Ordered collection of rules
#[derive(Debug, Default)]
pub struct RuleTable {
    entries: Vec<RuleEntry>,
}

impl RuleTable {
    pub fn new(entries: Vec<RuleEntry>) -> Self {
        let mut table = Self { entries };
        table.sort();
        table
    }

    fn sort(&mut self) {
        // stable, so equal priorities keep insertion order
        self.entries.sort_by_key(|e| (e.category, e.priority));
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = RuleEntry>) {
        self.entries.extend(entries);
        self.sort();
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the rules of one category
    pub fn apply_category(&self, category: RuleCategory, text: &str) -> String {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }

    /// Run every rule in pipeline order
    pub fn apply(&self, text: &str) -> String {
        self.entries.iter().fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }
}

/// Text preceding a match, used by replacers that need left context
pub fn preceding<'h>(caps: &Captures, haystack: &'h str) -> &'h str {
    caps.get(0).map_or("", |m| &haystack[..m.start()])
}

/// Text following a match
pub fn following<'h>(caps: &Captures, haystack: &'h str) -> &'h str {
    caps.get(0).map_or("", |m| &haystack[m.end()..])
}
