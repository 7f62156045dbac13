/*!
 * Abbreviation expansion.
 *
 * Dotted abbreviations expand only when followed by whitespace or the end of
 * the text. Title abbreviations ("Dr.", "Sra.") precede a name and drop their
 * period; the others keep it when they close a sentence.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use super::rules::{following, preceding, RuleCategory, RuleEntry};

/// Abbreviations placed before a name
const TITLES: &[(&str, &str)] = &[
    ("Dr.", "Doutor"),
    ("Dra.", "Doutora"),
    ("Sr.", "Senhor"),
    ("Sra.", "Senhora"),
    ("Srta.", "Senhorita"),
    ("Prof.", "Professor"),
    ("Profa.", "Professora"),
    ("Eng.", "Engenheiro"),
    ("Engª.", "Engenheira"),
    ("Adm.", "Administrador"),
    ("Adv.", "Advogado"),
    ("Exmo.", "Excelentíssimo"),
    ("Exma.", "Excelentíssima"),
    ("V.Exa.", "Vossa Excelência"),
    ("V.Sa.", "Vossa Senhoria"),
    ("Pe.", "Padre"),
    ("Av.", "Avenida"),
];

const GENERAL: &[(&str, &str)] = &[
    ("Km.", "Quilômetro"),
    ("etc.", "etcétera"),
    ("Ref.", "Referência"),
    ("Pag.", "Página"),
    ("Pág.", "Página"),
    ("Págs.", "Páginas"),
    ("Pags.", "Páginas"),
    ("Fl.", "Folha"),
    ("Fls.", "Folhas"),
    ("Dept.", "Departamento"),
    ("Depto.", "Departamento"),
    ("Univ.", "Universidade"),
    ("Inst.", "Instituição"),
    ("Est.", "Estado"),
    ("Tel.", "Telefone"),
    ("CEP.", "Código de Endereçamento Postal"),
    ("CNPJ.", "Cadastro Nacional da Pessoa Jurídica"),
    ("CPF.", "Cadastro de Pessoas Físicas"),
    ("EUA.", "Estados Unidos da América"),
    ("Ed.", "Edição"),
    ("Ltda.", "Limitada"),
];

/// Chat-style shorthand, matched as whole words
const INFORMAL: &[(&str, &str)] = &[
    ("vcs", "vocês"),
    ("vc", "você"),
    ("tbm", "também"),
    ("tb", "também"),
    ("td", "tudo"),
    ("pq", "porque"),
];

/// Dotted forms that never end a sentence but have no expansion
const SEGMENTATION_ONLY: &[&str] = &[
    "Sto.", "Sta.", "p.", "pp.", "ex.", "cf.", "op.", "cit.", "vol.", "cap.", "art.", "n.",
];

static RE_INFORMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:vcs|vc|tbm|tb|td|pq)\b").unwrap());
static RE_AMBIGUOUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([DR])\.[ \t]+(\p{Lu})").unwrap());
static RE_NUMBER_SIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[Nn]\.?[º°]\.?[ \t]*(\d)").unwrap());
static RE_TRAILING_INITIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}\.\s*$").unwrap());

#[derive(Debug, Clone)]
struct Abbreviation {
    short: String,
    expansion: String,
    title: bool,
}

/// Dictionary of abbreviations and their spoken form
#[derive(Debug, Clone)]
pub struct AbbreviationDictionary {
    // keyed by lowercase short form
    entries: HashMap<String, Abbreviation>,
}

impl Default for AbbreviationDictionary {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl AbbreviationDictionary {
    /// Built-in dictionary merged with user entries; user entries win
    pub fn new(extra: &HashMap<String, String>) -> Self {
        let mut entries = HashMap::new();
        let builtin = TITLES
            .iter()
            .map(|(s, e)| (*s, *e, true))
            .chain(GENERAL.iter().map(|(s, e)| (*s, *e, false)));

        for (short, expansion, title) in builtin {
            entries.insert(
                short.to_lowercase(),
                Abbreviation { short: short.to_string(), expansion: expansion.to_string(), title },
            );
        }

        for (short, expansion) in extra {
            let short = short.trim();
            if short.is_empty() {
                continue;
            }
            entries.insert(
                short.to_lowercase(),
                Abbreviation {
                    short: short.to_string(),
                    expansion: expansion.clone(),
                    title: false,
                },
            );
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowercase dotted forms, for the paragraph tidy
    pub fn dotted_forms(&self) -> HashSet<String> {
        self.entries.keys().filter(|k| k.ends_with('.')).cloned().collect()
    }

    /// Forms the segmenter must not treat as sentence ends
    pub fn protected_forms(&self) -> Vec<String> {
        let mut forms: Vec<String> = self
            .entries
            .values()
            .filter(|a| a.short.ends_with('.'))
            .map(|a| a.short.clone())
            .chain(SEGMENTATION_ONLY.iter().map(|s| s.to_string()))
            .chain(["D.", "R."].iter().map(|s| s.to_string()))
            .collect();
        forms.sort();
        forms.dedup();
        forms
    }

    fn pattern(&self) -> Option<Regex> {
        let mut shorts: Vec<&str> = self.entries.values().map(|a| a.short.as_str()).collect();
        if shorts.is_empty() {
            return None;
        }
        shorts.sort_by_key(|s| Reverse(s.chars().count()));

        let alternation = shorts.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|");
        Regex::new(&format!(r"(?i)\b(?:{})", alternation)).ok()
    }

    fn expand(&self, caps: &Captures, haystack: &str) -> Option<String> {
        let matched = caps.get(0)?.as_str();
        let entry = self.entries.get(&matched.to_lowercase())?;
        let rest = following(caps, haystack);

        let boundary_ok = if entry.short.ends_with('.') {
            rest.is_empty() || rest.starts_with(char::is_whitespace)
        } else {
            !rest.starts_with(char::is_alphanumeric)
        };
        if !boundary_ok {
            return None;
        }

        let mut spoken = match_case(matched, &entry.short, &entry.expansion);
        if !entry.title && entry.short.ends_with('.') && closes_sentence(rest) {
            spoken.push('.');
        }
        Some(spoken)
    }
}

/// Apply the casing of `matched` to the expansion
fn match_case(matched: &str, short: &str, expansion: &str) -> String {
    if matched == short {
        expansion.to_string()
    } else if matched == matched.to_lowercase() {
        expansion.to_lowercase()
    } else if matched == matched.to_uppercase() {
        expansion.to_uppercase()
    } else if matched.starts_with(char::is_uppercase) {
        capitalize(expansion)
    } else {
        expansion.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether the text after an abbreviation starts a new sentence
fn closes_sentence(rest: &str) -> bool {
    let trimmed = rest.trim_start();
    match trimmed.chars().next() {
        None => true,
        Some(c) => c.is_uppercase() && rest.len() != trimmed.len(),
    }
}

/// Abbreviation rules built from a dictionary
pub fn abbreviation_rules(dictionary: AbbreviationDictionary) -> Vec<RuleEntry> {
    let c = RuleCategory::Abbreviation;
    let mut rules = Vec::new();

    rules.push(RuleEntry::regex("number_sign", c, 0, RE_NUMBER_SIGN.clone(), |caps, _| {
        Some(format!("número {}", &caps[1]))
    }));

    if let Some(pattern) = dictionary.pattern() {
        rules.push(RuleEntry::regex("dictionary", c, 10, pattern, move |caps, haystack| {
            dictionary.expand(caps, haystack)
        }));
    }

    rules.push(RuleEntry::regex("ambiguous_initial", c, 20, RE_AMBIGUOUS.clone(), expand_ambiguous));

    rules.push(RuleEntry::regex("informal", c, 30, RE_INFORMAL.clone(), |caps, _| {
        let matched = caps.get(0)?.as_str();
        let lower = matched.to_lowercase();
        let (short, expansion) = INFORMAL.iter().find(|(s, _)| *s == lower)?;
        Some(match_case(matched, short, expansion))
    }));

    rules
}

/// "D." and "R." are also initials, so they expand only before a capitalized
/// word and outside a chain of initials ("J. R. R. Tolkien").
fn expand_ambiguous(caps: &Captures, haystack: &str) -> Option<String> {
    if RE_TRAILING_INITIAL.is_match(preceding(caps, haystack)) {
        return None;
    }
    // next word is itself an initial
    if following(caps, haystack).starts_with('.') {
        return None;
    }

    let word = match &caps[1] {
        "D" => "Dona",
        _ => "Rua",
    };
    Some(format!("{} {}", word, &caps[2]))
}
