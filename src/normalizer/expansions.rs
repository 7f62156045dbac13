/*!
 * Currency, symbol, ordinal and cardinal number expansion.
 *
 * Every replacer fails open: a value it cannot verbalize stays in the text
 * exactly as written.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::numbers::{
    cardinal, currency_phrase, digit_by_digit, fraction_digits, ordinal, Currency, Gender, DOLLAR,
    EURO, REAL,
};
use super::rules::{following, preceding, RuleCategory, RuleEntry};

const NUMBER: &str = r"\d{1,3}(?:\.\d{3})+|\d+";

static RE_CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(R\$|US\$|€)[ \t]*({NUMBER})(?:,(\d{{1,2}}))?\b(?:[ \t]+(mil|milhão|milhões|bilhão|bilhões|trilhão|trilhões)\b)?"
    ))
    .unwrap()
});

static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*%").unwrap());
static RE_AMPERSAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*&[ \t]*").unwrap());
static RE_AT_SIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*@[ \t]*").unwrap());
static RE_SECTION_SIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"§§?[ \t]*").unwrap());
static RE_TEMPERATURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*°[ \t]*([CF])\b").unwrap());
static RE_HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\p{L}[\p{L}\p{N}_]*)").unwrap());
static RE_STRAY_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*#~^|]+").unwrap());
static RE_COPYRIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*([©®™])").unwrap());

static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,6})\.?([ºª°])").unwrap());

static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3])(?::|h)([0-5]\d)\b|\b([01]?\d|2[0-3])h\b").unwrap());
static RE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER})[ \t]*-[ \t]*({NUMBER})\b")).unwrap());
static RE_NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(^|[\s(\[])[-−]({NUMBER})(?:,(\d+))?\b")).unwrap());
static RE_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER}),(\d+)\b")).unwrap());
static RE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"\b(?:{NUMBER})\b")).unwrap());

/// Parse a number that may use "." as thousands separator
fn parse_grouped(token: &str) -> Option<u64> {
    token.replace('.', "").parse().ok()
}

/// Speak an integer token; zero-padded tokens are read digit by digit
fn speak_integer(token: &str) -> Option<String> {
    let digits = token.replace('.', "");
    if digits.len() > 1 && digits.starts_with('0') {
        return digit_by_digit(&digits);
    }
    cardinal(digits.parse().ok()?)
}

/// Feminine form for counts of feminine nouns ("uma hora", "vinte e duas")
fn feminine_cardinal(n: u64) -> Option<String> {
    let words = cardinal(n)?;
    if let Some(stem) = words.strip_suffix("um") {
        Some(format!("{stem}uma"))
    } else if let Some(stem) = words.strip_suffix("dois") {
        Some(format!("{stem}duas"))
    } else {
        Some(words)
    }
}

fn follows_chapter_keyword(caps: &Captures, haystack: &str) -> bool {
    preceding(caps, haystack).ends_with("Capítulo ")
}

fn currency_for(symbol: &str) -> Currency {
    match symbol {
        "US$" => DOLLAR,
        "€" => EURO,
        _ => REAL,
    }
}

fn expand_currency(caps: &Captures) -> Option<String> {
    let currency = currency_for(&caps[1]);
    let integer = parse_grouped(&caps[2])?;

    if let Some(scale) = caps.get(4) {
        // "R$ 2 milhões" reads "dois milhões de reais"
        let amount = cardinal(integer)?;
        let connector = if scale.as_str() == "mil" { " " } else { " de " };
        return Some(format!("{} {}{}{}", amount, scale.as_str(), connector, currency.plural));
    }

    let cents = match caps.get(3) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<u32>().ok()? * 10,
        Some(m) => m.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    currency_phrase(integer, cents, &currency)
}

/// Money amount rules
pub fn currency_rules() -> Vec<RuleEntry> {
    vec![RuleEntry::regex("currency", RuleCategory::Currency, 0, RE_CURRENCY.clone(), |caps, _| {
        expand_currency(caps)
    })]
}

/// Symbol rules
pub fn symbol_rules() -> Vec<RuleEntry> {
    let c = RuleCategory::Symbol;
    vec![
        RuleEntry::template("percent", c, 0, RE_PERCENT.clone(), " por cento"),
        RuleEntry::template("ampersand", c, 10, RE_AMPERSAND.clone(), " e "),
        RuleEntry::template("at_sign", c, 20, RE_AT_SIGN.clone(), " arroba "),
        RuleEntry::template("section_sign", c, 30, RE_SECTION_SIGN.clone(), "parágrafo "),
        RuleEntry::regex("temperature", c, 40, RE_TEMPERATURE.clone(), |caps, _| {
            let scale = if &caps[1] == "C" { "Celsius" } else { "Fahrenheit" };
            Some(format!(" graus {}", scale))
        }),
        RuleEntry::regex("legal_marks", c, 50, RE_COPYRIGHT.clone(), |caps, _| {
            let word = match &caps[1] {
                "©" => "copyright",
                "®" => "marca registrada",
                _ => "marca comercial",
            };
            Some(format!(" {}", word))
        }),
        RuleEntry::template("hashtag", c, 60, RE_HASHTAG.clone(), "hashtag $1"),
        RuleEntry::template("stray_marks", c, 70, RE_STRAY_MARKS.clone(), " "),
    ]
}

/// Ordinal rules ("1º" → "primeiro", "3ª" → "terceira")
pub fn ordinal_rules() -> Vec<RuleEntry> {
    vec![RuleEntry::regex("ordinal", RuleCategory::Ordinal, 0, RE_ORDINAL.clone(), |caps, _| {
        let n: u64 = caps[1].parse().ok()?;
        let gender = if &caps[2] == "ª" { Gender::Feminine } else { Gender::Masculine };
        ordinal(n, gender)
    })]
}

/// Cardinal rules: times, ranges, negatives, decimals and plain integers
pub fn cardinal_rules() -> Vec<RuleEntry> {
    let c = RuleCategory::CardinalNumber;
    vec![
        RuleEntry::regex("time", c, 0, RE_TIME.clone(), |caps, _| {
            let (hour, minute) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(h), Some(m), _) => (h.as_str(), Some(m.as_str())),
                (_, _, Some(h)) => (h.as_str(), None),
                _ => return None,
            };
            let hour: u64 = hour.parse().ok()?;
            let hour_words = feminine_cardinal(hour)?;
            let hour_unit = if hour == 1 { "hora" } else { "horas" };

            match minute.map(str::parse::<u64>) {
                Some(Ok(0)) | None => Some(format!("{} {}", hour_words, hour_unit)),
                Some(Ok(m)) => {
                    let minute_unit = if m == 1 { "minuto" } else { "minutos" };
                    Some(format!("{} {} e {} {}", hour_words, hour_unit, cardinal(m)?, minute_unit))
                }
                Some(Err(_)) => None,
            }
        }),
        RuleEntry::regex("range", c, 10, RE_RANGE.clone(), |caps, haystack| {
            let before = preceding(caps, haystack);
            let after = following(caps, haystack);
            // part of a longer dash chain such as a date or phone number
            if before.ends_with('-') || after.starts_with('-') {
                return None;
            }
            if follows_chapter_keyword(caps, haystack) {
                return None;
            }
            Some(format!("{} a {}", speak_integer(&caps[1])?, speak_integer(&caps[2])?))
        }),
        RuleEntry::regex("negative", c, 15, RE_NEGATIVE.clone(), |caps, _| {
            let magnitude = match caps.get(3) {
                Some(fraction) => {
                    format!("{} vírgula {}", speak_integer(&caps[2])?, fraction_digits(fraction.as_str())?)
                }
                None => speak_integer(&caps[2])?,
            };
            Some(format!("{}menos {}", &caps[1], magnitude))
        }),
        RuleEntry::regex("decimal", c, 20, RE_DECIMAL.clone(), |caps, haystack| {
            // "1,2,3" is a list, not a decimal
            let after = following(caps, haystack);
            if after.starts_with(',') && after[1..].starts_with(|ch: char| ch.is_ascii_digit()) {
                return None;
            }
            Some(format!("{} vírgula {}", speak_integer(&caps[1])?, fraction_digits(&caps[2])?))
        }),
        RuleEntry::regex("integer", c, 30, RE_INTEGER.clone(), |caps, haystack| {
            if follows_chapter_keyword(caps, haystack) {
                return None;
            }
            speak_integer(caps.get(0)?.as_str())
        }),
    ]
}
