/*!
 * Brazilian Portuguese number verbalization.
 *
 * Cardinals use magnitude grouping (mil, milhão, bilhão, trilhão) with the
 * usual "e" conjunctions. Ordinals inflect for gender. Roman numerals are
 * parsed strictly, so malformed sequences are rejected instead of guessed.
 */

/// Largest integer rendered as words; anything above stays as digits
pub const MAX_CARDINAL: u64 = 999_999_999_999_999;

/// Largest integer rendered as an ordinal
pub const MAX_ORDINAL: u64 = 999_999;

const UNITS: [&str; 20] = [
    "zero", "um", "dois", "três", "quatro", "cinco", "seis", "sete", "oito", "nove", "dez",
    "onze", "doze", "treze", "catorze", "quinze", "dezesseis", "dezessete", "dezoito",
    "dezenove",
];

const TENS: [&str; 10] = [
    "", "", "vinte", "trinta", "quarenta", "cinquenta", "sessenta", "setenta", "oitenta",
    "noventa",
];

const HUNDREDS: [&str; 10] = [
    "", "cento", "duzentos", "trezentos", "quatrocentos", "quinhentos", "seiscentos",
    "setecentos", "oitocentos", "novecentos",
];

const SCALES: [(u64, &str, &str); 4] = [
    (1_000_000_000_000, "trilhão", "trilhões"),
    (1_000_000_000, "bilhão", "bilhões"),
    (1_000_000, "milhão", "milhões"),
    (1_000, "mil", "mil"),
];

const ORDINAL_UNITS: [&str; 10] = [
    "", "primeiro", "segundo", "terceiro", "quarto", "quinto", "sexto", "sétimo", "oitavo",
    "nono",
];

const ORDINAL_TENS: [&str; 10] = [
    "", "décimo", "vigésimo", "trigésimo", "quadragésimo", "quinquagésimo", "sexagésimo",
    "septuagésimo", "octogésimo", "nonagésimo",
];

const ORDINAL_HUNDREDS: [&str; 10] = [
    "", "centésimo", "ducentésimo", "trecentésimo", "quadringentésimo", "quingentésimo",
    "sexcentésimo", "septingentésimo", "octingentésimo", "noningentésimo",
];

/// Grammatical gender carried by an ordinal marker (º or ª)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Masculine,
    Feminine,
}

/// Currency vocabulary used by `currency_phrase`
#[derive(Debug, Clone, Copy)]
pub struct Currency {
    pub singular: &'static str,
    pub plural: &'static str,
    pub cent_singular: &'static str,
    pub cent_plural: &'static str,
}

pub const REAL: Currency = Currency {
    singular: "real",
    plural: "reais",
    cent_singular: "centavo",
    cent_plural: "centavos",
};

pub const DOLLAR: Currency = Currency {
    singular: "dólar",
    plural: "dólares",
    cent_singular: "centavo",
    cent_plural: "centavos",
};

pub const EURO: Currency = Currency {
    singular: "euro",
    plural: "euros",
    cent_singular: "cêntimo",
    cent_plural: "cêntimos",
};

fn below_thousand(n: u64) -> String {
    debug_assert!(n < 1000);
    if n == 100 {
        return "cem".to_string();
    }

    let mut parts: Vec<&str> = Vec::with_capacity(3);
    let hundreds = (n / 100) as usize;
    let rest = (n % 100) as usize;

    if hundreds > 0 {
        parts.push(HUNDREDS[hundreds]);
    }
    if rest > 0 {
        if rest < 20 {
            parts.push(UNITS[rest]);
        } else {
            parts.push(TENS[rest / 10]);
            if rest % 10 > 0 {
                parts.push(UNITS[rest % 10]);
            }
        }
    }

    parts.join(" e ")
}

/// Spell out a non-negative integer.
///
/// Returns `None` above `MAX_CARDINAL`.
pub fn cardinal(n: u64) -> Option<String> {
    if n > MAX_CARDINAL {
        return None;
    }
    if n == 0 {
        return Some(UNITS[0].to_string());
    }

    // (words, group multiplier)
    let mut groups: Vec<(String, u64)> = Vec::new();
    let mut remaining = n;

    for (scale, singular, plural) in SCALES {
        let multiplier = remaining / scale;
        remaining %= scale;
        if multiplier == 0 {
            continue;
        }

        let words = if scale == 1_000 {
            if multiplier == 1 {
                singular.to_string()
            } else {
                format!("{} {}", below_thousand(multiplier), singular)
            }
        } else if multiplier == 1 {
            format!("um {}", singular)
        } else {
            format!("{} {}", below_thousand(multiplier), plural)
        };
        groups.push((words, multiplier));
    }

    if remaining > 0 {
        groups.push((below_thousand(remaining), remaining));
    }

    let last = groups.len() - 1;
    let mut out = String::new();
    for (i, (words, multiplier)) in groups.iter().enumerate() {
        if i > 0 {
            // "mil e cem", "dois mil e um", but "mil duzentos e cinquenta"
            if i == last && (*multiplier < 100 || multiplier % 100 == 0) {
                out.push_str(" e ");
            } else {
                out.push(' ');
            }
        }
        out.push_str(words);
    }

    Some(out)
}

fn inflect(word: &str, gender: Gender) -> String {
    match gender {
        Gender::Masculine => word.to_string(),
        Gender::Feminine => match word.strip_suffix('o') {
            Some(stem) => format!("{}a", stem),
            None => word.to_string(),
        },
    }
}

/// Spell out an ordinal ("primeiro", "vigésima terceira").
///
/// Returns `None` for zero and above `MAX_ORDINAL`.
pub fn ordinal(n: u64, gender: Gender) -> Option<String> {
    if n == 0 || n > MAX_ORDINAL {
        return None;
    }

    let mut words: Vec<String> = Vec::new();
    let thousands = n / 1000;
    let rest = (n % 1000) as usize;

    if thousands == 1 {
        words.push(inflect("milésimo", gender));
    } else if thousands > 1 {
        words.push(cardinal(thousands)?);
        words.push(inflect("milésimo", gender));
    }

    for word in [
        ORDINAL_HUNDREDS[rest / 100],
        ORDINAL_TENS[(rest % 100) / 10],
        ORDINAL_UNITS[rest % 10],
    ] {
        if !word.is_empty() {
            words.push(inflect(word, gender));
        }
    }

    Some(words.join(" "))
}

fn roman_value(c: char) -> Option<u32> {
    match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    }
}

/// Render a value as canonical uppercase roman numerals
pub fn arabic_to_roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"), (900, "CM"), (500, "D"), (400, "CD"), (100, "C"), (90, "XC"),
        (50, "L"), (40, "XL"), (10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I"),
    ];

    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

/// Parse an uppercase roman numeral using subtractive notation.
///
/// Only canonical forms are accepted: "IIII" or "VX" yield `None`.
pub fn roman_to_arabic(numeral: &str) -> Option<u32> {
    if numeral.is_empty() || numeral.len() > 15 {
        return None;
    }

    let values: Vec<u32> = numeral.chars().map(roman_value).collect::<Option<_>>()?;
    let mut total: i64 = 0;
    for (i, value) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > value => total -= i64::from(*value),
            _ => total += i64::from(*value),
        }
    }

    let total = u32::try_from(total).ok()?;
    if total == 0 || total >= 4000 || arabic_to_roman(total) != numeral {
        return None;
    }
    Some(total)
}

/// Verbalize a money amount ("mil reais", "um real e cinquenta centavos")
pub fn currency_phrase(integer: u64, cents: u32, currency: &Currency) -> Option<String> {
    if integer == 0 && cents == 0 {
        return Some(format!("zero {}", currency.plural));
    }

    let mut parts: Vec<String> = Vec::with_capacity(2);
    if integer > 0 {
        let words = cardinal(integer)?;
        let unit = if integer == 1 {
            format!(" {}", currency.singular)
        } else if integer % 1_000_000 == 0 {
            format!(" de {}", currency.plural)
        } else {
            format!(" {}", currency.plural)
        };
        parts.push(words + &unit);
    }
    if cents > 0 {
        let words = cardinal(cents as u64)?;
        let unit = if cents == 1 { currency.cent_singular } else { currency.cent_plural };
        parts.push(format!("{} {}", words, unit));
    }

    Some(parts.join(" e "))
}

/// Verbalize the digits after a decimal comma.
///
/// Leading zeros are read digit by digit ("zero cinco").
pub fn fraction_digits(digits: &str) -> Option<String> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return digit_by_digit(digits);
    }
    cardinal(digits.parse().ok()?)
}

/// Read a digit string one digit at a time
pub fn digit_by_digit(digits: &str) -> Option<String> {
    digits
        .chars()
        .map(|c| c.to_digit(10).map(|d| UNITS[d as usize]))
        .collect::<Option<Vec<_>>>()
        .map(|words| words.join(" "))
}

/// Whether a word is produced by number or currency verbalization.
///
/// Used to keep expanded phrases like "cento e vinte e três" in one piece.
pub fn is_number_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    let w = lower.trim_matches(|c: char| !c.is_alphabetic());
    if w.is_empty() {
        return false;
    }

    UNITS.contains(&w)
        || TENS.iter().any(|t| !t.is_empty() && *t == w)
        || HUNDREDS.iter().any(|h| !h.is_empty() && *h == w)
        || SCALES.iter().any(|(_, s, p)| *s == w || *p == w)
        || ORDINAL_UNITS.iter().chain(ORDINAL_TENS.iter()).chain(ORDINAL_HUNDREDS.iter())
            .any(|o| !o.is_empty() && (*o == w || inflect(o, Gender::Feminine) == w))
        || matches!(
            w,
            "cem" | "milésimo" | "milésima" | "vírgula" | "cento" | "por"
                | "real" | "reais" | "dólar" | "dólares" | "euro" | "euros"
                | "centavo" | "centavos" | "cêntimo" | "cêntimos"
        )
}
