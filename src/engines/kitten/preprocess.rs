//! Text normalisation before phonemisation.
//!
//! espeak-ng reads digits and symbols in ways the model was not trained on,
//! so numbers, money, times and the like are spelled out first. Sentence
//! punctuation survives; the chunker and the model's prosody rely on it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const ONES: [&str; 20] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const SCALES: [&str; 7] = [
    "",
    "thousand",
    "million",
    "billion",
    "trillion",
    "quadrillion",
    "quintillion",
];
const DIGITS: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($re).expect(concat!("preprocess regex ", stringify!($name))));
    };
}

pattern!(RE_HTML, r"<[^>]+>");
pattern!(RE_URL, r"https?://\S+|www\.\S+");
pattern!(RE_EMAIL, r"(?i)\b[\w.+-]+@[\w-]+(?:\.[\w-]+)*\.[a-z]{2,}\b");
pattern!(RE_CURRENCY, r"([$€£¥₹])\s?(\d[\d,]*(?:\.\d+)?)");
pattern!(RE_PERCENT, r"(\d[\d,]*(?:\.\d+)?)\s?%");
pattern!(RE_TIME, r"(?i)\b(\d{1,2}):(\d{2})(?:\s?([ap])\.?m\b\.?)?");
pattern!(RE_ORDINAL, r"(?i)\b(\d+)(st|nd|rd|th)\b");
pattern!(RE_NEGATIVE, r"(^|\s)-(\d)");
pattern!(RE_NUMBER, r"\b\d[\d,]*(?:\.\d+)?\b");
pattern!(RE_SYMBOL, r"[^\w\s.,!?;:'-]");
pattern!(RE_SPACES, r"\s+");
pattern!(RE_SPACE_BEFORE_MARK, r"\s+([.,!?;:])");

static CONTRACTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bcan't\b", "cannot"),
        (r"(?i)\bwon't\b", "will not"),
        (r"(?i)\bshan't\b", "shall not"),
        (r"(?i)\bain't\b", "is not"),
        (r"(?i)\blet's\b", "let us"),
        (r"(?i)\bit's\b", "it is"),
        (r"(?i)\b(\w+)n't\b", "$1 not"),
        (r"(?i)\b(\w+)'re\b", "$1 are"),
        (r"(?i)\b(\w+)'ve\b", "$1 have"),
        (r"(?i)\b(\w+)'ll\b", "$1 will"),
        (r"(?i)\b(\w+)'d\b", "$1 would"),
        (r"(?i)\b(\w+)'m\b", "$1 am"),
    ]
    .into_iter()
    .map(|(re, with)| (Regex::new(re).expect("contraction regex"), with))
    .collect()
});

/// Spell out a whole number.
pub fn number_to_words(n: u64) -> String {
    if n == 0 {
        return "zero".to_string();
    }
    // round hundreds from 1100 to 1900 read as "eleven hundred"
    if (1100..10_000).contains(&n) && n % 100 == 0 && n % 1000 != 0 && n / 100 < 20 {
        return format!("{} hundred", ONES[(n / 100) as usize]);
    }

    let mut groups = Vec::new();
    let mut rest = n;
    let mut scale = 0;
    while rest > 0 {
        let group = rest % 1000;
        if group > 0 {
            let words = below_thousand(group);
            groups.push(match SCALES[scale] {
                "" => words,
                name => format!("{words} {name}"),
            });
        }
        rest /= 1000;
        scale += 1;
    }
    groups.reverse();
    groups.join(" ")
}

fn below_thousand(n: u64) -> String {
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} hundred", ONES[(n / 100) as usize]));
    }
    let rem = (n % 100) as usize;
    match rem {
        0 => {}
        1..=19 => parts.push(ONES[rem].to_string()),
        _ if rem % 10 == 0 => parts.push(TENS[rem / 10].to_string()),
        _ => parts.push(format!("{}-{}", TENS[rem / 10], ONES[rem % 10])),
    }
    parts.join(" ")
}

/// Spell out a decimal literal such as `3.14`, reading the fraction digit by
/// digit. Commas are ignored.
pub fn decimal_to_words(literal: &str) -> String {
    let cleaned = literal.replace(',', "");
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (cleaned.as_str(), None),
    };

    let whole = match int_part.parse::<u64>() {
        Ok(n) => number_to_words(n),
        Err(_) if int_part.is_empty() => "zero".to_string(),
        // Too long for u64: read digit by digit.
        Err(_) => digits_to_words(int_part),
    };

    match frac_part {
        Some(frac) if !frac.is_empty() => format!("{whole} point {}", digits_to_words(frac)),
        _ => whole,
    }
}

fn digits_to_words(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| DIGITS[d as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

/// `21` -> `twenty-first`.
pub fn ordinal_to_words(n: u64) -> String {
    let cardinal = number_to_words(n);
    let split = cardinal.rfind(['-', ' ']).map_or(0, |i| i + 1);
    let (head, last) = cardinal.split_at(split);

    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{w}th"),
    };
    format!("{head}{last}")
}

fn expand_contractions(text: &str) -> String {
    CONTRACTIONS
        .iter()
        .fold(text.to_string(), |acc, (re, with)| {
            re.replace_all(&acc, *with).into_owned()
        })
}

fn expand_currency(text: &str) -> String {
    RE_CURRENCY
        .replace_all(text, |caps: &Captures| {
            let unit = match &caps[1] {
                "$" => "dollar",
                "€" => "euro",
                "£" => "pound",
                "¥" => "yen",
                _ => "rupee",
            };
            let amount = caps[2].replace(',', "");
            let (whole, cents) = match amount.split_once('.') {
                Some((whole, frac)) => {
                    let two: String = frac.chars().chain(std::iter::repeat('0')).take(2).collect();
                    (whole, two.parse::<u64>().unwrap_or(0))
                }
                None => (amount.as_str(), 0),
            };
            let whole: u64 = whole.parse().unwrap_or(0);

            let plural = |n: u64| if n == 1 || unit == "yen" { "" } else { "s" };
            let mut spoken = format!("{} {unit}{}", number_to_words(whole), plural(whole));
            if cents > 0 {
                let cent_plural = if cents == 1 { "" } else { "s" };
                spoken.push_str(&format!(" and {} cent{cent_plural}", number_to_words(cents)));
            }
            spoken
        })
        .into_owned()
}

fn expand_percentages(text: &str) -> String {
    RE_PERCENT
        .replace_all(text, |caps: &Captures| {
            format!("{} percent", decimal_to_words(&caps[1]))
        })
        .into_owned()
}

fn expand_time(text: &str) -> String {
    RE_TIME
        .replace_all(text, |caps: &Captures| {
            let hours: u64 = caps[1].parse().unwrap_or(0);
            let minutes: u64 = caps[2].parse().unwrap_or(0);
            let suffix = caps
                .get(3)
                .map(|m| format!(" {}m", m.as_str().to_lowercase()))
                .unwrap_or_default();

            let hour_words = number_to_words(hours);
            match minutes {
                0 if suffix.is_empty() => format!("{hour_words} o'clock"),
                0 => format!("{hour_words}{suffix}"),
                1..=9 => format!("{hour_words} oh {}{suffix}", number_to_words(minutes)),
                _ => format!("{hour_words} {}{suffix}", number_to_words(minutes)),
            }
        })
        .into_owned()
}

fn expand_ordinals(text: &str) -> String {
    RE_ORDINAL
        .replace_all(text, |caps: &Captures| match caps[1].parse::<u64>() {
            Ok(n) => ordinal_to_words(n),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

fn replace_numbers(text: &str) -> String {
    let text = RE_NEGATIVE.replace_all(text, "${1}negative $2");
    RE_NUMBER
        .replace_all(&text, |caps: &Captures| decimal_to_words(&caps[0]))
        .into_owned()
}

/// The full cleaning pipeline, applied to each synthesis request when
/// `clean_text` is set.
pub fn clean_text(text: &str) -> String {
    let text = RE_HTML.replace_all(text, " ");
    let text = RE_URL.replace_all(&text, "");
    let text = RE_EMAIL.replace_all(&text, "");
    let text = expand_contractions(&text);
    let text = expand_currency(&text);
    let text = expand_percentages(&text);
    let text = expand_time(&text);
    let text = expand_ordinals(&text);
    let text = replace_numbers(&text);
    let text = RE_SYMBOL.replace_all(&text, " ");
    let text = text.to_lowercase();
    let text = RE_SPACES.replace_all(text.trim(), " ");
    RE_SPACE_BEFORE_MARK.replace_all(&text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinals() {
        assert_eq!(number_to_words(0), "zero");
        assert_eq!(number_to_words(7), "seven");
        assert_eq!(number_to_words(42), "forty-two");
        assert_eq!(number_to_words(100), "one hundred");
        assert_eq!(number_to_words(1200), "twelve hundred");
        assert_eq!(number_to_words(2000), "two thousand");
        assert_eq!(
            number_to_words(1_000_101),
            "one million one hundred one"
        );
        assert_eq!(
            number_to_words(2025),
            "two thousand twenty-five"
        );
    }

    #[test]
    fn decimals_and_ordinals() {
        assert_eq!(decimal_to_words("3.14"), "three point one four");
        assert_eq!(decimal_to_words("1,234"), "one thousand two hundred thirty-four");
        assert_eq!(decimal_to_words("1500"), "fifteen hundred");
        assert_eq!(ordinal_to_words(1), "first");
        assert_eq!(ordinal_to_words(21), "twenty-first");
        assert_eq!(ordinal_to_words(40), "fortieth");
        assert_eq!(ordinal_to_words(100), "one hundredth");
    }

    #[test]
    fn money_percent_and_time() {
        assert_eq!(expand_currency("$5"), "five dollars");
        assert_eq!(expand_currency("$1.05"), "one dollar and five cents");
        assert_eq!(expand_percentages("50%"), "fifty percent");
        assert_eq!(expand_time("at 3:05 pm"), "at three oh five pm");
        assert_eq!(expand_time("10:30"), "ten thirty");
        assert_eq!(expand_time("7:00"), "seven o'clock");
    }

    #[test]
    fn contractions() {
        assert_eq!(expand_contractions("I can't go"), "I cannot go");
        assert_eq!(expand_contractions("they're here"), "they are here");
        assert_eq!(expand_contractions("We'll see"), "We will see");
    }

    #[test]
    fn keeps_sentence_punctuation() {
        assert_eq!(
            clean_text("Hello, World! It's 3rd place."),
            "hello, world! it is third place."
        );
    }

    #[test]
    fn removes_markup_links_and_symbols() {
        assert_eq!(
            clean_text("<b>Visit</b> https://example.com or mail a@b.io #now"),
            "visit or mail now"
        );
    }

    #[test]
    fn negative_and_plain_numbers() {
        assert_eq!(clean_text("It was -5 at 6am"), "it was negative five at 6am");
        assert_eq!(clean_text("Room 12 of 30."), "room twelve of thirty.");
    }
}
