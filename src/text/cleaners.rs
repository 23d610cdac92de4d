//! Cleaners are transformations run over transcripts before they're turned into symbols. Which
//! ones run is picked in the hyper-parameters so it matches what the model was trained with:
//!
//! * `basic_cleaners` lowercases and collapses whitespace, use it for text that's already clean.
//! * `transliteration_cleaners` also transliterates to ASCII, for non-English text.
//! * `english_cleaners` additionally expands numbers and abbreviations.
use crate::error::{Error, Result};
use deunicode::deunicode;
use num2words::Num2Words;
use once_cell::sync::{Lazy, OnceCell};
use regex::{Captures, Regex};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cleaner {
    Basic,
    Transliteration,
    English,
}

impl FromStr for Cleaner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic_cleaners" => Ok(Self::Basic),
            "transliteration_cleaners" => Ok(Self::Transliteration),
            "english_cleaners" => Ok(Self::English),
            s => Err(Error::InvalidConfig(format!("unknown text cleaner: {}", s))),
        }
    }
}

impl Cleaner {
    pub fn parse_all(names: &[String]) -> Result<Vec<Self>> {
        names.iter().map(|x| x.parse()).collect()
    }

    pub fn clean(&self, text: &str) -> String {
        match self {
            Self::Basic => collapse_whitespace(&text.to_lowercase()),
            Self::Transliteration => collapse_whitespace(&deunicode(text).to_lowercase()),
            Self::English => {
                let text = deunicode(text).to_lowercase();
                let text = expand_numbers(&text);
                let text = expand_abbreviations(&text);
                collapse_whitespace(&text)
            }
        }
    }
}

pub fn clean_text(text: &str, cleaners: &[Cleaner]) -> String {
    cleaners
        .iter()
        .fold(text.to_string(), |acc, cleaner| cleaner.clean(&acc))
}

fn collapse_whitespace(x: &str) -> String {
    static WHITESPACE: OnceCell<Regex> = OnceCell::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
    whitespace.replace_all(x, " ").into_owned()
}

const ABBREVIATIONS: [(&str, &str); 18] = [
    ("mrs", "misess"),
    ("mr", "mister"),
    ("dr", "doctor"),
    ("st", "saint"),
    ("co", "company"),
    ("jr", "junior"),
    ("maj", "major"),
    ("gen", "general"),
    ("drs", "doctors"),
    ("rev", "reverend"),
    ("lt", "lieutenant"),
    ("hon", "honorable"),
    ("sgt", "sergeant"),
    ("capt", "captain"),
    ("esq", "esquire"),
    ("ltd", "limited"),
    ("col", "colonel"),
    ("ft", "fort"),
];

static ABBREVIATION_REGEXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(abbr, full)| {
            let regex = Regex::new(&format!(r"(?i)\b{}\.", abbr)).unwrap();
            (regex, *full)
        })
        .collect()
});

fn expand_abbreviations(x: &str) -> String {
    ABBREVIATION_REGEXES
        .iter()
        .fold(x.to_string(), |acc, (regex, full)| {
            regex.replace_all(&acc, *full).into_owned()
        })
}

fn number_to_words(digits: &str) -> Option<String> {
    let n = digits.parse::<i64>().ok()?;
    Num2Words::new(n).to_words().ok()
}

fn ordinal_to_words(digits: &str) -> Option<String> {
    let n = digits.parse::<i64>().ok()?;
    Num2Words::new(n).ordinal().to_words().ok()
}

/// Spells out numbers. Anything num2words can't handle (huge values) is left as digits and then
/// dropped by the symbol lookup.
fn expand_numbers(x: &str) -> String {
    static COMMA_NUMBER: OnceCell<Regex> = OnceCell::new();
    static DOLLARS: OnceCell<Regex> = OnceCell::new();
    static DECIMAL: OnceCell<Regex> = OnceCell::new();
    static ORDINAL: OnceCell<Regex> = OnceCell::new();
    static NUMBER: OnceCell<Regex> = OnceCell::new();

    let comma_number =
        COMMA_NUMBER.get_or_init(|| Regex::new(r"([0-9][0-9,]+[0-9])").unwrap());
    let dollars = DOLLARS.get_or_init(|| Regex::new(r"\$([0-9]+)").unwrap());
    let decimal = DECIMAL.get_or_init(|| Regex::new(r"([0-9]+)\.([0-9]+)").unwrap());
    let ordinal = ORDINAL.get_or_init(|| Regex::new(r"([0-9]+)(st|nd|rd|th)\b").unwrap());
    let number = NUMBER.get_or_init(|| Regex::new(r"[0-9]+").unwrap());

    let text = comma_number.replace_all(x, |c: &Captures| c[1].replace(',', ""));
    let text = dollars.replace_all(&text, |c: &Captures| {
        if &c[1] == "1" {
            "1 dollar".to_string()
        } else {
            format!("{} dollars", &c[1])
        }
    });
    let text = decimal.replace_all(&text, |c: &Captures| format!("{} point {}", &c[1], &c[2]));
    let text = ordinal.replace_all(&text, |c: &Captures| {
        ordinal_to_words(&c[1]).unwrap_or_else(|| c[0].to_string())
    });
    let text = number.replace_all(&text, |c: &Captures| {
        number_to_words(&c[0]).unwrap_or_else(|| c[0].to_string())
    });
    text.into_owned()
}
