//! Turning transcripts into the integer sequences fed to the text-to-mel model.
//!
//! Text can contain ARPAbet in curly braces to force a pronunciation, e.g.
//! `"Turn left on {HH AW1 S S T AH0 N} Street."`. Anything else is cleaned and mapped character
//! by character, characters missing from the vocabulary are dropped.
pub mod cleaners;
pub mod symbols;

pub use cleaners::{clean_text, Cleaner};
use once_cell::sync::OnceCell;
use regex::Regex;
use symbols::*;

fn symbols_to_sequence(text: &str, out: &mut Vec<i64>) {
    let mut buffer = [0u8; 4];
    for c in text.chars() {
        let symbol = c.encode_utf8(&mut buffer);
        if is_valid_symbol(symbol) {
            out.extend(symbol_to_id(symbol));
        }
    }
}

fn arpabet_to_sequence(text: &str, out: &mut Vec<i64>) {
    out.extend(
        text.split_whitespace()
            .map(|x| format!("@{}", x))
            .filter_map(|x| symbol_to_id(&x)),
    );
}

/// Converts text to a sequence of symbol IDs, running the cleaners over everything outside of
/// curly braces.
pub fn text_to_sequence(text: &str, cleaners: &[Cleaner]) -> Vec<i64> {
    static CURLY: OnceCell<Regex> = OnceCell::new();
    let curly = CURLY.get_or_init(|| Regex::new(r"\{(.+?)\}").unwrap());

    let mut sequence = vec![];
    let mut last = 0;
    for capture in curly.captures_iter(text) {
        let whole = capture.get(0).unwrap();
        symbols_to_sequence(&clean_text(&text[last..whole.start()], cleaners), &mut sequence);
        arpabet_to_sequence(&capture[1], &mut sequence);
        last = whole.end();
    }
    symbols_to_sequence(&clean_text(&text[last..], cleaners), &mut sequence);
    sequence
}

/// Converts a sequence of IDs back to a string, ARPAbet comes back out inside curly braces
pub fn sequence_to_text(sequence: &[i64]) -> String {
    let mut result = String::new();
    for symbol in sequence.iter().filter_map(|x| id_to_symbol(*x)) {
        match symbol.strip_prefix('@') {
            Some(phone) => {
                result.push('{');
                result.push_str(phone);
                result.push('}');
            }
            None => result.push_str(symbol),
        }
    }
    result.replace("}{", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text() {
        let seq = text_to_sequence("Hi, you!", &[Cleaner::Basic]);
        assert_eq!(seq.len(), 8);
        assert_eq!(sequence_to_text(&seq), "hi, you!");
    }

    #[test]
    fn unknown_characters_dropped() {
        let seq = text_to_sequence("a#b", &[Cleaner::Basic]);
        assert_eq!(sequence_to_text(&seq), "ab");
        // Padding never comes out of text
        let seq = text_to_sequence("a_b", &[]);
        assert_eq!(sequence_to_text(&seq), "ab");
    }

    #[test]
    fn arpabet_in_braces() {
        let seq = text_to_sequence("Turn {HH AW1 S} now", &[Cleaner::Basic]);
        assert_eq!(sequence_to_text(&seq), "turn {HH AW1 S} now");
        assert!(seq.contains(&symbol_to_id("@AW1").unwrap()));
    }
}
