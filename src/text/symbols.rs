//! The symbol vocabulary shared with the tacotron2 model. The order here *is* the input ID so
//! don't reorder it, new symbols go at the end.
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const PAD: &str = "_";

/// ARPAbet phones, these appear in the vocabulary prefixed with `@` so they can't collide with
/// characters.
const ARPABET: [&str; 84] = [
    "AA", "AA0", "AA1", "AA2", "AE", "AE0", "AE1", "AE2", "AH", "AH0", "AH1", "AH2", "AO", "AO0",
    "AO1", "AO2", "AW", "AW0", "AW1", "AW2", "AY", "AY0", "AY1", "AY2", "B", "CH", "D", "DH", "EH",
    "EH0", "EH1", "EH2", "ER", "ER0", "ER1", "ER2", "EY", "EY0", "EY1", "EY2", "F", "G", "HH", "IH",
    "IH0", "IH1", "IH2", "IY", "IY0", "IY1", "IY2", "JH", "K", "L", "M", "N", "NG", "OW", "OW0",
    "OW1", "OW2", "OY", "OY0", "OY1", "OY2", "P", "R", "S", "SH", "T", "TH", "UH", "UH0", "UH1",
    "UH2", "UW", "UW0", "UW1", "UW2", "V", "W", "Y", "Z", "ZH",
];

/// Function to generate the ordered symbol list. Any character/punctuation/phoneme can be
/// searched in this list and it's index will correspond to the model input.
fn generate_symbol_list() -> Vec<String> {
    let mut res = vec![PAD.to_string(), "-".to_string()];
    res.extend("!'(),.:;? ".chars().map(String::from));
    res.extend(
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz"
            .chars()
            .map(String::from),
    );
    res.extend(ARPABET.iter().map(|x| format!("@{}", x)));
    res
}

pub static SYMBOLS: Lazy<Vec<String>> = Lazy::new(generate_symbol_list);

static SYMBOL_TO_ID: Lazy<HashMap<&'static str, i64>> = Lazy::new(|| {
    SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i as i64))
        .collect()
});

pub fn symbol_to_id(symbol: &str) -> Option<i64> {
    SYMBOL_TO_ID.get(symbol).copied()
}

pub fn id_to_symbol(id: i64) -> Option<&'static str> {
    usize::try_from(id)
        .ok()
        .and_then(|i| SYMBOLS.get(i))
        .map(|s| s.as_str())
}

/// Whether the symbol is something we feed to the model. Padding is in the vocabulary but only
/// ever inserted by batching.
pub fn is_valid_symbol(symbol: &str) -> bool {
    symbol != PAD && SYMBOL_TO_ID.contains_key(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_layout() {
        assert_eq!(SYMBOLS.len(), 2 + 10 + 52 + 84);
        assert_eq!(symbol_to_id("_"), Some(0));
        assert_eq!(symbol_to_id("-"), Some(1));
        assert_eq!(symbol_to_id(" "), Some(11));
        assert_eq!(symbol_to_id("A"), Some(12));
        assert_eq!(symbol_to_id("a"), Some(38));
        assert_eq!(symbol_to_id("@AA"), Some(64));
        assert_eq!(symbol_to_id("AA"), None);
        assert_eq!(id_to_symbol(38), Some("a"));
        assert_eq!(id_to_symbol(-1), None);
        assert!(!is_valid_symbol("_"));
        assert!(is_valid_symbol("z"));
    }
}
