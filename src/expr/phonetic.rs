//! Phonetic codes for Latin taxon names.
//!
//! Each word is reduced to a key that survives the common misspellings of
//! scientific names: doubled letters, vowel slips, silent `H`, Greek-derived
//! leading clusters (`Ps`, `Pt`, `Cn`) and gender-agreement endings on
//! epithets. Keys of the individual words are joined by a single space so the
//! genus part can be compared on its own.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::network::observable::strip_diacritics;

/// Leading clusters rewritten before the first letter is kept verbatim.
const LEADING: &[(&str, &str)] = &[
    ("AE", "E"),
    ("CN", "N"),
    ("CT", "T"),
    ("CZ", "C"),
    ("DJ", "J"),
    ("EA", "E"),
    ("EU", "U"),
    ("GN", "N"),
    ("KN", "N"),
    ("MC", "MAC"),
    ("MN", "N"),
    ("OE", "E"),
    ("QU", "Q"),
    ("PS", "S"),
    ("PT", "T"),
    ("TS", "S"),
    ("WR", "R"),
    ("X", "Z"),
];

/// Digraphs collapsed in the tail of a word.
const TAIL: &[(&str, &str)] = &[
    ("AE", "I"),
    ("IA", "A"),
    ("OE", "I"),
    ("OI", "A"),
    ("SC", "S"),
    ("PH", "F"),
];

/// Gender and number endings removed from epithets, longest first.
const ENDINGS: &[&str] = &["IUS", "IUM", "IA", "US", "UM", "IS", "AE", "A", "I", "E", "O"];

/// Infraspecific and informal markers that never take part in the code.
const MARKERS: &[&str] = &[
    "SUBSP", "SSP", "VAR", "SUBVAR", "F", "FORMA", "CV", "SP", "SPP", "AFF", "CF", "NOTHOSUBSP",
];

/// Taxon name phonetic encoder.
///
/// Constructed explicitly and owned by the network that uses it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhoneticEncoder {
    /// Minimum stem length kept when stripping epithet endings.
    #[serde(default = "default_min_stem")]
    min_stem: usize,
}

fn default_min_stem() -> usize {
    3
}

impl PhoneticEncoder {
    pub fn new() -> Self {
        Self {
            min_stem: default_min_stem(),
        }
    }

    /// Encode a full name: one key per word, separated by spaces.
    pub fn encode(&self, name: &str) -> EvalResult<String> {
        let folded = strip_diacritics(name).to_uppercase();
        let words: Vec<String> = folded
            .split_whitespace()
            .filter(|w| !w.starts_with('('))
            .map(|w| w.chars().filter(char::is_ascii_alphabetic).collect::<String>())
            .filter(|w| !w.is_empty() && !MARKERS.contains(&w.as_str()))
            .collect();
        if words.is_empty() {
            return Err(EvalError::Phonetic {
                text: name.to_string(),
            });
        }

        let codes: Vec<String> = words
            .iter()
            .enumerate()
            .map(|(i, w)| self.encode_word(w, i > 0))
            .collect();
        Ok(codes.join(" "))
    }

    /// Key of the first word only, used for cheap candidate pre-filtering.
    pub fn encode_prefix(&self, name: &str) -> EvalResult<String> {
        let code = self.encode(name)?;
        Ok(code.split(' ').next().unwrap_or_default().to_string())
    }

    fn encode_word(&self, word: &str, epithet: bool) -> String {
        let mut word = word.to_string();
        if epithet {
            if let Some(ending) = ENDINGS
                .iter()
                .find(|e| word.ends_with(*e) && word.len() - e.len() >= self.min_stem)
            {
                word.truncate(word.len() - ending.len());
            }
        }

        if let Some((from, to)) = LEADING.iter().find(|(from, _)| word.starts_with(from)) {
            word = format!("{to}{}", &word[from.len()..]);
        }

        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            return String::new();
        };
        let mut tail: String = chars.collect();
        for (from, to) in TAIL {
            tail = tail.replace(from, to);
        }
        tail = tail
            .chars()
            .filter_map(|c| match c {
                'A' | 'E' | 'I' | 'O' | 'U' | 'Y' | 'H' | 'W' => None,
                'K' | 'Q' => Some('C'),
                'Z' => Some('S'),
                other => Some(other),
            })
            .collect();

        let mut out = String::with_capacity(tail.len() + 1);
        out.push(first);
        let mut last = None;
        for c in tail.chars() {
            if last != Some(c) {
                out.push(c);
            }
            last = Some(c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misspelled_epithet_shares_code() {
        let enc = PhoneticEncoder::new();
        assert_eq!(
            enc.encode("Acacia dealbata").unwrap(),
            enc.encode("Acacia delbata").unwrap()
        );
    }

    #[test]
    fn gender_endings_are_ignored() {
        let enc = PhoneticEncoder::new();
        assert_eq!(
            enc.encode("Eucalyptus albus").unwrap(),
            enc.encode("Eucalyptus alba").unwrap()
        );
    }

    #[test]
    fn leading_clusters_are_simplified() {
        let enc = PhoneticEncoder::new();
        assert_eq!(enc.encode("Pseudomonas").unwrap(), enc.encode("Seudomonas").unwrap());
        assert_eq!(enc.encode("Xanthium").unwrap(), enc.encode("Zanthium").unwrap());
    }

    #[test]
    fn rank_markers_and_authors_in_parentheses_are_dropped() {
        let enc = PhoneticEncoder::new();
        assert_eq!(
            enc.encode("Acacia dealbata subsp. dealbata").unwrap(),
            enc.encode("Acacia dealbata dealbata").unwrap()
        );
        assert_eq!(enc.encode("Morus (Linnaeus)").unwrap(), enc.encode("Morus").unwrap());
    }

    #[test]
    fn different_names_differ() {
        let enc = PhoneticEncoder::new();
        assert_ne!(enc.encode("Acacia").unwrap(), enc.encode("Banksia").unwrap());
    }

    #[test]
    fn prefix_is_genus_key() {
        let enc = PhoneticEncoder::new();
        assert_eq!(
            enc.encode_prefix("Acacia dealbata").unwrap(),
            enc.encode("Acacia").unwrap()
        );
    }

    #[test]
    fn names_without_letters_fail() {
        let enc = PhoneticEncoder::new();
        assert!(matches!(enc.encode("123 ?"), Err(EvalError::Phonetic { .. })));
    }
}
