//! Text normalization and vectorization
//!
//! Turns free-form Spanish gig text into the fixed-length index sequence
//! the scoring model consumes: NFD-decompose and strip combining marks,
//! lowercase, tokenize on whitespace, drop stop words, then map tokens
//! through the vocabulary (unknown -> 0) and pad/truncate to
//! `SEQUENCE_LENGTH`.
//!
//! Everything here is a pure function of the input text and the
//! vocabulary snapshot passed in.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::vocab::Vocabulary;

/// Fixed input length for the scoring model.
pub const SEQUENCE_LENGTH: usize = 30;

/// Spanish function words removed before vectorization.
const STOP_WORDS: &[&str] = &[
    "de", "la", "el", "y", "a", "los", "las", "del", "al", "en", "con", "para", "por", "es", "un",
    "una", "unos", "unas",
];

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));
static LEADING_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:el|la|los|las)\s+").expect("valid regex"));
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[“”‘’'".,!?;:()]"#).expect("valid regex"));

/// Strip combining diacritics via NFD decomposition ("mañana" -> "manana").
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Split into alphanumeric tokens, discarding special characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_ALNUM.replace_all(text, "");
    cleaned
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize: strip accents, lowercase, tokenize, drop stop words.
///
/// Idempotent: normalizing already-normalized text is a no-op.
pub fn normalize(text: &str) -> String {
    let stripped = strip_diacritics(text).to_lowercase();
    tokenize(&stripped)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Light cleanup for extracted field values: strip accents and
/// punctuation, drop a leading article, collapse whitespace, lowercase.
pub fn clean_text(text: &str) -> String {
    let stripped = strip_diacritics(text);
    let no_article = LEADING_ARTICLE.replace(stripped.trim(), "");
    let no_punct = PUNCTUATION.replace_all(&no_article, "");
    no_punct
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Map text to exactly `max_len` vocabulary indices.
///
/// Unknown tokens map to 0; the sequence is truncated to `max_len` and
/// right-padded with 0.
pub fn to_vector(text: &str, vocab: &Vocabulary, max_len: usize) -> Vec<u32> {
    let normalized = normalize(text);
    let mut sequence: Vec<u32> = normalized
        .split_whitespace()
        .map(|tok| vocab.index_of(tok).unwrap_or(0))
        .take(max_len)
        .collect();
    sequence.resize(max_len, 0);
    sequence
}

/// Capitalize the first letter of each whitespace-delimited word and
/// lowercase the rest ("juan perez" -> "Juan Perez").
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("mañana"), "manana");
        assert_eq!(strip_diacritics("Pérez"), "Perez");
        assert_eq!(strip_diacritics("jardín salón"), "jardin salon");
    }

    #[test]
    fn test_normalize_drops_stop_words() {
        assert_eq!(normalize("en el lobby del Hotel"), "lobby hotel");
        assert_eq!(normalize("con Juan para la boda"), "juan boda");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "Viernes con Juan Pérez en el lobby del Hotel Plaza, 7pm, 5000 pesos",
            "mañana a las 8:30 en la terraza",
            "",
            "   de la el   ",
        ];
        for text in inputs {
            let once = normalize(text);
            assert_eq!(normalize(&once), once, "not idempotent for {text:?}");
        }
    }

    #[test]
    fn test_clean_text_strips_article_and_punctuation() {
        assert_eq!(clean_text("el Hotel Plaza,"), "hotel plaza");
        assert_eq!(clean_text("  La Terraza. "), "terraza");
    }

    #[test]
    fn test_to_vector_shape() {
        let mut vocab = Vocabulary::new(10);
        vocab.insert("juan");
        vocab.insert("lobby");
        for text in ["con Juan en el lobby", "", "palabras totalmente desconocidas"] {
            let v = to_vector(text, &vocab, SEQUENCE_LENGTH);
            assert_eq!(v.len(), SEQUENCE_LENGTH);
            assert!(v.iter().all(|&i| (i as usize) < vocab.capacity()));
        }
    }

    #[test]
    fn test_to_vector_known_tokens() {
        let mut vocab = Vocabulary::new(10);
        let juan = vocab.insert("juan").unwrap();
        let lobby = vocab.insert("lobby").unwrap();
        let v = to_vector("con Juan en el lobby", &vocab, 5);
        assert_eq!(&v[..2], &[juan, lobby]);
        assert_eq!(&v[2..], &[0, 0, 0]);
    }

    #[test]
    fn test_to_vector_truncates() {
        let vocab = Vocabulary::new(10);
        let long = "palabra ".repeat(50);
        assert_eq!(to_vector(&long, &vocab, 30).len(), 30);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("juan pérez"), "Juan Pérez");
        assert_eq!(title_case("HOTEL PLAZA"), "Hotel Plaza");
        assert_eq!(title_case(""), "");
    }
}
