//! Insertion-ordered vocabulary for the scoring model
//!
//! Maps normalized tokens to stable embedding indices. Index 0 is
//! reserved for unknown/padding, so real tokens start at 1. Indices are
//! assigned in insertion order and never reused or renumbered; once the
//! cap is reached new tokens are dropped rather than evicting old ones
//! (renumbering would silently invalidate the trained embedding rows).

use std::collections::HashMap;

/// Maximum number of embedding rows, including the reserved slot 0.
pub const MAX_VOCAB_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    indices: HashMap<String, u32>,
    /// Tokens in insertion order; position + 1 == assigned index.
    tokens: Vec<String>,
    capacity: usize,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(MAX_VOCAB_SIZE)
    }
}

impl Vocabulary {
    /// Empty vocabulary with room for `capacity` embedding rows
    /// (one of which is the reserved unknown/padding slot).
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: HashMap::new(),
            tokens: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild from a persisted ordered token list. Tokens beyond the
    /// capacity are dropped, matching insert-time behavior.
    pub fn from_tokens<I, S>(tokens: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::new(capacity);
        for token in tokens {
            vocab.insert(&token.into());
        }
        vocab
    }

    /// Insert a token, returning its index. Returns the existing index
    /// if already present, or `None` if the vocabulary is full.
    pub fn insert(&mut self, token: &str) -> Option<u32> {
        if let Some(&idx) = self.indices.get(token) {
            return Some(idx);
        }
        // +1 accounts for the reserved slot 0
        if self.tokens.len() + 1 >= self.capacity {
            return None;
        }
        let idx = (self.tokens.len() + 1) as u32;
        self.indices.insert(token.to_string(), idx);
        self.tokens.push(token.to_string());
        Some(idx)
    }

    /// Index of a known token. Unknown tokens have no index; callers
    /// map them to 0.
    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.indices.get(token).copied()
    }

    /// Number of assigned tokens (excluding the reserved slot).
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True once no further token can be assigned.
    pub fn is_full(&self) -> bool {
        self.tokens.len() + 1 >= self.capacity
    }

    /// Total embedding rows this vocabulary can address.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens in insertion order, for persistence. The token at
    /// position `i` has index `i + 1`.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_assigns_sequential_indices_from_one() {
        let mut vocab = Vocabulary::new(10);
        assert_eq!(vocab.insert("hola"), Some(1));
        assert_eq!(vocab.insert("mundo"), Some(2));
        // Re-inserting keeps the original index
        assert_eq!(vocab.insert("hola"), Some(1));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_capacity_cap_drops_new_tokens() {
        let mut vocab = Vocabulary::new(3);
        assert_eq!(vocab.insert("a"), Some(1));
        assert_eq!(vocab.insert("b"), Some(2));
        assert!(vocab.is_full());
        assert_eq!(vocab.insert("c"), None);
        // Existing tokens still resolve after the cap is hit
        assert_eq!(vocab.insert("a"), Some(1));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut vocab = Vocabulary::new(10);
        vocab.insert("uno");
        vocab.insert("dos");
        vocab.insert("tres");
        let rebuilt = Vocabulary::from_tokens(vocab.tokens().to_vec(), 10);
        for token in ["uno", "dos", "tres"] {
            assert_eq!(rebuilt.index_of(token), vocab.index_of(token));
        }
    }

    #[test]
    fn test_unknown_token_has_no_index() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.index_of("nunca"), None);
        assert_eq!(vocab.capacity(), MAX_VOCAB_SIZE);
    }
}
