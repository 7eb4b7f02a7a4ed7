//! Lexical embedder using signed feature hashing
//!
//! Each content word is hashed into one of `dimension` buckets with a sign, so
//! texts that share words point in similar directions. Unlike the hash-seeded
//! embedder this gives keyword-level relevance ("who is my teammate?" lands
//! near "teammate: X") while staying deterministic and dependency-free.

use sha2::{Digest, Sha256};

use super::Embedder;
use super::hashed::seeded_unit_vector;
use crate::embeddings::normalize;
use crate::error::{ParleyError, Result};

/// Words that carry no retrieval signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "am", "an", "and", "are", "as", "at", "be", "been", "but",
    "by", "can", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "me", "mine", "my", "no", "not", "of",
    "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "to", "was", "we", "were", "what", "when", "where",
    "which", "who", "whom", "why", "will", "with", "would", "you", "your",
];

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct LexicalEmbedder {
    dimension: usize,
}

impl LexicalEmbedder {
    /// Create a lexical embedder producing `dimension`-length vectors.
    ///
    /// Larger dimensions make accidental word collisions rarer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ParleyError::Configuration(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Split text into the tokens that contribute to the embedding.
    ///
    /// Words are lowercased runs of alphanumerics; each CJK character is a
    /// token of its own since those scripts do not separate words with spaces.
    pub fn tokens(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut word = String::new();

        for ch in text.chars().flat_map(char::to_lowercase) {
            if is_cjk(ch) {
                flush(&mut word, &mut tokens);
                tokens.push(ch.to_string());
            } else if ch.is_alphanumeric() {
                word.push(ch);
            } else {
                flush(&mut word, &mut tokens);
            }
        }
        flush(&mut word, &mut tokens);

        tokens
    }
}

impl Default for LexicalEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl Embedder for LexicalEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut components = vec![0.0f64; self.dimension];

        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            components[bucket] += sign;
        }

        if !normalize(&mut components) {
            return seeded_unit_vector(text, self.dimension);
        }
        components.into_iter().map(|x| x as f32).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

fn flush(word: &mut String, tokens: &mut Vec<String>) {
    if word.is_empty() {
        return;
    }
    let single_ascii = word.len() == 1 && word.is_ascii();
    if !single_ascii && !STOP_WORDS.contains(&word.as_str()) {
        tokens.push(word.clone());
    }
    word.clear();
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{3040}'..='\u{30FF}'   // kana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified
        | '\u{AC00}'..='\u{D7AF}' // hangul
    )
}
