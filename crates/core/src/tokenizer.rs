//! The tokenizer capability.
//!
//! The renderer only needs two things from a tokenizer: an exact count and a
//! cheap lower bound. Real BPE tokenizers live in `priorender-tokenizers`;
//! this module defines the trait plus two dependency-free implementations.

use crate::error::TokenizerError;

/// Pluggable token counting.
pub trait Tokenizer: Send + Sync {
    /// Name used in logs and configuration.
    fn name(&self) -> &str;

    /// Exact number of tokens `text` encodes to.
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError>;

    /// A cheap estimate that never exceeds [`count_tokens`](Self::count_tokens)
    /// for the same text. The renderer uses it to abandon candidates that
    /// already overflow without running the real encoder.
    fn estimate_tokens(&self, text: &str) -> usize;
}

/// Bytes-per-token heuristic: 1 token ≈ 4 bytes, rounded up.
///
/// Accurate within ~10% for BPE tokenizers on English text. Useful offline
/// or when no real encoder is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

const HEURISTIC_BYTES_PER_TOKEN: usize = 4;

impl Tokenizer for HeuristicTokenizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.len().div_ceil(HEURISTIC_BYTES_PER_TOKEN))
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / HEURISTIC_BYTES_PER_TOKEN
    }
}

/// One token per run of alphanumeric characters and one per punctuation
/// character. Whitespace is free.
///
/// Deterministic and easy to reason about, which makes it handy for tests and
/// for budgets expressed in words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    fn count(text: &str) -> usize {
        let mut count = 0;
        let mut in_word = false;
        for c in text.chars() {
            if c.is_alphanumeric() {
                if !in_word {
                    count += 1;
                    in_word = true;
                }
            } else {
                in_word = false;
                if !c.is_whitespace() {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Tokenizer for WordTokenizer {
    fn name(&self) -> &str {
        "words"
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(Self::count(text))
    }

    // Counting is already a single pass, so the exact value is the bound.
    fn estimate_tokens(&self, text: &str) -> usize {
        Self::count(text)
    }
}
