//! OpenAI BPE encodings via `tiktoken-rs`.

use priorender_core::{Tokenizer, TokenizerError};
use tiktoken_rs::CoreBPE;

/// Encodings bundled with `tiktoken-rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
    P50kBase,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::Cl100kBase, Encoding::O200kBase, Encoding::P50kBase];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
            Encoding::P50kBase => "p50k_base",
        }
    }

    /// Byte length of the longest ordinary token in the vocabulary.
    pub fn max_token_bytes(self) -> usize {
        128
    }

    /// One past the highest ordinary rank.
    #[cfg(test)]
    fn rank_end(self) -> tiktoken_rs::Rank {
        match self {
            Encoding::Cl100kBase => 100_256,
            Encoding::O200kBase => 199_998,
            Encoding::P50kBase => 50_281,
        }
    }

    fn load(self) -> Result<CoreBPE, TokenizerError> {
        let bpe = match self {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
            Encoding::P50kBase => tiktoken_rs::p50k_base(),
        };
        bpe.map_err(|e| TokenizerError::Load {
            name: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Exact counts from a BPE encoding. Special-token text is encoded as
/// ordinary text, the way user content reaches the API.
///
/// No token spans more than [`Encoding::max_token_bytes`] bytes, so
/// `len / max_token_bytes` never exceeds the real count, however well the
/// text compresses.
pub struct TiktokenTokenizer {
    encoding: Encoding,
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new(encoding: Encoding) -> Result<Self, TokenizerError> {
        let bpe = encoding.load()?;
        tracing::debug!(encoding = encoding.name(), "Loaded BPE encoding");
        Ok(Self { encoding, bpe })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        self.encoding.name()
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.bpe.encode_ordinary(text).len())
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / self.encoding.max_token_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_names_round_trip() {
        for e in Encoding::ALL {
            assert_eq!(Encoding::from_name(e.name()), Some(e));
        }
        assert_eq!(Encoding::from_name("r50k_base"), None);
    }

    #[test]
    fn cl100k_counts_tokens() {
        let t = TiktokenTokenizer::new(Encoding::Cl100kBase).unwrap();
        assert_eq!(t.count_tokens("hello world").unwrap(), 2);
        assert_eq!(t.count_tokens("").unwrap(), 0);
        assert_eq!(t.name(), "cl100k_base");
    }

    #[test]
    fn special_tokens_are_plain_text() {
        let t = TiktokenTokenizer::new(Encoding::Cl100kBase).unwrap();
        assert!(t.count_tokens("<|endoftext|>").unwrap() > 1);
    }

    #[test]
    fn estimate_stays_below_count_for_prose() {
        let t = TiktokenTokenizer::new(Encoding::O200kBase).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        assert!(t.estimate_tokens(&text) <= t.count_tokens(&text).unwrap());
    }

    #[test]
    fn estimate_stays_below_count_for_repetitive_text() {
        for e in Encoding::ALL {
            let t = TiktokenTokenizer::new(e).unwrap();
            for text in ["=".repeat(400), " ".repeat(400), "-".repeat(1000), "a".repeat(777)] {
                let count = t.count_tokens(&text).unwrap();
                assert!(
                    t.estimate_tokens(&text) <= count,
                    "{}: estimate {} > count {count}",
                    e.name(),
                    t.estimate_tokens(&text)
                );
            }
        }
    }

    #[test]
    fn no_token_is_longer_than_the_bound() {
        for e in Encoding::ALL {
            let t = TiktokenTokenizer::new(e).unwrap();
            let longest = t
                .bpe
                ._decode_native_and_split((0..e.rank_end()).collect())
                .map(|bytes| bytes.len())
                .max()
                .unwrap();
            assert_eq!(longest, e.max_token_bytes(), "{}", e.name());
        }
    }
}
