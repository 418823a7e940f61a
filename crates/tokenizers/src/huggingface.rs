//! Tokenizers loaded from a HuggingFace `tokenizer.json`.

use std::path::Path;

use priorender_core::{Tokenizer, TokenizerError};

/// Models with an unknown-token fallback can map any run of text to a single
/// id, so there is no cheap bound on the count and the estimate is zero. The
/// search then counts every candidate exactly.
pub struct HuggingFaceTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

impl HuggingFaceTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let name = format!("hf:{}", path.display());
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| TokenizerError::Load {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded HuggingFace tokenizer");
        Ok(Self { name, inner })
    }
}

impl Tokenizer for HuggingFaceTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    // No special tokens: prompt content is counted as sent.
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizerError::Encode {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(encoding.get_ids().len())
    }

    fn estimate_tokens(&self, _text: &str) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"[UNK]": 0, "hello": 1, "world": 2},
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn counts_with_word_level_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WORD_LEVEL.as_bytes()).unwrap();
        let t = HuggingFaceTokenizer::from_file(file.path()).unwrap();
        assert_eq!(t.count_tokens("hello world").unwrap(), 2);
        assert_eq!(t.count_tokens("hello there world").unwrap(), 3);
        assert!(t.name().starts_with("hf:"));
    }

    #[test]
    fn unknown_words_never_undercut_the_estimate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WORD_LEVEL.as_bytes()).unwrap();
        let t = HuggingFaceTokenizer::from_file(file.path()).unwrap();
        let text = "x".repeat(500);
        assert_eq!(t.count_tokens(&text).unwrap(), 1);
        assert!(t.estimate_tokens(&text) <= 1);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = HuggingFaceTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"))
            .err()
            .unwrap();
        assert!(matches!(err, TokenizerError::Load { .. }));
    }
}
