//! # priorender tokenizers
//!
//! Real tokenizer implementations behind the [`Tokenizer`] capability, and a
//! name-based factory used by configuration and the CLI.
//!
//! | name | implementation |
//! |------|----------------|
//! | `heuristic` | ~4 bytes per token |
//! | `words` | one token per word or punctuation mark |
//! | `cl100k_base`, `o200k_base`, `p50k_base` | `tiktoken-rs` (feature `tiktoken`) |
//! | `hf:<path>` | HuggingFace `tokenizer.json` (feature `huggingface`) |

#[cfg(feature = "huggingface")]
pub mod huggingface;
#[cfg(feature = "tiktoken")]
pub mod tiktoken;

use std::sync::Arc;

use priorender_core::{HeuristicTokenizer, Tokenizer, TokenizerError, WordTokenizer};

#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceTokenizer;
#[cfg(feature = "tiktoken")]
pub use tiktoken::{Encoding, TiktokenTokenizer};

/// Prefix selecting a HuggingFace tokenizer file.
pub const HF_PREFIX: &str = "hf:";

type Shared = Result<Arc<dyn Tokenizer>, TokenizerError>;

/// Build a tokenizer from its configured name.
pub fn tokenizer_from_name(name: &str) -> Shared {
    match name {
        "heuristic" => return Ok(Arc::new(HeuristicTokenizer)),
        "words" => return Ok(Arc::new(WordTokenizer)),
        _ => {}
    }
    if let Some(tokenizer) = tiktoken_by_name(name) {
        return tokenizer;
    }
    if let Some(path) = name.strip_prefix(HF_PREFIX) {
        return huggingface_from_file(path);
    }
    Err(TokenizerError::Unknown(name.to_string()))
}

#[cfg(feature = "tiktoken")]
fn tiktoken_by_name(name: &str) -> Option<Shared> {
    let encoding = Encoding::from_name(name)?;
    Some(TiktokenTokenizer::new(encoding).map(|t| Arc::new(t) as Arc<dyn Tokenizer>))
}

#[cfg(not(feature = "tiktoken"))]
fn tiktoken_by_name(_name: &str) -> Option<Shared> {
    None
}

#[cfg(feature = "huggingface")]
fn huggingface_from_file(path: &str) -> Shared {
    let tokenizer = HuggingFaceTokenizer::from_file(std::path::Path::new(path))?;
    Ok(Arc::new(tokenizer))
}

#[cfg(not(feature = "huggingface"))]
fn huggingface_from_file(path: &str) -> Shared {
    Err(TokenizerError::Load {
        name: format!("{HF_PREFIX}{path}"),
        reason: "built without the `huggingface` feature".into(),
    })
}

/// Names [`tokenizer_from_name`] accepts in this build, `hf:<path>` aside.
pub fn available() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut names = vec!["heuristic", "words"];
    #[cfg(feature = "tiktoken")]
    names.extend(Encoding::ALL.iter().map(|e| e.name()));
    names
}
