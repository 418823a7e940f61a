//! Built-in model presets.
//!
//! A preset knows a model's context window, which tokenizer encodes its
//! prompts, and how many tokens it may generate. Custom presets can be added
//! via TOML config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output cap for models without a specific one.
pub const DEFAULT_OUTPUT_TOKEN_LIMIT: usize = 4096;

/// Context and tokenizer facts for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPreset {
    /// Context window in tokens.
    pub token_limit: usize,
    /// Tokenizer name understood by `priorender-tokenizers`.
    pub tokenizer: String,
    /// Most tokens the model will generate in one completion.
    #[serde(default = "default_output_token_limit")]
    pub output_token_limit: usize,
}

fn default_output_token_limit() -> usize {
    DEFAULT_OUTPUT_TOKEN_LIMIT
}

impl ModelPreset {
    pub fn new(token_limit: usize, tokenizer: impl Into<String>) -> Self {
        Self {
            token_limit,
            tokenizer: tokenizer.into(),
            output_token_limit: DEFAULT_OUTPUT_TOKEN_LIMIT,
        }
    }

    pub fn with_output_limit(mut self, output_token_limit: usize) -> Self {
        self.output_token_limit = output_token_limit;
        self
    }

    /// Tokens left for the completion once a prompt of `prompt_tokens` is sent.
    pub fn completion_budget(&self, prompt_tokens: usize) -> usize {
        self.token_limit
            .saturating_sub(prompt_tokens)
            .min(self.output_token_limit)
    }
}

/// Lookup table of presets keyed by bare model name.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    presets: HashMap<String, ModelPreset>,
}

impl ModelRegistry {
    /// Create a registry with the built-in presets.
    pub fn with_defaults() -> Self {
        let mut presets = HashMap::new();

        // ── OpenAI chat ────────────────────────────────────────────
        presets.insert("gpt-3.5-turbo".into(), ModelPreset::new(4096, "cl100k_base"));
        presets.insert("gpt-3.5-turbo-1106".into(), ModelPreset::new(16000, "cl100k_base"));
        presets.insert("gpt-4".into(), ModelPreset::new(8192, "cl100k_base"));
        presets.insert("gpt-4-32k".into(), ModelPreset::new(32000, "cl100k_base"));
        presets.insert("gpt-4-1106-preview".into(), ModelPreset::new(128000, "cl100k_base"));
        presets.insert("gpt-4-0125-preview".into(), ModelPreset::new(128000, "cl100k_base"));
        presets.insert("gpt-4o".into(), ModelPreset::new(128000, "o200k_base"));

        // ── OpenAI completion ──────────────────────────────────────
        presets.insert("text-davinci-003".into(), ModelPreset::new(4096, "p50k_base"));
        presets.insert("code-davinci-002".into(), ModelPreset::new(4096, "p50k_base"));

        Self { presets }
    }

    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            presets: HashMap::new(),
        }
    }

    /// Add or replace a preset.
    pub fn insert(&mut self, model: impl Into<String>, preset: ModelPreset) {
        self.presets.insert(model.into(), preset);
    }

    /// Look up a preset.
    ///
    /// Tries an exact match first, then strips a provider prefix
    /// (`openai/gpt-4o` → `gpt-4o`), then takes the longest preset name
    /// the model starts with (`gpt-4-0613` → `gpt-4`).
    pub fn get(&self, model: &str) -> Option<&ModelPreset> {
        if let Some(p) = self.presets.get(model) {
            return Some(p);
        }

        let bare = model.rsplit('/').next().unwrap_or(model);
        if let Some(p) = self.presets.get(bare) {
            return Some(p);
        }

        let bare_lower = bare.to_lowercase();
        self.presets
            .iter()
            .filter(|(key, _)| bare_lower.starts_with(&key.to_lowercase()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, p)| p)
    }

    /// All known model names, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_models() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(registry.len(), 9);
        assert!(!registry.is_empty());
    }

    #[test]
    fn exact_lookup() {
        let registry = ModelRegistry::with_defaults();
        let p = registry.get("gpt-4").unwrap();
        assert_eq!(p.token_limit, 8192);
        assert_eq!(p.tokenizer, "cl100k_base");
        assert_eq!(registry.get("gpt-4o").unwrap().tokenizer, "o200k_base");
    }

    #[test]
    fn provider_prefix_is_stripped() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(registry.get("openai/gpt-4-32k").unwrap().token_limit, 32000);
    }

    #[test]
    fn longest_prefix_wins() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(registry.get("gpt-4-32k-0613").unwrap().token_limit, 32000);
        assert_eq!(registry.get("gpt-4-0613").unwrap().token_limit, 8192);
        assert_eq!(registry.get("GPT-4o-mini").unwrap().tokenizer, "o200k_base");
    }

    #[test]
    fn unknown_model_is_none() {
        let registry = ModelRegistry::with_defaults();
        assert!(registry.get("llama-3-70b").is_none());
        assert!(ModelRegistry::empty().get("gpt-4").is_none());
    }

    #[test]
    fn insert_overrides_existing() {
        let mut registry = ModelRegistry::with_defaults();
        registry.insert("gpt-4", ModelPreset::new(1000, "words"));
        assert_eq!(registry.get("gpt-4").unwrap().token_limit, 1000);
    }

    #[test]
    fn models_are_sorted() {
        let registry = ModelRegistry::with_defaults();
        let models = registry.models();
        assert!(models.contains(&"gpt-3.5-turbo"));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn completion_budget_is_capped() {
        let p = ModelPreset::new(8192, "cl100k_base");
        assert_eq!(p.completion_budget(1000), 4096);
        assert_eq!(p.completion_budget(6000), 2192);
        assert_eq!(p.completion_budget(9000), 0);
        let p = ModelPreset::new(32768, "cl100k_base").with_output_limit(32768);
        assert_eq!(p.completion_budget(768), 32000);
    }
}
