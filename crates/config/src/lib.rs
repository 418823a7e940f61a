//! Configuration loading, validation, and management for priorender.
//!
//! Loads configuration from `~/.priorender/config.toml` with environment
//! variable overrides. Validates all settings before a render.

pub mod presets;

pub use presets::{ModelPreset, ModelRegistry};

use priorender_core::{BASE_PRIORITY, ChatOverhead, Priority, RenderSettings};
use priorender_engine::SearchStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.priorender/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Target model; supplies token limit and tokenizer when those are unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Explicit token limit, overrides the model preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<usize>,

    /// Explicit tokenizer name, overrides the model preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,

    /// Search strategy: "binary" or "linear"
    #[serde(default)]
    pub search: SearchStrategy,

    /// Treat a child scope outranking its parent as an error
    #[serde(default)]
    pub strict_priority_order: bool,

    /// Renders slower than this are logged as warnings
    #[serde(default = "default_slow_render_warn_ms")]
    pub slow_render_warn_ms: u64,

    /// Token accounting constants
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Custom model presets
    #[serde(default)]
    pub models: Vec<CustomModelConfig>,
}

fn default_slow_render_warn_ms() -> u64 {
    100
}

/// Token accounting constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Implicit priority of top-level content
    #[serde(default = "default_base_priority")]
    pub base_priority: Priority,

    /// Per-message overhead of a chat prompt
    #[serde(default = "default_chat_tokens_per_message")]
    pub chat_tokens_per_message: usize,

    /// Fixed overhead of a chat prompt
    #[serde(default = "default_chat_tokens_per_prompt")]
    pub chat_tokens_per_prompt: usize,
}

fn default_base_priority() -> Priority {
    BASE_PRIORITY
}
fn default_chat_tokens_per_message() -> usize {
    4
}
fn default_chat_tokens_per_prompt() -> usize {
    3
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            base_priority: default_base_priority(),
            chat_tokens_per_message: default_chat_tokens_per_message(),
            chat_tokens_per_prompt: default_chat_tokens_per_prompt(),
        }
    }
}

/// A `[[models]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomModelConfig {
    pub name: String,
    #[serde(flatten)]
    pub preset: ModelPreset,
}

/// Token limit and tokenizer a render should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub token_limit: usize,
    pub tokenizer: String,
    /// The preset the target came from, if a model was named.
    pub preset: Option<ModelPreset>,
}

impl RenderConfig {
    /// Load configuration from the default path (~/.priorender/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PRIORENDER_MODEL`
    /// - `PRIORENDER_TOKEN_LIMIT`
    /// - `PRIORENDER_TOKENIZER`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("PRIORENDER_MODEL") {
            self.model = Some(model);
        }
        if let Some(limit) = lookup("PRIORENDER_TOKEN_LIMIT") {
            let parsed = limit.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "PRIORENDER_TOKEN_LIMIT must be a positive integer, got '{limit}'"
                ))
            })?;
            self.token_limit = Some(parsed);
        }
        if let Some(tokenizer) = lookup("PRIORENDER_TOKENIZER") {
            self.tokenizer = Some(tokenizer);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".priorender")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_limit == Some(0) {
            return Err(ConfigError::ValidationError("token_limit must be > 0".into()));
        }

        for m in &self.models {
            if m.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("model name must not be empty".into()));
            }
            if m.preset.token_limit == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}': token_limit must be > 0",
                    m.name
                )));
            }
        }

        Ok(())
    }

    /// Built-in presets plus the `[[models]]` entries.
    pub fn registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::with_defaults();
        for m in &self.models {
            registry.insert(m.name.clone(), m.preset.clone());
        }
        registry
    }

    /// Work out the token limit and tokenizer for a render.
    ///
    /// Explicit `token_limit` and `tokenizer` win; anything missing comes
    /// from the model preset.
    pub fn resolve_target(&self) -> Result<RenderTarget, ConfigError> {
        let preset = match &self.model {
            Some(model) => Some(
                self.registry()
                    .get(model)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownModel(model.clone()))?,
            ),
            None => None,
        };

        let token_limit = self
            .token_limit
            .or_else(|| preset.as_ref().map(|p| p.token_limit))
            .ok_or_else(|| {
                ConfigError::ValidationError("must specify model or token_limit".into())
            })?;

        let tokenizer = self
            .tokenizer
            .clone()
            .or_else(|| preset.as_ref().map(|p| p.tokenizer.clone()))
            .ok_or_else(|| ConfigError::ValidationError("must specify model or tokenizer".into()))?;

        Ok(RenderTarget {
            token_limit,
            tokenizer,
            preset,
        })
    }

    /// Settings handed to the renderer.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            base_priority: self.calibration.base_priority,
            chat_overhead: ChatOverhead {
                per_message: self.calibration.chat_tokens_per_message,
                per_prompt: self.calibration.chat_tokens_per_prompt,
            },
            slow_render_warn_ms: self.slow_render_warn_ms,
            strict_priority_order: self.strict_priority_order,
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            model: None,
            token_limit: None,
            tokenizer: None,
            search: SearchStrategy::default(),
            strict_priority_order: false,
            slow_render_warn_ms: default_slow_render_warn_ms(),
            calibration: CalibrationConfig::default(),
            models: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown model '{0}'; add it under [[models]] or pass token_limit and tokenizer")]
    UnknownModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search, SearchStrategy::Binary);
        assert_eq!(config.calibration.base_priority, BASE_PRIORITY);
        assert_eq!(config.slow_render_warn_ms, 100);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = RenderConfig {
            model: Some("gpt-4".into()),
            search: SearchStrategy::Linear,
            ..RenderConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RenderConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.as_deref(), Some("gpt-4"));
        assert_eq!(parsed.search, SearchStrategy::Linear);
    }

    #[test]
    fn zero_token_limit_rejected() {
        let config = RenderConfig {
            token_limit: Some(0),
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = RenderConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.model.is_none());
        assert!(config.models.is_empty());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = RenderConfig::default_toml();
        assert!(toml_str.contains("search = \"binary\""));
        assert!(toml_str.contains("chat_tokens_per_message = 4"));
    }

    #[test]
    fn load_from_file_with_custom_models() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
model = "my-model"
strict_priority_order = true

[calibration]
chat_tokens_per_prompt = 5

[[models]]
name = "my-model"
token_limit = 2048
tokenizer = "words"
"#
        )
        .unwrap();

        let config = RenderConfig::load_from(file.path()).unwrap();
        assert!(config.strict_priority_order);
        assert_eq!(config.calibration.chat_tokens_per_prompt, 5);
        assert_eq!(config.calibration.chat_tokens_per_message, 4);

        let target = config.resolve_target().unwrap();
        assert_eq!(target.token_limit, 2048);
        assert_eq!(target.tokenizer, "words");
        assert_eq!(target.preset.unwrap().output_token_limit, 4096);

        let settings = config.render_settings();
        assert_eq!(settings.chat_overhead.per_prompt, 5);
        assert!(settings.strict_priority_order);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "search = \"sideways\"").unwrap();
        let err = RenderConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RenderConfig::default();
        config
            .apply_env(env(&[
                ("PRIORENDER_MODEL", "gpt-4o"),
                ("PRIORENDER_TOKEN_LIMIT", "1000"),
            ]))
            .unwrap();
        let target = config.resolve_target().unwrap();
        assert_eq!(target.token_limit, 1000);
        assert_eq!(target.tokenizer, "o200k_base");
    }

    #[test]
    fn bad_env_token_limit_rejected() {
        let mut config = RenderConfig::default();
        let err = config
            .apply_env(env(&[("PRIORENDER_TOKEN_LIMIT", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("PRIORENDER_TOKEN_LIMIT"));
    }

    #[test]
    fn target_needs_a_limit_and_a_tokenizer() {
        let err = RenderConfig::default().resolve_target().unwrap_err();
        assert!(err.to_string().contains("must specify model or token_limit"));

        let config = RenderConfig {
            token_limit: Some(100),
            ..RenderConfig::default()
        };
        let err = config.resolve_target().unwrap_err();
        assert!(err.to_string().contains("must specify model or tokenizer"));
    }

    #[test]
    fn unknown_model_is_reported() {
        let config = RenderConfig {
            model: Some("mystery-9000".into()),
            ..RenderConfig::default()
        };
        assert!(matches!(
            config.resolve_target(),
            Err(ConfigError::UnknownModel(m)) if m == "mystery-9000"
        ));
    }

    #[test]
    fn explicit_values_beat_the_preset() {
        let config = RenderConfig {
            model: Some("gpt-4".into()),
            token_limit: Some(500),
            tokenizer: Some("heuristic".into()),
            ..RenderConfig::default()
        };
        let target = config.resolve_target().unwrap();
        assert_eq!(target.token_limit, 500);
        assert_eq!(target.tokenizer, "heuristic");
    }
}
