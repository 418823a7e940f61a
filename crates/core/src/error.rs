//! Error types for prompt rendering.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Structural misuse and tokenizer failures get their own enums and are
//! folded into the top-level [`Error`].

use crate::node::Priority;
use thiserror::Error;

/// The top-level error type for all priorender operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Budget ---
    #[error(
        "Base prompt token count is {token_count} with {tokens_reserved} tokens reserved, \
         which is higher than the limit {token_limit} (cutoff {cutoff}). \
         This is probably a bug in the prompt: add some priority levels to fix this."
    )]
    BudgetOverflow {
        token_count: usize,
        tokens_reserved: usize,
        token_limit: usize,
        cutoff: Priority,
    },

    // --- Tree shape ---
    #[error("Incorrect prompt: {0}")]
    Structural(#[from] StructuralError),

    #[error(
        "child scope has a higher priority ({child}) than its parent ({parent}); \
         strict priority ordering is enabled"
    )]
    PriorityOrder { child: Priority, parent: Priority },

    // --- Internal invariants ---
    #[error("BUG: scope {node} reached the renderer without a resolved priority")]
    UnresolvedPriority { node: usize },

    // --- Tokenizer ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Invalid prompt tree: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of `first`, chat messages, or mixing prompt kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("chat message with role '{role}' is nested inside another chat message")]
    NestedChatMessage { role: String },

    #[error("first must have only scope children, got {found}")]
    FirstChildNotScope { found: &'static str },

    #[error("cannot combine a plain text prompt with a chat prompt")]
    PromptTypeMismatch,
}

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Unknown tokenizer: {0}")]
    Unknown(String),

    #[error("Failed to load tokenizer {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Tokenizer {name} failed to encode text: {reason}")]
    Encode { name: String, reason: String },
}
