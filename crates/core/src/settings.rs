//! Calibration constants injected into a render.

use crate::node::{BASE_PRIORITY, Priority};
use serde::{Deserialize, Serialize};

/// Formatting overhead of a chat-structured request, in tokens.
///
/// Defaults follow ChatML: every message costs 4 tokens for its role and
/// delimiters, and every prompt costs 3 more for priming the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOverhead {
    pub per_message: usize,
    pub per_prompt: usize,
}

impl Default for ChatOverhead {
    fn default() -> Self {
        Self {
            per_message: 4,
            per_prompt: 3,
        }
    }
}

/// Settings shared by every stage of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Implicit priority of the root and of scopes without one.
    pub base_priority: Priority,
    pub chat_overhead: ChatOverhead,
    /// Renders slower than this are logged as warnings.
    pub slow_render_warn_ms: u64,
    /// Treat a child scope outranking its parent as an error.
    pub strict_priority_order: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            base_priority: BASE_PRIORITY,
            chat_overhead: ChatOverhead::default(),
            slow_render_warn_ms: 100,
            strict_priority_order: false,
        }
    }
}
