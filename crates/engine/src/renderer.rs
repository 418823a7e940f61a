//! The render pipeline: normalize, resolve, validate, search.

use std::sync::Arc;
use std::time::Instant;

use priorender_core::{Node, Priority, Prompt, RenderSettings, Result, Tokenizer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::count::TokenCounter;
use crate::level::{LevelRender, LevelRenderer, RenderOutcome, Uncounted};
use crate::resolve::resolve;
use crate::search::{Search, SearchStrategy};
use crate::tree::PromptTree;
use crate::validate::{ValidationWarning, validate};

// ── Types ─────────────────────────────────────────────────────────────────

/// Token budget for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Hard ceiling on prompt tokens plus reserved tokens.
    pub token_limit: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self { token_limit: 4096 }
    }
}

/// A finished render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    pub prompt: Prompt,
    /// Exact token count of `prompt`, chat overhead included.
    pub token_count: usize,
    /// Tokens held back by `empty` nodes that survived the cutoff.
    pub tokens_reserved: usize,
    /// Lowest priority that was kept.
    pub priority_cutoff: Priority,
    pub duration_ms: f64,
    /// Budget utilization percentage (0.0–100.0), reservations included.
    pub utilization_pct: f32,
    /// Validation findings, already logged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// ── Renderer ──────────────────────────────────────────────────────────────

/// Renders prompt trees against a token budget. Stateless between calls;
/// create one and reuse it.
#[derive(Clone)]
pub struct PromptRenderer {
    tokenizer: Arc<dyn Tokenizer>,
    budget: TokenBudget,
    settings: RenderSettings,
    strategy: SearchStrategy,
}

impl PromptRenderer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, budget: TokenBudget) -> Self {
        Self {
            tokenizer,
            budget,
            settings: RenderSettings::default(),
            strategy: SearchStrategy::default(),
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Render `nodes` at the lowest cutoff that fits the budget.
    ///
    /// # Algorithm
    ///
    /// 1. Flatten the tree into an arena, merging adjacent text
    /// 2. Resolve effective priorities and collect the cutoff levels
    /// 3. Validate priority ordering (warnings, or an error in strict mode)
    /// 4. Search the levels for the lowest fitting cutoff
    /// 5. Re-render the winner and count it exactly; overflow is fatal
    pub fn render(&self, nodes: &[Node]) -> Result<RenderOutput> {
        let start = Instant::now();

        let tree = PromptTree::build(nodes);
        let resolution = resolve(&tree, self.settings.base_priority)?;
        debug!(
            nodes = tree.len(),
            levels = resolution.levels().len(),
            elapsed_ms = ms_since(start),
            "Resolved priority levels"
        );

        let warnings = validate(&tree, &resolution, &self.settings)?;
        debug!(warnings = warnings.len(), elapsed_ms = ms_since(start), "Validated tree");

        let counter = TokenCounter::new(self.tokenizer.as_ref(), self.settings.chat_overhead);
        let search = Search::new(
            LevelRenderer::new(&tree, &resolution),
            counter,
            resolution.levels(),
            self.budget.token_limit,
        );
        let result = search.run(self.strategy)?;

        let duration_ms = ms_since(start);
        debug!(
            strategy = ?self.strategy,
            cutoff = result.priority_cutoff,
            tokens = result.token_count,
            reserved = result.tokens_reserved,
            duration_ms,
            "Render finished"
        );
        if duration_ms > self.settings.slow_render_warn_ms as f64 {
            warn!(
                duration_ms,
                threshold_ms = self.settings.slow_render_warn_ms,
                "Slow prompt render"
            );
        }

        let used = result.token_count + result.tokens_reserved;
        let utilization_pct = if self.budget.token_limit == 0 {
            0.0
        } else {
            (used as f32 / self.budget.token_limit as f32) * 100.0
        };

        Ok(RenderOutput {
            prompt: result.prompt,
            token_count: result.token_count,
            tokens_reserved: result.tokens_reserved,
            priority_cutoff: result.priority_cutoff,
            duration_ms,
            utilization_pct,
            warnings: warnings.iter().map(ValidationWarning::to_string).collect(),
        })
    }

    /// Render `nodes` at a fixed cutoff, ignoring the budget.
    pub fn render_at(&self, nodes: &[Node], cutoff: Priority) -> Result<LevelRender> {
        let tree = PromptTree::build(nodes);
        let resolution = resolve(&tree, self.settings.base_priority)?;
        match LevelRenderer::new(&tree, &resolution).render(cutoff, &mut Uncounted)? {
            RenderOutcome::Rendered(r) => Ok(r),
            RenderOutcome::BudgetExceeded { .. } => Ok(LevelRender::default()),
        }
    }

    /// Every cutoff level `nodes` can be rendered at, ascending.
    pub fn levels(&self, nodes: &[Node]) -> Result<Vec<Priority>> {
        let tree = PromptTree::build(nodes);
        Ok(resolve(&tree, self.settings.base_priority)?.levels().to_vec())
    }
}

fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
