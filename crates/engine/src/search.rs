//! Finding the lowest cutoff that fits the budget.
//!
//! Raising the cutoff only ever removes content, so "fits at level i" is
//! monotone over the ascending level list and a binary search finds the
//! smallest fitting level. The linear strategy walks down from the top
//! instead, adding content while the memoized running total fits.

use priorender_core::{Error, Priority, Prompt, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::count::{LeafCounts, TokenCounter};
use crate::level::{CachedCount, EarlyExit, LevelRender, LevelRenderer, RenderOutcome, Uncounted};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Binary search with early exit on every probe.
    #[default]
    Binary,
    /// Downward scan over memoized fragment counts, verified exactly.
    Linear,
}

/// The winning render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub prompt: Prompt,
    pub token_count: usize,
    pub tokens_reserved: usize,
    pub priority_cutoff: Priority,
}

/// One search over one resolved tree.
pub struct Search<'t> {
    renderer: LevelRenderer<'t>,
    counter: TokenCounter<'t>,
    levels: &'t [Priority],
    token_limit: usize,
}

impl<'t> Search<'t> {
    /// `levels` must be ascending.
    pub fn new(
        renderer: LevelRenderer<'t>,
        counter: TokenCounter<'t>,
        levels: &'t [Priority],
        token_limit: usize,
    ) -> Self {
        Self {
            renderer,
            counter,
            levels,
            token_limit,
        }
    }

    pub fn run(&self, strategy: SearchStrategy) -> Result<SearchResult> {
        match strategy {
            SearchStrategy::Binary => self.binary(),
            SearchStrategy::Linear => self.linear(&mut LeafCounts::default()),
        }
    }

    pub fn binary(&self) -> Result<SearchResult> {
        let top = self.top_index()?;
        let mut exclusive_lower: isize = -1;
        let mut inclusive_upper = top as isize;

        while exclusive_lower < inclusive_upper - 1 {
            let candidate = (exclusive_lower + inclusive_upper) / 2;
            let level = self.levels[candidate as usize];
            if self.fits(level)? {
                inclusive_upper = candidate;
            } else {
                exclusive_lower = candidate;
            }
        }

        self.finalize(self.levels[inclusive_upper as usize])
    }

    /// Scan from the highest level down, stopping at the first level whose
    /// memoized total no longer fits. The last fitting level is then counted
    /// exactly; if fragments merged into more tokens than the memo predicted,
    /// the cutoff moves back up until the exact count fits.
    pub fn linear(&self, memo: &mut LeafCounts) -> Result<SearchResult> {
        let top = self.top_index()?;
        let per_prompt = self.counter.overhead().per_prompt;
        let mut best: Option<(usize, usize)> = None;

        for index in (0..=top).rev() {
            let level = self.levels[index];
            let mut cached = CachedCount::new(self.counter.tokenizer(), memo, self.counter.overhead().per_message);
            let outcome = self.renderer.render(level, &mut cached)?;
            let total = cached.total();
            let RenderOutcome::Rendered(LevelRender {
                prompt,
                reserved_tokens,
            }) = outcome
            else {
                break;
            };
            let approx = total + if prompt.as_ref().is_some_and(Prompt::is_chat) { per_prompt } else { 0 };
            if approx + reserved_tokens > self.token_limit {
                break;
            }
            best = Some((index, approx));
        }
        debug!(fragments_counted = memo.cached(), "Linear scan finished");

        let (start, approx) = best.unwrap_or((top, 0));
        let mut last_overflow = None;
        for &level in &self.levels[start..] {
            match self.finalize(level) {
                Ok(result) => {
                    if best.is_some() && result.token_count != approx {
                        warn!(
                            cutoff = level,
                            estimated = approx,
                            exact = result.token_count,
                            "Linear search estimate differs from the exact count"
                        );
                    }
                    return Ok(result);
                }
                Err(e @ Error::BudgetOverflow { .. }) => {
                    debug!(cutoff = level, "Exact count overflows, raising cutoff");
                    last_overflow = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_overflow.unwrap_or(Error::BudgetOverflow {
            token_count: 0,
            tokens_reserved: 0,
            token_limit: self.token_limit,
            cutoff: self.levels[top],
        }))
    }

    /// Early-exit render plus exact count. An abandoned render does not fit.
    pub fn fits(&self, level: Priority) -> Result<bool> {
        let mut early = EarlyExit::new(self.counter.tokenizer(), self.token_limit);
        match self.renderer.render(level, &mut early)? {
            RenderOutcome::BudgetExceeded { lower_bound } => {
                debug!(cutoff = level, lower_bound, "Candidate abandoned early");
                Ok(false)
            }
            RenderOutcome::Rendered(r) => {
                let count = self.counter.exact_opt(r.prompt.as_ref())?;
                Ok(count + r.reserved_tokens <= self.token_limit)
            }
        }
    }

    /// Authoritative render and exact count at `level`.
    pub fn finalize(&self, level: Priority) -> Result<SearchResult> {
        let overflow = |token_count, tokens_reserved| Error::BudgetOverflow {
            token_count,
            tokens_reserved,
            token_limit: self.token_limit,
            cutoff: level,
        };

        let rendered = match self.renderer.render(level, &mut Uncounted)? {
            RenderOutcome::Rendered(r) => r,
            RenderOutcome::BudgetExceeded { lower_bound } => return Err(overflow(lower_bound, 0)),
        };
        let token_count = self.counter.exact_opt(rendered.prompt.as_ref())?;
        if token_count + rendered.reserved_tokens > self.token_limit {
            return Err(overflow(token_count, rendered.reserved_tokens));
        }

        Ok(SearchResult {
            prompt: rendered.prompt.unwrap_or_default(),
            token_count,
            tokens_reserved: rendered.reserved_tokens,
            priority_cutoff: level,
        })
    }

    fn top_index(&self) -> Result<usize> {
        self.levels.len().checked_sub(1).ok_or_else(|| Error::Config {
            message: "no priority levels to search".into(),
        })
    }
}
