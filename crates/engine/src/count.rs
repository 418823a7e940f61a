//! Token accounting for rendered prompts.
//!
//! Plain prompts cost what their text encodes to. Chat prompts cost the sum of
//! their message contents plus a fixed overhead per message and per prompt.

use priorender_core::{ChatOverhead, Prompt, Result, Tokenizer};

use crate::tree::NodeId;

/// Exact and estimated prompt costs for one tokenizer.
#[derive(Clone, Copy)]
pub struct TokenCounter<'a> {
    tokenizer: &'a dyn Tokenizer,
    overhead: ChatOverhead,
}

impl<'a> TokenCounter<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, overhead: ChatOverhead) -> Self {
        Self {
            tokenizer,
            overhead,
        }
    }

    pub fn tokenizer(&self) -> &'a dyn Tokenizer {
        self.tokenizer
    }

    pub fn overhead(&self) -> ChatOverhead {
        self.overhead
    }

    /// Exact cost of `prompt`.
    pub fn exact(&self, prompt: &Prompt) -> Result<usize> {
        match prompt {
            Prompt::Plain(s) => Ok(self.tokenizer.count_tokens(s)?),
            Prompt::Chat(messages) => {
                let mut total = self.overhead.per_prompt;
                for m in messages {
                    total += self.tokenizer.count_tokens(&m.content)? + self.overhead.per_message;
                }
                Ok(total)
            }
        }
    }

    /// Exact cost of an optional prompt; nothing rendered costs nothing.
    pub fn exact_opt(&self, prompt: Option<&Prompt>) -> Result<usize> {
        prompt.map_or(Ok(0), |p| self.exact(p))
    }

    /// Lower bound on [`exact`](Self::exact). Chat overhead is left out.
    pub fn estimate(&self, prompt: &Prompt) -> usize {
        match prompt {
            Prompt::Plain(s) => self.tokenizer.estimate_tokens(s),
            Prompt::Chat(messages) => messages
                .iter()
                .map(|m| self.tokenizer.estimate_tokens(&m.content))
                .sum(),
        }
    }
}

/// Memoized per-fragment token counts, keyed by arena id.
///
/// Text fragments never change between renders of one tree, so each is
/// encoded at most once no matter how many levels are tried.
#[derive(Debug, Clone, Default)]
pub struct LeafCounts {
    counts: Vec<Option<usize>>,
}

impl LeafCounts {
    pub fn new(tree_len: usize) -> Self {
        Self {
            counts: vec![None; tree_len],
        }
    }

    pub fn get_or_count(&mut self, id: NodeId, text: &str, tokenizer: &dyn Tokenizer) -> Result<usize> {
        if id >= self.counts.len() {
            self.counts.resize(id + 1, None);
        }
        if let Some(n) = self.counts[id] {
            return Ok(n);
        }
        let n = tokenizer.count_tokens(text)?;
        self.counts[id] = Some(n);
        Ok(n)
    }

    /// Number of fragments counted so far.
    pub fn cached(&self) -> usize {
        self.counts.iter().filter(|c| c.is_some()).count()
    }
}
