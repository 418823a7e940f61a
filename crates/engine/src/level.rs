//! Rendering a tree at one priority cutoff.
//!
//! A scope is kept iff its effective priority is at or above the cutoff; a
//! `first` keeps its first qualifying alternative. The walk appends into a
//! [`Draft`] and reports every appended fragment to a [`Counting`] strategy,
//! which may keep a running total or abandon the render once it provably
//! cannot fit.

use std::ops::ControlFlow;

use priorender_core::{ChatPromptMessage, Error, Priority, Prompt, Result, StructuralError, Tokenizer};

use crate::count::LeafCounts;
use crate::resolve::Resolution;
use crate::tree::{NodeId, PromptTree, TreeNode};

/// What a completed walk produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelRender {
    /// `None` when nothing survived the cutoff.
    pub prompt: Option<Prompt>,
    pub reserved_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(LevelRender),
    /// The counting strategy gave up; `lower_bound` already exceeded the budget.
    BudgetExceeded { lower_bound: usize },
}

/// Output accumulated during one walk.
#[derive(Debug, Default)]
pub struct Draft {
    prompt: Option<Prompt>,
    open: Option<ChatPromptMessage>,
    reserved_tokens: usize,
}

impl Draft {
    /// Everything appended outside the currently open message.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn open_message(&self) -> Option<&ChatPromptMessage> {
        self.open.as_ref()
    }

    pub fn reserved_tokens(&self) -> usize {
        self.reserved_tokens
    }

    fn push_text(&mut self, text: &str) -> std::result::Result<(), StructuralError> {
        if let Some(message) = self.open.as_mut() {
            message.content.push_str(text);
            return Ok(());
        }
        self.prompt = Prompt::combine(self.prompt.take(), Some(Prompt::Plain(text.to_string())))?;
        Ok(())
    }

    fn begin_message(&mut self, role: &str) -> std::result::Result<(), StructuralError> {
        if self.open.is_some() {
            return Err(StructuralError::NestedChatMessage { role: role.to_string() });
        }
        if matches!(self.prompt, Some(Prompt::Plain(_))) {
            return Err(StructuralError::PromptTypeMismatch);
        }
        self.open = Some(ChatPromptMessage::new(role, String::new()));
        Ok(())
    }

    fn end_message(&mut self) -> std::result::Result<Option<&ChatPromptMessage>, StructuralError> {
        let Some(message) = self.open.take() else {
            return Ok(None);
        };
        self.prompt = Prompt::combine(self.prompt.take(), Some(Prompt::Chat(vec![message])))?;
        Ok(match &self.prompt {
            Some(Prompt::Chat(messages)) => messages.last(),
            _ => None,
        })
    }

    fn finish(self) -> LevelRender {
        LevelRender {
            prompt: self.prompt,
            reserved_tokens: self.reserved_tokens,
        }
    }
}

/// Hooks a render walk reports to.
pub trait Counting {
    /// A text fragment was appended.
    fn on_text(&mut self, _id: NodeId, _text: &str) -> Result<()> {
        Ok(())
    }

    /// A chat message was closed and appended.
    fn on_message(&mut self, _message: &ChatPromptMessage) {}

    /// Called after every append. `Break` aborts the walk with a lower bound
    /// that already exceeds the budget.
    fn check(&mut self, _draft: &Draft) -> ControlFlow<usize> {
        ControlFlow::Continue(())
    }
}

/// No accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct Uncounted;

impl Counting for Uncounted {}

/// Running total from memoized fragment counts plus per-message overhead.
///
/// The total is what the fragments cost in isolation. Tokens can merge across
/// fragment boundaries, so callers verify the winner with an exact count.
pub struct CachedCount<'a> {
    tokenizer: &'a dyn Tokenizer,
    memo: &'a mut LeafCounts,
    per_message: usize,
    total: usize,
}

impl<'a> CachedCount<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, memo: &'a mut LeafCounts, per_message: usize) -> Self {
        Self {
            tokenizer,
            memo,
            per_message,
            total: 0,
        }
    }

    /// Fragment and message costs seen so far, without per-prompt overhead.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Counting for CachedCount<'_> {
    fn on_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        self.total += self.memo.get_or_count(id, text, self.tokenizer)?;
        Ok(())
    }

    fn on_message(&mut self, _message: &ChatPromptMessage) {
        self.total += self.per_message;
    }
}

/// Abandons a render as soon as the estimated size plus reservations exceeds
/// the budget.
///
/// The estimate is taken over whole accumulated strings, never summed from
/// fragments, so it stays a lower bound on the exact count of the finished
/// prompt.
pub struct EarlyExit<'a> {
    tokenizer: &'a dyn Tokenizer,
    token_limit: usize,
    sealed: usize,
}

impl<'a> EarlyExit<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, token_limit: usize) -> Self {
        Self {
            tokenizer,
            token_limit,
            sealed: 0,
        }
    }

    fn lower_bound(&self, draft: &Draft) -> usize {
        let body = match draft.prompt() {
            Some(Prompt::Plain(s)) => self.tokenizer.estimate_tokens(s),
            Some(Prompt::Chat(_)) | None => self.sealed,
        };
        let open = draft
            .open_message()
            .map_or(0, |m| self.tokenizer.estimate_tokens(&m.content));
        body + open + draft.reserved_tokens()
    }
}

impl Counting for EarlyExit<'_> {
    fn on_message(&mut self, message: &ChatPromptMessage) {
        self.sealed += self.tokenizer.estimate_tokens(&message.content);
    }

    fn check(&mut self, draft: &Draft) -> ControlFlow<usize> {
        let bound = self.lower_bound(draft);
        if bound > self.token_limit {
            ControlFlow::Break(bound)
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Renders one resolved tree at arbitrary cutoffs.
#[derive(Clone, Copy)]
pub struct LevelRenderer<'t> {
    tree: &'t PromptTree,
    resolution: &'t Resolution,
}

impl<'t> LevelRenderer<'t> {
    pub fn new(tree: &'t PromptTree, resolution: &'t Resolution) -> Self {
        Self { tree, resolution }
    }

    pub fn render<C: Counting>(&self, cutoff: Priority, counting: &mut C) -> Result<RenderOutcome> {
        let mut draft = Draft::default();
        let flow = self.visit_all(self.tree.roots(), cutoff, &mut draft, counting)?;
        Ok(match flow {
            ControlFlow::Continue(()) => RenderOutcome::Rendered(draft.finish()),
            ControlFlow::Break(lower_bound) => RenderOutcome::BudgetExceeded { lower_bound },
        })
    }

    fn visit_all<C: Counting>(
        &self,
        ids: &[NodeId],
        cutoff: Priority,
        draft: &mut Draft,
        counting: &mut C,
    ) -> Result<ControlFlow<usize>> {
        for &id in ids {
            let flow = self.visit(id, cutoff, draft, counting)?;
            if flow.is_break() {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn visit<C: Counting>(
        &self,
        id: NodeId,
        cutoff: Priority,
        draft: &mut Draft,
        counting: &mut C,
    ) -> Result<ControlFlow<usize>> {
        match self.tree.node(id) {
            TreeNode::Text(s) => {
                draft.push_text(s)?;
                counting.on_text(id, s)?;
                Ok(counting.check(draft))
            }
            TreeNode::Scope { children, .. } => {
                if self.priority(id)? >= cutoff {
                    self.visit_all(children, cutoff, draft, counting)
                } else {
                    Ok(ControlFlow::Continue(()))
                }
            }
            TreeNode::First { alternatives } => {
                for &alt in alternatives {
                    if self.priority(alt)? >= cutoff {
                        return self.visit(alt, cutoff, draft, counting);
                    }
                }
                Ok(ControlFlow::Continue(()))
            }
            TreeNode::Empty { reserved_tokens } => {
                draft.reserved_tokens += reserved_tokens;
                Ok(counting.check(draft))
            }
            TreeNode::Chat { role, children } => {
                draft.begin_message(role)?;
                let flow = self.visit_all(children, cutoff, draft, counting)?;
                if flow.is_break() {
                    return Ok(flow);
                }
                if let Some(message) = draft.end_message()? {
                    counting.on_message(message);
                }
                Ok(counting.check(draft))
            }
        }
    }

    fn priority(&self, id: NodeId) -> Result<Priority> {
        self.resolution
            .priority(id)
            .ok_or(Error::UnresolvedPriority { node: id })
    }
}
