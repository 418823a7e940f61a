//! # priorender engine
//!
//! Renders a priority-annotated prompt tree into the largest prompt that fits
//! a token budget. Every scope resolves to an effective priority; rendering at
//! a cutoff keeps the scopes at or above it. The engine searches for the
//! lowest cutoff whose exact token count, plus any reserved tokens, stays
//! within the limit.
//!
//! ```
//! use std::sync::Arc;
//! use priorender_core::node::{scope, text};
//! use priorender_core::{Node, Prompt, WordTokenizer};
//! use priorender_engine::{PromptRenderer, TokenBudget};
//!
//! let tree: Vec<Node> = vec![
//!     scope([text("Hello ")]).p(10).into(),
//!     scope([text("world ")]).p(5).into(),
//!     scope([text("!")]).p(1).into(),
//! ];
//! let renderer = PromptRenderer::new(Arc::new(WordTokenizer), TokenBudget { token_limit: 2 });
//! let out = renderer.render(&tree).unwrap();
//! assert_eq!(out.prompt, Prompt::Plain("Hello world ".into()));
//! assert_eq!(out.priority_cutoff, 5);
//! ```

pub mod count;
pub mod level;
pub mod renderer;
pub mod resolve;
pub mod search;
pub mod tree;
pub mod validate;

pub use count::{LeafCounts, TokenCounter};
pub use level::{LevelRender, LevelRenderer, RenderOutcome};
pub use renderer::{PromptRenderer, RenderOutput, TokenBudget};
pub use resolve::{Resolution, resolve};
pub use search::{Search, SearchResult, SearchStrategy};
pub use tree::{NodeId, PromptTree};
pub use validate::{ValidationWarning, validate};
