//! # priorender core
//!
//! The prompt tree, rendered prompt types, errors and the tokenizer
//! capability. This crate has no opinion on how a tree is rendered; the
//! search engine lives in `priorender-engine` and builds against these types.
//!
//! ```
//! use priorender_core::node::{scope, text, first_of, empty};
//!
//! let tree = vec![
//!     scope([text("You are a helpful assistant.\n")]).into(),
//!     first_of([
//!         scope([text("Here is the whole file: ...")]).p(100),
//!         scope([text("Here is a summary: ...")]).p(500),
//!     ]),
//!     empty(256).into(),
//! ];
//! # let _: Vec<priorender_core::Node> = tree;
//! ```

pub mod error;
pub mod message;
pub mod node;
pub mod settings;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StructuralError, TokenizerError};
pub use message::{ChatPromptMessage, ChatTemplate, Prompt};
pub use node::{BASE_PRIORITY, ChatMessage, Empty, First, Node, Priority, Scope, parse_tree};
pub use settings::{ChatOverhead, RenderSettings};
pub use tokenizer::{HeuristicTokenizer, Tokenizer, WordTokenizer};
