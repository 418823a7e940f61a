//! The prompt tree.
//!
//! A prompt is authored as a tree of [`Node`]s. Scopes gate their subtree
//! behind a priority; the renderer later picks the lowest priority cutoff
//! whose output still fits the token budget.
//!
//! Trees can be built with the functions in this module or deserialized from
//! JSON, where plain strings are text and objects are tagged by `"type"`:
//!
//! ```json
//! [
//!   {"type": "scope", "p": 10, "children": ["Hello "]},
//!   {"type": "first", "children": [
//!     {"type": "scope", "p": 5, "children": ["long version"]},
//!     {"type": "scope", "p": 50, "children": ["short"]}
//!   ]},
//!   {"type": "chat", "role": "user", "children": ["hi"]},
//!   {"type": "empty", "tokens": 256, "p": 1}
//! ]
//! ```

use crate::error::{Result, StructuralError};
use serde::Deserialize;

/// Absolute priority of a scope. Higher values survive higher cutoffs.
pub type Priority = i64;

/// Implicit parent priority of the root. Scopes without an explicit priority
/// resolve to this and are always rendered.
pub const BASE_PRIORITY: Priority = 1_000_000_000;

/// A node of the prompt tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawNode")]
pub enum Node {
    /// A literal text fragment.
    Text(String),
    /// A subtree included or dropped as a whole.
    Scope(Scope),
    /// Mutually exclusive alternatives; the first qualifying one renders.
    First(First),
    /// Reserves budget without contributing text.
    Empty(Empty),
    /// Wraps its rendered children into one chat message.
    Chat(ChatMessage),
}

impl Node {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Text(_) => "text",
            Node::Scope(_) => "scope",
            Node::First(_) => "first",
            Node::Empty(_) => "empty",
            Node::Chat(_) => "chat",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub children: Vec<Node>,
    /// Explicit priority; wins over `relative_priority` when both are set.
    #[serde(default, rename = "p")]
    pub absolute_priority: Option<Priority>,
    /// Offset from the parent's priority. Defaults to 0.
    #[serde(default, rename = "prel")]
    pub relative_priority: Option<Priority>,
}

impl Scope {
    pub fn new(children: impl IntoIterator<Item = Node>) -> Self {
        Self {
            children: children.into_iter().collect(),
            absolute_priority: None,
            relative_priority: None,
        }
    }

    /// Set the absolute priority.
    pub fn p(mut self, priority: Priority) -> Self {
        self.absolute_priority = Some(priority);
        self
    }

    /// Set the priority relative to the enclosing scope.
    pub fn prel(mut self, offset: Priority) -> Self {
        self.relative_priority = Some(offset);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawFirst")]
pub struct First {
    pub children: Vec<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty {
    pub reserved_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

// ── Builders ──────────────────────────────────────────────────────────────

/// A text fragment.
pub fn text(s: impl Into<String>) -> Node {
    Node::Text(s.into())
}

/// A scope without an explicit priority; chain `.p()` or `.prel()`.
pub fn scope(children: impl IntoIterator<Item = Node>) -> Scope {
    Scope::new(children)
}

/// Alternatives from arbitrary nodes. Every child must be a scope.
pub fn first(children: impl IntoIterator<Item = Node>) -> std::result::Result<Node, StructuralError> {
    let children = children
        .into_iter()
        .map(|child| match child {
            Node::Scope(s) => Ok(s),
            other => Err(StructuralError::FirstChildNotScope { found: other.kind() }),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Node::First(First { children }))
}

/// Alternatives from scopes, which cannot fail.
pub fn first_of(children: impl IntoIterator<Item = Scope>) -> Node {
    Node::First(First {
        children: children.into_iter().collect(),
    })
}

/// Reserve `tokens` of budget. Wrapped in a scope so it can carry a priority.
pub fn empty(tokens: usize) -> Scope {
    Scope::new([Node::Empty(Empty {
        reserved_tokens: tokens,
    })])
}

/// A line break.
pub fn br() -> Scope {
    Scope::new([text("\n")])
}

/// A horizontal rule.
pub fn hr() -> Scope {
    Scope::new([text("\n\n-------\n\n")])
}

pub fn chat(role: impl Into<String>, children: impl IntoIterator<Item = Node>) -> Node {
    Node::Chat(ChatMessage {
        role: role.into(),
        children: children.into_iter().collect(),
    })
}

pub fn system(children: impl IntoIterator<Item = Node>) -> Node {
    chat("system", children)
}

pub fn user(children: impl IntoIterator<Item = Node>) -> Node {
    chat("user", children)
}

pub fn assistant(children: impl IntoIterator<Item = Node>) -> Node {
    chat("assistant", children)
}

/// Parse a prompt tree from JSON. Accepts a single node or an array of nodes.
pub fn parse_tree(json: &str) -> Result<Vec<Node>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Node>),
        One(Node),
    }

    Ok(match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::Many(nodes) => nodes,
        OneOrMany::One(node) => vec![node],
    })
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<Scope> for Node {
    fn from(s: Scope) -> Self {
        Node::Scope(s)
    }
}

impl From<First> for Node {
    fn from(f: First) -> Self {
        Node::First(f)
    }
}

impl From<Empty> for Node {
    fn from(e: Empty) -> Self {
        Node::Empty(e)
    }
}

impl From<ChatMessage> for Node {
    fn from(c: ChatMessage) -> Self {
        Node::Chat(c)
    }
}

// ── Serde plumbing ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNode {
    Text(String),
    Number(serde_json::Number),
    Element(Element),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Element {
    Scope(Scope),
    First(First),
    Empty(RawEmpty),
    Chat(ChatMessage),
}

/// JSON reservations take `p` / `prel` like the [`empty`] builder's scope.
#[derive(Deserialize)]
struct RawEmpty {
    tokens: usize,
    #[serde(default)]
    p: Option<Priority>,
    #[serde(default)]
    prel: Option<Priority>,
}

impl From<RawEmpty> for Scope {
    fn from(raw: RawEmpty) -> Self {
        let mut scope = empty(raw.tokens);
        scope.absolute_priority = raw.p;
        scope.relative_priority = raw.prel;
        scope
    }
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        match raw {
            RawNode::Text(s) => Node::Text(s),
            RawNode::Number(n) => Node::Text(n.to_string()),
            RawNode::Element(Element::Scope(s)) => Node::Scope(s),
            RawNode::Element(Element::First(f)) => Node::First(f),
            RawNode::Element(Element::Empty(e)) => Node::Scope(e.into()),
            RawNode::Element(Element::Chat(c)) => Node::Chat(c),
        }
    }
}

#[derive(Deserialize)]
struct RawFirst {
    #[serde(default)]
    children: Vec<Node>,
}

impl TryFrom<RawFirst> for First {
    type Error = StructuralError;

    fn try_from(raw: RawFirst) -> std::result::Result<Self, Self::Error> {
        match first(raw.children)? {
            Node::First(f) => Ok(f),
            other => Err(StructuralError::FirstChildNotScope { found: other.kind() }),
        }
    }
}
