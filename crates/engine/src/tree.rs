//! Arena form of the prompt tree.
//!
//! The authored [`Node`] tree is flattened into a vector of [`TreeNode`]s
//! addressed by [`NodeId`]. Adjacent text siblings are merged into one
//! fragment so each fragment is counted as a unit and tokens never split at
//! an artificial boundary. Anything computed about a node later (resolved
//! priority, cached token count) lives in side tables keyed by the same id.

use priorender_core::node::{Node, Priority, Scope};

/// Index of a node in a [`PromptTree`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Text(String),
    Scope {
        children: Vec<NodeId>,
        absolute_priority: Option<Priority>,
        relative_priority: Option<Priority>,
    },
    First {
        alternatives: Vec<NodeId>,
    },
    Empty {
        reserved_tokens: usize,
    },
    Chat {
        role: String,
        children: Vec<NodeId>,
    },
}

impl TreeNode {
    pub fn kind(&self) -> &'static str {
        match self {
            TreeNode::Text(_) => "text",
            TreeNode::Scope { .. } => "scope",
            TreeNode::First { .. } => "first",
            TreeNode::Empty { .. } => "empty",
            TreeNode::Chat { .. } => "chat",
        }
    }
}

/// An immutable, normalized prompt tree.
#[derive(Debug, Clone, Default)]
pub struct PromptTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl PromptTree {
    /// Flatten `nodes` into an arena, merging adjacent text.
    pub fn build(nodes: &[Node]) -> Self {
        let mut tree = Self::default();
        tree.roots = tree.push_children(nodes);
        tree
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn push_children(&mut self, children: &[Node]) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(children.len());
        let mut pending = String::new();

        for child in children {
            if let Node::Text(s) = child {
                pending.push_str(s);
                continue;
            }
            if !pending.is_empty() {
                ids.push(self.push(TreeNode::Text(std::mem::take(&mut pending))));
            }
            ids.push(self.push_node(child));
        }

        if !pending.is_empty() {
            ids.push(self.push(TreeNode::Text(pending)));
        }
        ids
    }

    fn push_node(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(s) => self.push(TreeNode::Text(s.clone())),
            Node::Scope(scope) => self.push_scope(scope),
            Node::First(first) => {
                let alternatives = first.children.iter().map(|s| self.push_scope(s)).collect();
                self.push(TreeNode::First { alternatives })
            }
            Node::Empty(empty) => self.push(TreeNode::Empty {
                reserved_tokens: empty.reserved_tokens,
            }),
            Node::Chat(message) => {
                let children = self.push_children(&message.children);
                self.push(TreeNode::Chat {
                    role: message.role.clone(),
                    children,
                })
            }
        }
    }

    fn push_scope(&mut self, scope: &Scope) -> NodeId {
        let children = self.push_children(&scope.children);
        self.push(TreeNode::Scope {
            children,
            absolute_priority: scope.absolute_priority,
            relative_priority: scope.relative_priority,
        })
    }
}
