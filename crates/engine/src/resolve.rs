//! Priority resolution.
//!
//! Every scope gets an effective priority: its absolute priority when set,
//! otherwise its parent's effective priority plus its relative offset (zero
//! when unset). Top-level nodes hang off an implicit root at the base
//! priority. The distinct priorities, base included, are the candidate
//! cutoff levels the search walks over.

use std::collections::BTreeSet;

use priorender_core::{Priority, Result, StructuralError};

use crate::tree::{NodeId, PromptTree, TreeNode};

/// Effective priorities for one tree.
#[derive(Debug, Clone)]
pub struct Resolution {
    priorities: Vec<Option<Priority>>,
    levels: Vec<Priority>,
}

impl Resolution {
    /// Effective priority of `id`, if it is a scope.
    pub fn priority(&self, id: NodeId) -> Option<Priority> {
        self.priorities.get(id).copied().flatten()
    }

    /// Distinct cutoff levels in ascending order. Never empty.
    pub fn levels(&self) -> &[Priority] {
        &self.levels
    }
}

/// Resolve every scope's effective priority and collect the cutoff levels.
///
/// Also rejects a chat message nested in another one at any depth, which
/// the renderer could never render.
pub fn resolve(tree: &PromptTree, base: Priority) -> Result<Resolution> {
    let mut walk = Walk {
        tree,
        priorities: vec![None; tree.len()],
        levels: BTreeSet::from([base]),
    };
    for &root in tree.roots() {
        walk.visit(root, base, false)?;
    }
    Ok(Resolution {
        priorities: walk.priorities,
        levels: walk.levels.into_iter().collect(),
    })
}

struct Walk<'t> {
    tree: &'t PromptTree,
    priorities: Vec<Option<Priority>>,
    levels: BTreeSet<Priority>,
}

impl Walk<'_> {
    fn visit(&mut self, id: NodeId, parent: Priority, in_chat: bool) -> Result<()> {
        match self.tree.node(id) {
            TreeNode::Text(_) | TreeNode::Empty { .. } => {}
            TreeNode::Scope {
                children,
                absolute_priority,
                relative_priority,
            } => {
                let priority = absolute_priority
                    .unwrap_or_else(|| parent.saturating_add(relative_priority.unwrap_or(0)));
                self.priorities[id] = Some(priority);
                self.levels.insert(priority);
                for &child in children {
                    self.visit(child, priority, in_chat)?;
                }
            }
            TreeNode::First { alternatives } => {
                for &alt in alternatives {
                    // `first` and JSON parsing only admit scopes.
                    debug_assert!(matches!(self.tree.node(alt), TreeNode::Scope { .. }));
                    self.visit(alt, parent, in_chat)?;
                }
            }
            TreeNode::Chat { role, children } => {
                if in_chat {
                    return Err(StructuralError::NestedChatMessage { role: role.clone() }.into());
                }
                for &child in children {
                    self.visit(child, parent, true)?;
                }
            }
        }
        Ok(())
    }
}
