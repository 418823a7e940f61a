//! Authoring checks that do not change the render.
//!
//! Both checks are advisory by default: findings are logged and returned.
//! With strict priority ordering a child outranking its parent becomes an
//! error instead.

use std::fmt;

use priorender_core::{Error, Priority, RenderSettings, Result};
use tracing::warn;

use crate::resolve::Resolution;
use crate::tree::{NodeId, PromptTree, TreeNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A scope resolved above its enclosing scope. It still renders exactly
    /// when its parent does, so its effective priority is the parent's.
    ChildOutranksParent {
        node: NodeId,
        child: Priority,
        parent: Priority,
    },
    /// A scope sets both an absolute and a relative priority; the relative
    /// one is ignored.
    AbsoluteAndRelative {
        node: NodeId,
        absolute: Priority,
        relative: Priority,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::ChildOutranksParent { child, parent, .. } => write!(
                f,
                "child scope has a higher priority ({child}) than its parent ({parent}); \
                 the extra priority has no effect and the child is kept only while \
                 its parent is"
            ),
            ValidationWarning::AbsoluteAndRelative { absolute, relative, .. } => write!(
                f,
                "scope has both an absolute ({absolute}) and a relative ({relative}) priority; \
                 the relative priority is ignored"
            ),
        }
    }
}

/// Run both checks over a resolved tree.
pub fn validate(
    tree: &PromptTree,
    resolution: &Resolution,
    settings: &RenderSettings,
) -> Result<Vec<ValidationWarning>> {
    let mut warnings = Vec::new();
    let root = settings.base_priority;
    for &id in tree.roots() {
        check_priority_order(tree, resolution, id, root, &mut warnings);
    }
    for &id in tree.roots() {
        check_conflicting_priorities(tree, id, &mut warnings);
    }

    if settings.strict_priority_order {
        let violation = warnings.iter().find_map(|w| match *w {
            ValidationWarning::ChildOutranksParent { child, parent, .. } => Some((child, parent)),
            ValidationWarning::AbsoluteAndRelative { .. } => None,
        });
        if let Some((child, parent)) = violation {
            return Err(Error::PriorityOrder { child, parent });
        }
    }

    for w in &warnings {
        warn!(warning = %w, "Prompt tree validation");
    }
    Ok(warnings)
}

fn children(node: &TreeNode) -> &[NodeId] {
    match node {
        TreeNode::Scope { children, .. } | TreeNode::Chat { children, .. } => children,
        TreeNode::First { alternatives } => alternatives,
        TreeNode::Text(_) | TreeNode::Empty { .. } => &[],
    }
}

fn check_priority_order(
    tree: &PromptTree,
    resolution: &Resolution,
    id: NodeId,
    parent: Priority,
    out: &mut Vec<ValidationWarning>,
) {
    let mut enclosing = parent;
    if let Some(priority) = resolution.priority(id) {
        if priority > parent {
            out.push(ValidationWarning::ChildOutranksParent {
                node: id,
                child: priority,
                parent,
            });
        }
        enclosing = priority;
    }
    for &child in children(tree.node(id)) {
        check_priority_order(tree, resolution, child, enclosing, out);
    }
}

fn check_conflicting_priorities(tree: &PromptTree, id: NodeId, out: &mut Vec<ValidationWarning>) {
    let node = tree.node(id);
    if let TreeNode::Scope {
        absolute_priority: Some(absolute),
        relative_priority: Some(relative),
        ..
    } = *node
    {
        out.push(ValidationWarning::AbsoluteAndRelative {
            node: id,
            absolute,
            relative,
        });
    }
    for &child in children(node) {
        check_conflicting_priorities(tree, child, out);
    }
}
