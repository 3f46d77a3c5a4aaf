//! Folder view of workspace items.
//!
//! Items point at their parent through `parentId`; nothing stops a parent
//! from being deleted or two folders from pointing at each other. The tree
//! below therefore never trusts the relation: every item appears exactly
//! once, either under a root or under an orphan entry.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::WorkspaceItem;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub item: WorkspaceItem,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceTree {
    /// Top-level items and everything reachable below them.
    pub roots: Vec<TreeNode>,
    /// Items whose parent is missing, or that sit on a parent cycle.
    pub orphans: Vec<TreeNode>,
}

impl WorkspaceTree {
    /// Build the tree, keeping the input order among siblings.
    pub fn build(items: &[WorkspaceItem]) -> Self {
        let known: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let mut children: HashMap<&str, Vec<&WorkspaceItem>> = HashMap::new();
        for item in items {
            if let Some(parent) = item.parent_id.as_deref() {
                children.entry(parent).or_default().push(item);
            }
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut tree = WorkspaceTree::default();

        for item in items.iter().filter(|i| i.is_top_level()) {
            tree.roots.push(attach(item, &children, &mut visited));
        }
        for item in items {
            let dangling = item
                .parent_id
                .as_deref()
                .is_some_and(|p| !known.contains(p));
            if dangling && !visited.contains(item.id.as_str()) {
                tree.orphans.push(attach(item, &children, &mut visited));
            }
        }
        // whatever is left hangs off a cycle
        for item in items {
            if !visited.contains(item.id.as_str()) {
                tree.orphans.push(attach(item, &children, &mut visited));
            }
        }
        tree
    }

    pub fn len(&self) -> usize {
        fn count(nodes: &[TreeNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.roots) + count(&self.orphans)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.orphans.is_empty()
    }
}

fn attach<'a>(
    item: &'a WorkspaceItem,
    children: &HashMap<&str, Vec<&'a WorkspaceItem>>,
    visited: &mut HashSet<&'a str>,
) -> TreeNode {
    visited.insert(item.id.as_str());
    let mut node = TreeNode {
        item: item.clone(),
        children: Vec::new(),
    };
    if let Some(kids) = children.get(item.id.as_str()) {
        for child in kids {
            if !visited.contains(child.id.as_str()) {
                node.children.push(attach(child, children, visited));
            }
        }
    }
    node
}

/// Ids of every item below `root_id`, deepest first, cycle-safe.
pub fn descendants(items: &[WorkspaceItem], root_id: &str) -> Vec<String> {
    let mut order = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(root_id);
    let mut stack = vec![root_id];
    while let Some(parent) = stack.pop() {
        for item in items.iter().filter(|i| i.is_child_of(parent)) {
            if seen.insert(item.id.as_str()) {
                order.push(item.id.clone());
                stack.push(item.id.as_str());
            }
        }
    }
    order.reverse();
    order
}
