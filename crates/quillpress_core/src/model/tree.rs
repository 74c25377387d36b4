//! Nested and flattened tree shapes.
//!
//! # Responsibility
//! - Build a forest from rows ordered by the entity's sort key.
//! - Flatten a forest in depth-first pre-order with depth annotations.
//!
//! # Invariants
//! - Flattening preserves the node count and visits every node once.
//! - Sibling order is the order rows were supplied in.

use super::entity::{Entity, EntityId, TreeEntity};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Requested parent change for a tree node update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentChange {
    /// Leave the current parent untouched.
    #[default]
    Keep,
    /// Move the node to the root level.
    Detach,
    Set(EntityId),
}

impl From<Option<EntityId>> for ParentChange {
    fn from(parent: Option<EntityId>) -> Self {
        match parent {
            Some(id) => Self::Set(id),
            None => Self::Detach,
        }
    }
}

/// One node with its owned children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree<E> {
    #[serde(flatten)]
    pub node: E,
    pub children: Vec<Tree<E>>,
}

impl<E> Tree<E> {
    pub fn leaf(node: E) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// This node plus every descendant.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Tree::node_count).sum::<usize>()
    }
}

/// Flattened node; children are stripped, `depth` counts ancestor hops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatNode<E> {
    #[serde(flatten)]
    pub node: E,
    pub depth: u32,
    pub parent: Option<EntityId>,
}

/// Groups `rows` into a forest.
///
/// `keep` is applied at every level; a rejected node drops its subtree.
/// A row whose parent is absent from `rows` (e.g. a trashed node below a
/// live parent in a trash-only scan) becomes a root of its own.
pub fn build_trees<E: TreeEntity>(rows: Vec<E>, keep: Option<&dyn Fn(&E) -> bool>) -> Vec<Tree<E>> {
    let present: HashSet<EntityId> = rows.iter().map(Entity::id).collect();
    let mut roots = Vec::new();
    let mut children: HashMap<EntityId, Vec<E>> = HashMap::new();
    for row in rows {
        match row.parent_id() {
            Some(parent_id) if present.contains(&parent_id) => {
                children.entry(parent_id).or_default().push(row)
            }
            _ => roots.push(row),
        }
    }
    attach(roots, &mut children, keep)
}

fn attach<E: TreeEntity>(
    level: Vec<E>,
    children: &mut HashMap<EntityId, Vec<E>>,
    keep: Option<&dyn Fn(&E) -> bool>,
) -> Vec<Tree<E>> {
    level
        .into_iter()
        .filter(|node| keep.map_or(true, |keep| keep(node)))
        .map(|node| {
            let own = children.remove(&node.id()).unwrap_or_default();
            let nested = attach(own, children, keep);
            Tree {
                node,
                children: nested,
            }
        })
        .collect()
}

/// Flattens a forest starting at depth 0.
///
/// Each root keeps its stored parent reference, which is `None` unless the
/// root was promoted because its parent lay outside the scanned rows.
pub fn to_flat_trees<E: TreeEntity>(trees: Vec<Tree<E>>) -> Vec<FlatNode<E>> {
    let mut flat = Vec::with_capacity(trees.iter().map(Tree::node_count).sum());
    for tree in trees {
        let parent = tree.node.parent_id();
        flatten_into(vec![tree], 0, parent, &mut flat);
    }
    flat
}

/// Flattens `trees` as if they hung below `parent` at `depth`.
pub fn to_flat_trees_from<E: TreeEntity>(
    trees: Vec<Tree<E>>,
    depth: u32,
    parent: Option<EntityId>,
) -> Vec<FlatNode<E>> {
    let mut flat = Vec::with_capacity(trees.iter().map(Tree::node_count).sum());
    flatten_into(trees, depth, parent, &mut flat);
    flat
}

fn flatten_into<E: TreeEntity>(
    trees: Vec<Tree<E>>,
    depth: u32,
    parent: Option<EntityId>,
    out: &mut Vec<FlatNode<E>>,
) {
    for Tree { node, children } in trees {
        let id = node.id();
        out.push(FlatNode {
            node,
            depth,
            parent,
        });
        flatten_into(children, depth + 1, Some(id), out);
    }
}
