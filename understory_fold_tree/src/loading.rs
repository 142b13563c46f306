// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers for producers that hand out a tree in pieces.

use crate::types::PureNode;

/// How much of a document a producer hands over up front.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LoadMode {
    /// Every node is present.
    #[default]
    Full,
    /// Only the first levels are present; deeper children are fetched on expand.
    Lazy,
}

impl LoadMode {
    /// Prepares `root` for hand-over in this mode.
    ///
    /// Both modes annotate every node with [`mark_children_state`]. `Lazy` then keeps
    /// only the root and its direct children, leaving the grandchildren to a loader.
    /// Returns the number of nodes held back.
    pub fn apply(self, root: &mut PureNode) -> usize {
        mark_children_state(root);
        match self {
            Self::Full => 0,
            Self::Lazy => prune_to_depth(root, 2),
        }
    }
}

/// Annotates every node of `root` with loader hints describing its own children.
///
/// Nodes with children get `has_children = true`, `children_loaded = true`, and a
/// `children_count`. Leaves get `has_children = false`.
pub fn mark_children_state(root: &mut PureNode) {
    let len = root.children.len();
    root.payload.loader.mark_loaded(len);
    for child in &mut root.children {
        mark_children_state(child);
    }
}

/// Drops every node deeper than `max_depth` (1 keeps only `root`).
///
/// Nodes whose children were dropped keep `has_children = true` and
/// `children_count`, and get `children_loaded = false`, so that a lazy loader can
/// fetch them later. Returns the number of nodes removed.
pub fn prune_to_depth(root: &mut PureNode, max_depth: u32) -> usize {
    prune(root, 1, max_depth.max(1))
}

fn prune(node: &mut PureNode, depth: u32, max_depth: u32) -> usize {
    if depth >= max_depth {
        if node.children.is_empty() {
            return 0;
        }
        let removed = node.children.iter().map(PureNode::len).sum();
        let count = node.children.len();
        node.children.clear();
        let hints = &mut node.payload.loader;
        hints.has_children = Some(true);
        hints.children_loaded = Some(false);
        hints.children_count = u32::try_from(count).ok();
        return removed;
    }
    node.children
        .iter_mut()
        .map(|child| prune(child, depth + 1, max_depth))
        .sum()
}
