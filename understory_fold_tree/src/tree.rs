// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: initialization, incremental insertion, edits, traversal.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::{Rect, Size};

use crate::error::TreeError;
use crate::hash::content_hash;
use crate::types::{Fold, NodeId, NodeState, Payload, PureNode};

/// Initial fold policy applied by [`NodeTree::initialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FoldPolicy {
    /// Number of levels below the root that start expanded.
    ///
    /// A node is collapsed when `depth - 1 >= initial_expand_level`, so `0` shows only
    /// the root and `1` shows the root and its children. Negative values disable the
    /// rule. Nodes under a [`Fold::ForceCollapsedRecursive`] ancestor are collapsed
    /// regardless.
    pub initial_expand_level: i32,
}

impl Default for FoldPolicy {
    fn default() -> Self {
        Self {
            initial_expand_level: -1,
        }
    }
}

impl FoldPolicy {
    fn collapses_at(&self, depth: u32) -> bool {
        self.initial_expand_level >= 0
            && i64::from(depth) - 1 >= i64::from(self.initial_expand_level)
    }
}

/// Traversal control returned by the [`NodeTree::walk`] visitor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Walk {
    /// Visit this node's children.
    Descend,
    /// Do not visit this node's children.
    Skip,
}

/// The caller-facing part of a node as stored in the tree.
#[derive(Clone, Debug)]
pub struct Node {
    /// Renderable content.
    pub content: String,
    /// Metadata, including the fold flag and loader hints.
    pub payload: Payload,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    /// Ordered child ids.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent id, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Shorthand for `payload.fold.is_folded()`.
    pub fn is_folded(&self) -> bool {
        self.payload.fold.is_folded()
    }
}

/// A foldable content tree.
///
/// The caller-facing shape (content, payload, children) and the derived state
/// (id, depth, path, key, size, rect) live in two maps keyed by [`NodeId`]. Input
/// [`PureNode`]s are copied in; they are never mutated or retained.
///
/// ## Example
///
/// ```rust
/// use understory_fold_tree::{FoldPolicy, NodeTree, PureNode};
///
/// let data = PureNode::new("root").with_children([
///     PureNode::new("a").with_children([PureNode::new("a.1")]),
///     PureNode::new("b"),
/// ]);
/// let tree = NodeTree::initialize(&data, FoldPolicy { initial_expand_level: 1 });
///
/// let root = tree.root();
/// let a = tree.children(root)[0];
/// assert_eq!(tree.state(a).unwrap().path, "1.2");
/// assert!(tree.node(a).unwrap().is_folded());
/// ```
#[derive(Clone, Debug)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    states: HashMap<NodeId, NodeState>,
    root: NodeId,
    /// Highest id ever handed out by this tree.
    last_id: u32,
}

impl NodeTree {
    /// Builds a tree from `data`, assigning ids `1..=N` in depth-first order and
    /// applying the initial fold `policy`.
    pub fn initialize(data: &PureNode, policy: FoldPolicy) -> Self {
        let mut tree = Self {
            nodes: HashMap::with_capacity(data.len()),
            states: HashMap::with_capacity(data.len()),
            root: NodeId(1),
            last_id: 0,
        };
        let mut fold_recursively = 0_u32;
        tree.root = tree.init_node(data, None, Some(&policy), &mut fold_recursively);
        tree
    }

    /// Inserts `nodes` as children of `parent` starting at `index`.
    ///
    /// `None` or an out-of-range `index` appends. New nodes receive fresh ids above every
    /// id this tree has handed out so far; no other node's id, path, or key changes.
    /// The initial fold policy is not applied to inserted nodes.
    pub fn insert_subtree(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        nodes: &[PureNode],
    ) -> Result<Vec<NodeId>, TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::UnknownNode { id: parent });
        }
        let ids: Vec<NodeId> = nodes
            .iter()
            .map(|pure| self.init_node(pure, Some(parent), None, &mut 0))
            .collect();
        let node = self.node_mut(parent)?;
        let at = index.unwrap_or(node.children.len()).min(node.children.len());
        node.children.splice(at..at, ids.iter().copied());
        if node.payload.loader.has_children.is_some() {
            node.payload.loader.has_children = Some(true);
        }
        if let Some(count) = node.payload.loader.children_count.as_mut() {
            *count = u32::try_from(node.children.len()).unwrap_or(u32::MAX);
        }
        self.refresh_indicator(parent);
        Ok(ids)
    }

    /// Replaces the children of `parent` with freshly loaded `nodes` and marks the
    /// node's children as loaded.
    ///
    /// Returns the ids of the previous descendants that were dropped. The new child ids
    /// are available through [`NodeTree::children`].
    pub fn attach_children(
        &mut self,
        parent: NodeId,
        nodes: &[PureNode],
    ) -> Result<Vec<NodeId>, TreeError> {
        let old = core::mem::take(&mut self.node_mut(parent)?.children);
        let mut removed = Vec::new();
        for child in old {
            self.remove_recursive(child, &mut removed);
        }
        let ids: Vec<NodeId> = nodes
            .iter()
            .map(|pure| self.init_node(pure, Some(parent), None, &mut 0))
            .collect();
        let node = self.node_mut(parent)?;
        node.payload.loader.mark_loaded(ids.len());
        node.children = ids;
        self.refresh_indicator(parent);
        Ok(removed)
    }

    /// Replaces the subtree rooted at `id` with `replacement`, keeping its position
    /// among its siblings.
    ///
    /// The replacement is validated before anything is touched; on error the tree is
    /// unchanged. Returns the id of the new subtree root and the ids that were removed.
    pub fn replace_subtree(
        &mut self,
        id: NodeId,
        replacement: &PureNode,
    ) -> Result<(NodeId, Vec<NodeId>), TreeError> {
        let parent = self
            .node(id)
            .ok_or(TreeError::UnknownNode { id })?
            .parent
            .ok_or(TreeError::RootReplacement)?;
        let base = self.state(id).map(|s| s.path.clone()).unwrap_or_default();
        validate(replacement, &base)?;

        let position = self
            .children(parent)
            .iter()
            .position(|c| *c == id)
            .ok_or(TreeError::UnknownNode { id })?;
        let removed = self.remove_subtree(id)?;
        let new_id = self.init_node(replacement, Some(parent), None, &mut 0);
        self.node_mut(parent)?.children.insert(position, new_id);
        self.refresh_indicator(parent);
        Ok((new_id, removed))
    }

    /// Splices `id` and its descendants out of the tree and returns their ids.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let parent = self
            .node(id)
            .ok_or(TreeError::UnknownNode { id })?
            .parent
            .ok_or(TreeError::RootReplacement)?;
        self.node_mut(parent)?.children.retain(|c| *c != id);
        let mut removed = Vec::new();
        self.remove_recursive(id, &mut removed);
        self.refresh_indicator(parent);
        Ok(removed)
    }

    /// Root id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest id handed out so far.
    pub fn last_id(&self) -> NodeId {
        NodeId(self.last_id)
    }

    /// Returns `true` if `id` is live in this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Caller-facing node data.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Derived state.
    pub fn state(&self, id: NodeId) -> Option<&NodeState> {
        self.states.get(&id)
    }

    /// Mutable payload. Call [`NodeTree::refresh_indicator`] after changing loader hints.
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut Payload> {
        self.nodes.get_mut(&id).map(|n| &mut n.payload)
    }

    /// Ordered children of `id`, empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Parent of `id`, `None` for the root and unknown ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Reconciliation key of `id`.
    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.states.get(&id).map(|s| s.key.as_str())
    }

    /// Sets the fold flag of `id` and refreshes its indicator.
    pub fn set_fold(&mut self, id: NodeId, fold: Fold) -> Result<(), TreeError> {
        self.node_mut(id)?.payload.fold = fold;
        self.refresh_indicator(id);
        Ok(())
    }

    /// Stores the measured content size of `id`.
    pub fn set_size(&mut self, id: NodeId, size: Size) {
        if let Some(state) = self.states.get_mut(&id) {
            state.size = size;
        }
    }

    /// Stores the layout rectangle of `id`.
    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(state) = self.states.get_mut(&id) {
            state.rect = rect;
        }
    }

    /// Recomputes the filled-indicator flag of `id`.
    pub fn refresh_indicator(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let len = node.children.len();
            node.payload.loader.update_children_indicator(node.payload.fold, len);
        }
    }

    /// Depth-first pre-order walk starting at `start`.
    ///
    /// The visitor decides per node whether its children are visited.
    pub fn walk(&self, start: NodeId, mut visit: impl FnMut(NodeId, &Node) -> Walk) {
        let mut stack = alloc::vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if visit(id, node) == Walk::Descend {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// `start` and all of its descendants in pre-order, folded or not.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(start, |id, _| {
            out.push(id);
            Walk::Descend
        });
        out
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Ancestor of `id` at `depth` (1 is the root), found by truncating its path.
    ///
    /// Returns `id` itself when `depth` is at or below its own depth.
    pub fn ancestor_at_depth(&self, id: NodeId, depth: u32) -> Option<NodeId> {
        let state = self.states.get(&id)?;
        if depth == 0 {
            return None;
        }
        if depth >= state.depth {
            return Some(id);
        }
        let segment = state.path.split('.').nth(depth as usize - 1)?;
        segment.parse().ok().map(NodeId)
    }

    /// Copies the subtree at `id` back into the caller-facing shape, without derived state.
    pub fn to_pure(&self, id: NodeId) -> Option<PureNode> {
        let node = self.nodes.get(&id)?;
        Some(PureNode {
            content: node.content.clone(),
            children: node
                .children
                .iter()
                .filter_map(|c| self.to_pure(*c))
                .collect(),
            payload: node.payload.clone(),
        })
    }

    // --- internals ---

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode { id })
    }

    fn init_node(
        &mut self,
        pure: &PureNode,
        parent: Option<NodeId>,
        policy: Option<&FoldPolicy>,
        fold_recursively: &mut u32,
    ) -> NodeId {
        self.last_id += 1;
        let id = NodeId(self.last_id);
        let parent_state = parent.and_then(|p| self.states.get(&p));
        let depth = parent_state.map_or(1, |s| s.depth + 1);
        let path = match parent_state {
            Some(s) => format!("{}.{}", s.path, id),
            None => format!("{id}"),
        };
        let key = match parent {
            Some(p) => format!("{p}.{id}{}", content_hash(&pure.content)),
            None => format!("{id}{}", content_hash(&pure.content)),
        };

        let mut payload = pure.payload.clone();
        let forced = payload.fold == Fold::ForceCollapsedRecursive;
        if let Some(policy) = policy {
            if forced {
                *fold_recursively += 1;
            } else if *fold_recursively > 0 || policy.collapses_at(depth) {
                payload.fold = Fold::Collapsed;
            }
        }

        self.states.insert(
            id,
            NodeState {
                id,
                depth,
                path,
                key,
                size: Size::ZERO,
                rect: Rect::ZERO,
            },
        );
        self.nodes.insert(
            id,
            Node {
                content: pure.content.clone(),
                payload,
                children: Vec::new(),
                parent,
            },
        );

        let children: Vec<NodeId> = pure
            .children
            .iter()
            .map(|child| self.init_node(child, Some(id), policy, fold_recursively))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }
        if forced && policy.is_some() {
            *fold_recursively -= 1;
        }
        self.refresh_indicator(id);
        id
    }

    fn remove_recursive(&mut self, id: NodeId, removed: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        self.states.remove(&id);
        removed.push(id);
        for child in node.children {
            self.remove_recursive(child, removed);
        }
    }
}

/// Checks that loader hints agree with the children actually supplied.
fn validate(node: &PureNode, path: &str) -> Result<(), TreeError> {
    let hints = &node.payload.loader;
    let len = node.children.len();
    let reason = if hints.has_children == Some(false) && len > 0 {
        Some("has_children is false but children were supplied")
    } else if hints.children_loaded == Some(false) && len > 0 {
        Some("children_loaded is false but children were supplied")
    } else if hints.children_loaded == Some(true)
        && hints
            .children_count
            .is_some_and(|count| count as usize != len)
    {
        Some("children_count disagrees with the loaded children")
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(TreeError::MalformedSubtree {
            path: String::from(path),
            reason,
        });
    }
    for (i, child) in node.children.iter().enumerate() {
        validate(child, &format!("{path}/{i}"))?;
    }
    Ok(())
}
