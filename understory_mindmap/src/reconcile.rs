// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyed binding of visible nodes and links to scene elements.

use hashbrown::{HashMap, HashSet};
use kurbo::Rect;
use understory_fold_tree::{NodeId, NodeTree};
use understory_scene::ElementId;

use crate::planner::VisiblePlan;

/// A node element and the node it draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeBinding {
    /// Scene element.
    pub element: ElementId,
    /// Bound node.
    pub node: NodeId,
    /// Parent of the node when it was bound. Fixed, since the key contains it.
    pub parent: Option<NodeId>,
    /// Rectangle from the last completed layout that included the node.
    pub rect: Rect,
}

/// A link element and the edge it draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkBinding {
    /// Scene element.
    pub element: ElementId,
    /// Parent end.
    pub parent: NodeId,
    /// Child end; the link shares the child's key.
    pub child: NodeId,
}

/// A key in the next visible set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyed {
    /// Node key.
    pub key: String,
    /// Node id.
    pub id: NodeId,
}

/// Outcome of comparing the bound elements with the next visible set.
#[derive(Clone, Debug, Default)]
pub struct Diff {
    /// Nodes without an element yet, in pre-order.
    pub entered: Vec<Keyed>,
    /// Nodes whose element is kept, in pre-order.
    pub updated: Vec<Keyed>,
    /// Bound nodes that are no longer visible.
    pub exited: Vec<(String, NodeBinding)>,
    /// Edges without an element yet, keyed by child.
    pub links_entered: Vec<(String, NodeId, NodeId)>,
    /// Edges whose element is kept.
    pub links_updated: Vec<(String, NodeId, NodeId)>,
    /// Bound edges that are no longer visible.
    pub links_exited: Vec<(String, LinkBinding)>,
    /// Last drawn rectangle of every bound node, by id.
    pub prior: HashMap<NodeId, Rect>,
}

impl Diff {
    /// Returns `true` if nothing enters or exits.
    pub fn is_stable(&self) -> bool {
        self.entered.is_empty()
            && self.exited.is_empty()
            && self.links_entered.is_empty()
            && self.links_exited.is_empty()
    }
}

/// Key-to-element bindings that persist across render passes.
///
/// A node's key is its only identity here: a node whose key changed is a new node.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    nodes: HashMap<String, NodeBinding>,
    links: HashMap<String, LinkBinding>,
}

impl Reconciler {
    /// No bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the bindings with `plan`.
    ///
    /// Every key of `plan` lands in exactly one of `entered` and `updated`; every bound
    /// key missing from `plan` lands in `exited`. Links follow the same rule by child key.
    pub fn diff(&self, tree: &NodeTree, plan: &VisiblePlan) -> Diff {
        let mut diff = self.diff_partial(tree, plan);
        let exited: Vec<(String, NodeBinding)> = {
            let live: HashSet<&str> = diff
                .entered
                .iter()
                .chain(&diff.updated)
                .map(|k| k.key.as_str())
                .collect();
            self.nodes
                .iter()
                .filter(|(key, _)| !live.contains(key.as_str()))
                .map(|(key, binding)| (key.clone(), *binding))
                .collect()
        };
        let links_exited: Vec<(String, LinkBinding)> = {
            let live: HashSet<&str> = diff
                .links_entered
                .iter()
                .chain(&diff.links_updated)
                .map(|(key, ..)| key.as_str())
                .collect();
            self.links
                .iter()
                .filter(|(key, _)| !live.contains(key.as_str()))
                .map(|(key, binding)| (key.clone(), *binding))
                .collect()
        };
        diff.exited = exited;
        diff.links_exited = links_exited;
        // Exits are reported in id order so a pass is reproducible.
        diff.exited.sort_by_key(|(_, b)| b.node);
        diff.links_exited.sort_by_key(|(_, b)| b.child);
        diff
    }

    /// Like [`diff`](Self::diff), but bindings outside `plan` are left alone.
    ///
    /// Used when only one subtree is being drawn again.
    pub fn diff_partial(&self, tree: &NodeTree, plan: &VisiblePlan) -> Diff {
        let mut diff = Diff {
            prior: self.nodes.values().map(|b| (b.node, b.rect)).collect(),
            ..Diff::default()
        };
        for id in plan.nodes() {
            let Some(key) = tree.key(*id) else { continue };
            let keyed = Keyed {
                key: key.to_owned(),
                id: *id,
            };
            if self.nodes.contains_key(key) {
                diff.updated.push(keyed);
            } else {
                diff.entered.push(keyed);
            }
        }
        for (parent, child) in plan.links() {
            let Some(key) = tree.key(*child) else { continue };
            let edge = (key.to_owned(), *parent, *child);
            if self.links.contains_key(key) {
                diff.links_updated.push(edge);
            } else {
                diff.links_entered.push(edge);
            }
        }
        diff
    }

    /// Binds a node key.
    pub fn bind_node(&mut self, key: String, binding: NodeBinding) {
        self.nodes.insert(key, binding);
    }

    /// Drops a node binding.
    pub fn unbind_node(&mut self, key: &str) -> Option<NodeBinding> {
        self.nodes.remove(key)
    }

    /// The binding of a node key.
    pub fn node(&self, key: &str) -> Option<&NodeBinding> {
        self.nodes.get(key)
    }

    /// Records the rectangle a bound node was laid out at.
    pub fn set_rect(&mut self, key: &str, rect: Rect) {
        if let Some(binding) = self.nodes.get_mut(key) {
            binding.rect = rect;
        }
    }

    /// Binds a link key.
    pub fn bind_link(&mut self, key: String, binding: LinkBinding) {
        self.links.insert(key, binding);
    }

    /// Drops a link binding.
    pub fn unbind_link(&mut self, key: &str) -> Option<LinkBinding> {
        self.links.remove(key)
    }

    /// The binding of a link key.
    pub fn link(&self, key: &str) -> Option<&LinkBinding> {
        self.links.get(key)
    }

    /// Node bindings in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &NodeBinding)> + '_ {
        self.nodes.iter().map(|(k, b)| (k.as_str(), b))
    }

    /// Number of bound nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of bound links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Forgets every binding.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_visible;
    use proptest::prelude::*;
    use understory_fold_tree::{Fold, FoldPolicy, PureNode};
    use understory_scene::{Element, HighlightElement, Scene};

    fn abcd() -> PureNode {
        PureNode::new("A").with_children([
            PureNode::new("B").with_children([PureNode::new("D")]),
            PureNode::new("C"),
        ])
    }

    /// Binds everything `diff` reports as live and drops the rest, like a render pass.
    fn settle(tree: &NodeTree, reconciler: &mut Reconciler, scene: &mut Scene, diff: &Diff) {
        let dummy = || Element::Highlight(HighlightElement { rect: Rect::ZERO });
        for (key, _) in &diff.exited {
            reconciler.unbind_node(key);
        }
        for (key, _) in &diff.links_exited {
            reconciler.unbind_link(key);
        }
        for k in &diff.entered {
            let element = scene.insert(k.key.clone(), 0, dummy());
            reconciler.bind_node(
                k.key.clone(),
                NodeBinding {
                    element,
                    node: k.id,
                    parent: tree.parent(k.id),
                    rect: Rect::ZERO,
                },
            );
        }
        for (key, parent, child) in &diff.links_entered {
            let element = scene.insert(key.clone(), 0, dummy());
            reconciler.bind_link(
                key.clone(),
                LinkBinding {
                    element,
                    parent: *parent,
                    child: *child,
                },
            );
        }
    }

    #[test]
    fn collapse_then_expand() {
        let mut tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let mut scene = Scene::new();
        let mut reconciler = Reconciler::new();

        let first = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        assert_eq!(first.entered.len(), 4);
        assert_eq!(first.links_entered.len(), 3);
        settle(&tree, &mut reconciler, &mut scene, &first);

        tree.set_fold(NodeId(2), Fold::Collapsed).unwrap();
        let collapsed = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        assert!(collapsed.entered.is_empty());
        assert_eq!(collapsed.updated.len(), 3);
        assert_eq!(collapsed.exited.len(), 1);
        assert_eq!(collapsed.exited[0].1.node, NodeId(3));
        assert_eq!(collapsed.exited[0].1.parent, Some(NodeId(2)));
        assert_eq!(collapsed.links_exited[0].1.child, NodeId(3), "links are keyed by child");
        settle(&tree, &mut reconciler, &mut scene, &collapsed);

        tree.set_fold(NodeId(2), Fold::Expanded).unwrap();
        let expanded = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        assert_eq!(expanded.entered.iter().map(|k| k.id).collect::<Vec<_>>(), [NodeId(3)]);
        assert!(expanded.exited.is_empty());
        assert!(!expanded.is_stable());
    }

    #[test]
    fn partial_diff_reports_no_exits() {
        let tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let mut scene = Scene::new();
        let mut reconciler = Reconciler::new();
        let full = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        settle(&tree, &mut reconciler, &mut scene, &full);

        let partial = reconciler.diff_partial(&tree, &plan_visible(&tree, NodeId(2)));
        assert_eq!(partial.updated.len(), 2);
        assert!(partial.exited.is_empty(), "C is outside the subtree, not gone");
        assert_eq!(partial.prior.len(), 4);
    }

    #[test]
    fn content_change_recreates_the_element() {
        let mut tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let mut scene = Scene::new();
        let mut reconciler = Reconciler::new();
        let full = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        settle(&tree, &mut reconciler, &mut scene, &full);

        let (new_id, _) = tree.replace_subtree(NodeId(4), &PureNode::new("C2")).unwrap();
        let diff = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
        assert_eq!(diff.entered.iter().map(|k| k.id).collect::<Vec<_>>(), [new_id]);
        assert_eq!(diff.exited.len(), 1);
        assert_eq!(diff.exited[0].1.node, NodeId(4));
    }

    fn arb_folds() -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 1..24)
    }

    fn wide() -> PureNode {
        let branch = |n: usize| {
            PureNode::new(format!("b{n}"))
                .with_children((0..3).map(|i| PureNode::new(format!("l{n}.{i}"))))
        };
        PureNode::new("root").with_children((0..5).map(branch))
    }

    proptest! {
        #[test]
        fn every_key_has_exactly_one_outcome(before in arb_folds(), after in arb_folds()) {
            let mut tree = NodeTree::initialize(&wide(), FoldPolicy::default());
            let ids = tree.descendants(tree.root());
            let mut scene = Scene::new();
            let mut reconciler = Reconciler::new();

            for (id, fold) in ids.iter().zip(&before) {
                let fold = if *fold { Fold::Collapsed } else { Fold::Expanded };
                tree.set_fold(*id, fold).unwrap();
            }
            let first = reconciler.diff(&tree, &plan_visible(&tree, tree.root()));
            settle(&tree, &mut reconciler, &mut scene, &first);
            let bound: HashSet<String> = reconciler.nodes().map(|(k, _)| k.to_owned()).collect();

            for (id, fold) in ids.iter().zip(&after) {
                let fold = if *fold { Fold::Collapsed } else { Fold::Expanded };
                tree.set_fold(*id, fold).unwrap();
            }
            let plan = plan_visible(&tree, tree.root());
            let diff = reconciler.diff(&tree, &plan);

            let mut seen = HashSet::new();
            for k in diff.entered.iter().chain(&diff.updated) {
                prop_assert!(seen.insert(k.key.clone()), "{} reported twice", k.key);
                prop_assert_eq!(bound.contains(&k.key), diff.updated.contains(k));
            }
            prop_assert_eq!(seen.len(), plan.len());
            for (key, _) in &diff.exited {
                prop_assert!(!seen.contains(key));
                prop_assert!(bound.contains(key));
            }
            prop_assert_eq!(seen.len() + diff.exited.len(), seen.union(&bound).count());
        }
    }
}
