// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visible-set planning and animation origins.

use hashbrown::{HashMap, HashSet};
use kurbo::Rect;
use smallvec::SmallVec;
use understory_fold_tree::{NodeId, NodeTree, Walk};

/// The part of a tree a render pass draws.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisiblePlan {
    nodes: Vec<NodeId>,
    parents: HashMap<NodeId, NodeId>,
    links: Vec<(NodeId, NodeId)>,
    members: HashSet<NodeId>,
}

impl VisiblePlan {
    /// Visible nodes in pre-order, root first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Visible parent of a visible node. `None` for the root and hidden nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// `(parent, child)` edges between visible nodes, in child pre-order.
    pub fn links(&self) -> &[(NodeId, NodeId)] {
        &self.links
    }

    /// Returns `true` if `id` is drawn.
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Number of visible nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Collects the visible set under `root`: a folded node is visible, its children are not.
pub fn plan_visible(tree: &NodeTree, root: NodeId) -> VisiblePlan {
    let mut plan = VisiblePlan::default();
    tree.walk(root, |id, node| {
        if id != root
            && let Some(parent) = node.parent()
        {
            plan.parents.insert(id, parent);
            plan.links.push((parent, id));
        }
        plan.nodes.push(id);
        plan.members.insert(id);
        if node.is_folded() {
            Walk::Skip
        } else {
            Walk::Descend
        }
    });
    plan
}

/// Which surviving node an entering or exiting node animates from or to.
///
/// Each assignment claims a whole subtree of the model, folded parts included, and a
/// node keeps the first origin it is given. Seed the originating node first, then the
/// parents of entering nodes in pre-order, so every fresh subtree grows out of its
/// nearest surviving ancestor.
#[derive(Clone, Debug, Default)]
pub struct OriginMap {
    origins: HashMap<NodeId, NodeId>,
}

impl OriginMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `origin` the origin of every node in its subtree that has none yet.
    ///
    /// Does nothing when `origin` itself already has an origin.
    pub fn claim(&mut self, tree: &NodeTree, origin: NodeId) {
        if self.origins.contains_key(&origin) {
            return;
        }
        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.push(origin);
        while let Some(id) = stack.pop() {
            self.origins.entry(id).or_insert(origin);
            stack.extend(tree.children(id).iter().rev().copied());
        }
    }

    /// Origin of `id`, if one was claimed.
    pub fn origin(&self, id: NodeId) -> Option<NodeId> {
        self.origins.get(&id).copied()
    }

    /// Rectangle an entering node grows out of: its origin's rectangle before this pass,
    /// or `root_prior` when the origin had none.
    pub fn source_rect(&self, id: NodeId, prior: &HashMap<NodeId, Rect>, root_prior: Rect) -> Rect {
        self.origin(id)
            .and_then(|origin| prior.get(&origin).copied())
            .unwrap_or(root_prior)
    }

    /// Rectangle an exiting node collapses into: the new rectangle of its origin, else of
    /// `parent`, else of the root, taking the first one still drawn.
    ///
    /// `parent` is the parent the node had when it was drawn; it may be gone from the tree.
    pub fn target_rect(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        plan: &VisiblePlan,
        tree: &NodeTree,
    ) -> Rect {
        let origin = self
            .origin(id)
            .filter(|origin| plan.contains(*origin))
            .or_else(|| parent.filter(|parent| plan.contains(*parent)))
            .unwrap_or_else(|| tree.root());
        tree.state(origin).map_or(Rect::ZERO, |state| state.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use understory_fold_tree::{Fold, FoldPolicy, PureNode};

    fn abcd() -> PureNode {
        PureNode::new("A").with_children([
            PureNode::new("B").with_children([PureNode::new("D")]),
            PureNode::new("C"),
        ])
    }

    #[test]
    fn folded_children_are_hidden() {
        let mut tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let plan = plan_visible(&tree, tree.root());
        assert_eq!(plan.nodes(), &[NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(plan.links().len(), 3);
        assert_eq!(plan.parent(NodeId(3)), Some(NodeId(2)));

        tree.set_fold(NodeId(2), Fold::Collapsed).unwrap();
        let plan = plan_visible(&tree, tree.root());
        assert_eq!(plan.nodes(), &[NodeId(1), NodeId(2), NodeId(4)]);
        assert!(!plan.contains(NodeId(3)), "D sits under collapsed B");
        assert_eq!(plan.links(), &[(NodeId(1), NodeId(2)), (NodeId(1), NodeId(4))]);
    }

    #[test]
    fn first_claim_wins() {
        let tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let mut origins = OriginMap::new();
        origins.claim(&tree, NodeId(2));
        origins.claim(&tree, NodeId(1));
        assert_eq!(origins.origin(NodeId(3)), Some(NodeId(2)));
        assert_eq!(origins.origin(NodeId(2)), Some(NodeId(2)));
        assert_eq!(origins.origin(NodeId(4)), Some(NodeId(1)));

        origins.claim(&tree, NodeId(2));
        assert_eq!(origins.origin(NodeId(3)), Some(NodeId(2)), "claims are not replaced");
    }

    #[test]
    fn source_rect_falls_back_to_root() {
        let tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let mut origins = OriginMap::new();
        origins.claim(&tree, NodeId(2));
        let b = Rect::new(10.0, 10.0, 20.0, 20.0);
        let root = Rect::new(0.0, 0.0, 5.0, 5.0);
        let mut prior = HashMap::new();
        prior.insert(NodeId(2), b);
        assert_eq!(origins.source_rect(NodeId(3), &prior, root), b);
        assert_eq!(origins.source_rect(NodeId(4), &prior, root), root, "C has no origin");
        prior.clear();
        assert_eq!(origins.source_rect(NodeId(3), &prior, root), root, "B was never drawn");
    }

    #[test]
    fn target_rect_needs_a_drawn_origin() {
        let mut tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        tree.set_rect(NodeId(1), Rect::new(0.0, 0.0, 1.0, 1.0));
        tree.set_rect(NodeId(2), Rect::new(2.0, 2.0, 3.0, 3.0));
        let mut origins = OriginMap::new();
        origins.claim(&tree, NodeId(2));

        let plan = plan_visible(&tree, tree.root());
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        assert_eq!(origins.target_rect(NodeId(3), Some(NodeId(2)), &plan, &tree), b);

        tree.set_fold(NodeId(1), Fold::Collapsed).unwrap();
        let plan = plan_visible(&tree, tree.root());
        assert_eq!(
            origins.target_rect(NodeId(3), Some(NodeId(2)), &plan, &tree),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            "B is hidden, so D collapses into the root"
        );
    }

    #[test]
    fn removed_node_collapses_into_its_old_parent() {
        let mut tree = NodeTree::initialize(&abcd(), FoldPolicy::default());
        let (x, _) = tree.replace_subtree(NodeId(3), &PureNode::new("X")).unwrap();
        tree.set_rect(NodeId(1), Rect::new(0.0, 0.0, 1.0, 1.0));
        tree.set_rect(NodeId(2), Rect::new(2.0, 2.0, 3.0, 3.0));
        let plan = plan_visible(&tree, tree.root());
        let mut origins = OriginMap::new();
        origins.claim(&tree, NodeId(2));
        assert_eq!(origins.origin(x), Some(NodeId(2)));
        assert_eq!(origins.origin(NodeId(3)), None, "D is no longer in the tree");
        assert_eq!(
            origins.target_rect(NodeId(3), Some(NodeId(2)), &plan, &tree),
            Rect::new(2.0, 2.0, 3.0, 3.0)
        );
    }

    fn arb_fold() -> impl Strategy<Value = Fold> {
        prop_oneof![Just(Fold::Expanded), Just(Fold::Collapsed)]
    }

    fn arb_tree() -> impl Strategy<Value = PureNode> {
        let leaf = ("[a-z]{0,4}", arb_fold()).prop_map(|(c, f)| PureNode::new(c).with_fold(f));
        leaf.prop_recursive(4, 48, 5, |inner| {
            ("[a-z]{0,4}", arb_fold(), prop::collection::vec(inner, 0..5)).prop_map(
                |(content, f, children)| PureNode::new(content).with_fold(f).with_children(children),
            )
        })
    }

    proptest! {
        #[test]
        fn nothing_below_a_fold_is_visible(data in arb_tree()) {
            let tree = NodeTree::initialize(&data, FoldPolicy::default());
            let plan = plan_visible(&tree, tree.root());
            for id in tree.descendants(tree.root()) {
                let hidden = tree
                    .ancestors(id)
                    .any(|a| tree.node(a).is_some_and(|n| n.is_folded()));
                prop_assert_eq!(plan.contains(id), !hidden, "node {}", id);
            }
            let mut seen = HashSet::new();
            for id in plan.nodes() {
                if let Some(parent) = plan.parent(*id) {
                    prop_assert!(seen.contains(&parent), "parents precede children");
                }
                seen.insert(*id);
            }
        }
    }
}
