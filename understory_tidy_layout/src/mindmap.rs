// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Left-to-right mind map layout over a [`NodeTree`].

use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::{Point, Rect};
use understory_fold_tree::{NodeId, NodeTree, Walk};

use crate::flextree::{FlexIndex, FlexTree};

/// Spacing constants for [`layout_tree`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutOptions {
    /// Gap between a node and its children along the flow axis.
    pub spacing_horizontal: f64,
    /// Gap between siblings. Doubled between nodes of different parents.
    pub spacing_vertical: f64,
    /// Horizontal padding on each side of non-empty content.
    pub padding_x: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            spacing_horizontal: 80.0,
            spacing_vertical: 5.0,
            padding_x: 8.0,
        }
    }
}

/// Where the laid-out subtree is placed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Anchor {
    /// The root's left edge at `x = 0`, its vertical center at `y = 0`.
    #[default]
    Origin,
    /// The root's rectangle keeps the origin it already has in the tree, so a subtree
    /// can be laid out again without moving the rest of the diagram.
    KeepRoot,
}

/// Output of [`layout_tree`].
#[derive(Clone, Debug, PartialEq)]
pub struct TreeLayout {
    rects: Vec<(NodeId, Rect)>,
    index: HashMap<NodeId, usize>,
    bounds: Rect,
}

impl TreeLayout {
    /// Rectangles in visible pre-order, root first.
    pub fn rects(&self) -> &[(NodeId, Rect)] {
        &self.rects
    }

    /// Rectangle of `id`, if it was laid out.
    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.index.get(&id).map(|i| self.rects[*i].1)
    }

    /// Union of every emitted rectangle.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Writes every rectangle back into `tree`.
    pub fn apply(&self, tree: &mut NodeTree) {
        for (id, rect) in &self.rects {
            tree.set_rect(*id, *rect);
        }
    }
}

/// Lays out the visible part of the subtree at `root`.
///
/// Each node's measured size comes from [`NodeTree::state`]. A folded node is laid out
/// but its children are not. `line_width` supplies the stroke width of the branch
/// leading into a node; it widens the gap below that node.
///
/// Returns `None` if `root` is not in `tree`.
pub fn layout_tree(
    tree: &NodeTree,
    root: NodeId,
    options: &LayoutOptions,
    mut line_width: impl FnMut(NodeId) -> f64,
    anchor: Anchor,
) -> Option<TreeLayout> {
    let extent = |id: NodeId| {
        let width = tree.state(id).map_or(0.0, |s| s.size.width);
        let padding = if width > 0.0 {
            options.padding_x * 2.0
        } else {
            0.0
        };
        width + padding + options.spacing_horizontal
    };
    let breadth = |id: NodeId| tree.state(id).map_or(0.0, |s| s.size.height);

    tree.node(root)?;
    let mut flex = FlexTree::new(breadth(root), extent(root));
    // `ids[i]` is the node behind flex index `i`; both are in visible pre-order.
    let mut ids = Vec::new();
    let mut slots: HashMap<NodeId, FlexIndex> = HashMap::new();
    tree.walk(root, |id, node| {
        let slot = match node.parent().and_then(|p| slots.get(&p).copied()) {
            Some(parent) if id != root => flex.push(parent, breadth(id), extent(id)),
            _ => FlexIndex::ROOT,
        };
        slots.insert(id, slot);
        ids.push(id);
        if node.is_folded() {
            Walk::Skip
        } else {
            Walk::Descend
        }
    });

    let spacing_vertical = options.spacing_vertical;
    flex.layout(|a, _, same_parent| {
        let gap = if same_parent {
            spacing_vertical
        } else {
            spacing_vertical * 2.0
        };
        gap + line_width(ids[a.get()])
    });

    let to_rect = |index: FlexIndex| {
        let p = flex.position(index);
        let (thickness, extent) = flex.size(index);
        Rect::from_origin_size(
            Point::new(p.y, p.x - thickness / 2.0),
            (extent - options.spacing_horizontal, thickness),
        )
    };
    let root_rect = to_rect(FlexIndex::ROOT);
    let offset = match anchor {
        Anchor::Origin => kurbo::Vec2::ZERO,
        Anchor::KeepRoot => {
            let origin = tree.state(root).map_or(Point::ZERO, |s| s.rect.origin());
            origin - root_rect.origin()
        }
    };

    let mut rects = Vec::with_capacity(ids.len());
    let mut index = HashMap::with_capacity(ids.len());
    let mut bounds = root_rect + offset;
    for (i, id) in ids.iter().enumerate() {
        let rect = to_rect(FlexIndex(i)) + offset;
        bounds = bounds.union(rect);
        index.insert(*id, i);
        rects.push((*id, rect));
    }
    Some(TreeLayout {
        rects,
        index,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;
    use proptest::prelude::*;
    use understory_fold_tree::{Fold, FoldPolicy, PureNode};

    fn measured(data: &PureNode) -> NodeTree {
        let mut tree = NodeTree::initialize(data, FoldPolicy::default());
        for id in tree.descendants(tree.root()) {
            let len = tree.node(id).unwrap().content.len() as f64;
            tree.set_size(id, Size::new(len * 7.0, 20.0));
        }
        tree
    }

    fn abc() -> PureNode {
        PureNode::new("A").with_children([
            PureNode::new("Bee").with_children([PureNode::new("D")]),
            PureNode::new("C"),
        ])
    }

    #[test]
    fn root_starts_at_origin() {
        let tree = measured(&abc());
        let layout =
            layout_tree(&tree, tree.root(), &LayoutOptions::default(), |_| 1.0, Anchor::Origin)
                .unwrap();
        let root = layout.rect(tree.root()).unwrap();
        assert_eq!(root, Rect::new(0.0, -10.0, 7.0 + 16.0, 10.0));
        let b = layout.rect(NodeId(2)).unwrap();
        assert_eq!(b.x0, 7.0 + 16.0 + 80.0, "children start one spacing right of the parent");
        assert_eq!(b.width(), 21.0 + 16.0, "width includes padding on both sides");
    }

    #[test]
    fn empty_content_gets_no_padding() {
        let data = PureNode::new("").with_children([PureNode::new("x")]);
        let tree = measured(&data);
        let layout =
            layout_tree(&tree, tree.root(), &LayoutOptions::default(), |_| 1.0, Anchor::Origin)
                .unwrap();
        assert_eq!(layout.rect(tree.root()).unwrap().width(), 0.0);
        assert_eq!(layout.rect(NodeId(2)).unwrap().x0, 80.0);
    }

    #[test]
    fn folded_children_are_not_laid_out() {
        let mut tree = measured(&abc());
        tree.set_fold(NodeId(2), Fold::Collapsed).unwrap();
        let layout =
            layout_tree(&tree, tree.root(), &LayoutOptions::default(), |_| 1.0, Anchor::Origin)
                .unwrap();
        let ids: Vec<NodeId> = layout.rects().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [NodeId(1), NodeId(2), NodeId(4)]);
        assert!(layout.rect(NodeId(3)).is_none(), "D sits under a folded node");
    }

    #[test]
    fn siblings_keep_vertical_spacing() {
        let tree = measured(&abc());
        let options = LayoutOptions::default();
        let layout = layout_tree(&tree, tree.root(), &options, |_| 2.0, Anchor::Origin).unwrap();
        let b = layout.rect(NodeId(2)).unwrap();
        let c = layout.rect(NodeId(4)).unwrap();
        assert!(
            c.y0 - b.y1 >= options.spacing_vertical + 2.0 - 1e-9,
            "B and C are separated by spacing plus stroke"
        );
    }

    #[test]
    fn keep_root_anchor_preserves_root_origin() {
        let mut tree = measured(&abc());
        let b = NodeId(2);
        tree.set_rect(b, Rect::from_origin_size((300.0, 40.0), (37.0, 20.0)));
        let layout =
            layout_tree(&tree, b, &LayoutOptions::default(), |_| 1.0, Anchor::KeepRoot).unwrap();
        assert_eq!(layout.rect(b).unwrap().origin(), Point::new(300.0, 40.0));
        let d = layout.rect(NodeId(3)).unwrap();
        assert_eq!(d.x0, 300.0 + 37.0 + 80.0, "D follows B's kept rectangle");
        assert_eq!(
            d.center().y,
            layout.rect(b).unwrap().center().y,
            "a single child is centered on B"
        );
    }

    #[test]
    fn unknown_root_yields_none() {
        let tree = measured(&abc());
        assert!(
            layout_tree(&tree, NodeId(99), &LayoutOptions::default(), |_| 1.0, Anchor::Origin)
                .is_none()
        );
    }

    fn arb_tree() -> impl Strategy<Value = PureNode> {
        let leaf = "[a-z]{0,12}".prop_map(PureNode::new);
        leaf.prop_recursive(4, 40, 5, |inner| {
            ("[a-z]{0,12}", prop::collection::vec(inner, 0..5))
                .prop_map(|(content, children)| PureNode::new(content).with_children(children))
        })
    }

    proptest! {
        #[test]
        fn layout_is_deterministic_and_bounded(data in arb_tree(), line in 0.0_f64..4.0) {
            let tree = measured(&data);
            let options = LayoutOptions::default();
            let first = layout_tree(&tree, tree.root(), &options, |_| line, Anchor::Origin).unwrap();
            let second = layout_tree(&tree, tree.root(), &options, |_| line, Anchor::Origin).unwrap();
            prop_assert_eq!(&first, &second);

            let (mut x0, mut y0, mut x1, mut y1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
            for (_, r) in first.rects() {
                x0 = x0.min(r.x0);
                y0 = y0.min(r.y0);
                x1 = x1.max(r.x1);
                y1 = y1.max(r.y1);
            }
            prop_assert_eq!(first.bounds(), Rect::new(x0, y0, x1, y1));
        }

        #[test]
        fn siblings_never_overlap(data in arb_tree()) {
            let tree = measured(&data);
            let layout = layout_tree(&tree, tree.root(), &LayoutOptions::default(), |_| 1.0, Anchor::Origin).unwrap();
            for id in tree.descendants(tree.root()) {
                let kids = tree.children(id);
                for pair in kids.windows(2) {
                    let (a, b) = (layout.rect(pair[0]).unwrap(), layout.rect(pair[1]).unwrap());
                    prop_assert!(b.y0 >= a.y1, "later siblings sit below earlier ones");
                }
            }
        }
    }
}
