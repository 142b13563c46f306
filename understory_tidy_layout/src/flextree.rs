// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Variable-size tidy tree layout (van der Ploeg's extension of Walker's algorithm).
//!
//! Axes follow the classic top-down formulation: `x` is the breadth axis along which
//! siblings are packed, `y` is the depth axis. A node's children start at
//! `parent.y + parent.extent`. Mapping onto a left-to-right mind map is the caller's job.

use alloc::vec::Vec;
use kurbo::Point;

/// Index of a node in a [`FlexTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlexIndex(pub(crate) usize);

impl FlexIndex {
    /// The root is always the first node.
    pub const ROOT: Self = Self(0);

    /// Position in insertion order.
    pub const fn get(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
struct FlexNode {
    breadth: f64,
    extent: f64,
    parent: Option<usize>,
    children: Vec<usize>,
    // outputs
    x: f64,
    y: f64,
    // scratch
    prelim: f64,
    rel_x: f64,
    shift: f64,
    change: f64,
    l_ext: usize,
    r_ext: usize,
    l_ext_rel_x: f64,
    r_ext_rel_x: f64,
    l_thr: Option<usize>,
    r_thr: Option<usize>,
}

impl FlexNode {
    fn new(index: usize, parent: Option<usize>, breadth: f64, extent: f64) -> Self {
        Self {
            breadth,
            extent,
            parent,
            children: Vec::new(),
            x: 0.0,
            y: 0.0,
            prelim: 0.0,
            rel_x: 0.0,
            shift: 0.0,
            change: 0.0,
            l_ext: index,
            r_ext: index,
            l_ext_rel_x: 0.0,
            r_ext_rel_x: 0.0,
            l_thr: None,
            r_thr: None,
        }
    }

    fn reset(&mut self, index: usize) {
        let (breadth, extent, parent) = (self.breadth, self.extent, self.parent);
        let children = core::mem::take(&mut self.children);
        *self = Self::new(index, parent, breadth, extent);
        self.children = children;
    }

    fn bottom(&self) -> f64 {
        self.y + self.extent
    }
}

/// Entry in the stack of lowest visible sibling contours.
#[derive(Copy, Clone, Debug)]
struct Low {
    low_y: f64,
    index: usize,
}

/// An arena of variable-size boxes arranged as one rooted tree.
///
/// ## Example
///
/// ```rust
/// use understory_tidy_layout::flextree::{FlexIndex, FlexTree};
///
/// let mut tree = FlexTree::new(10.0, 30.0);
/// let a = tree.push(FlexIndex::ROOT, 10.0, 30.0);
/// let b = tree.push(FlexIndex::ROOT, 10.0, 30.0);
/// tree.layout(|_, _, _| 2.0);
///
/// assert_eq!(tree.position(FlexIndex::ROOT).x, 0.0);
/// assert_eq!(tree.position(a).y, 30.0);
/// assert_eq!(tree.position(b).x - tree.position(a).x, 12.0);
/// ```
#[derive(Clone, Debug)]
pub struct FlexTree {
    nodes: Vec<FlexNode>,
}

impl FlexTree {
    /// Creates a tree holding only a root of the given size.
    pub fn new(breadth: f64, extent: f64) -> Self {
        Self {
            nodes: alloc::vec![FlexNode::new(0, None, breadth, extent)],
        }
    }

    /// Appends a child of `parent` after its existing children.
    pub fn push(&mut self, parent: FlexIndex, breadth: f64, extent: f64) -> FlexIndex {
        let index = self.nodes.len();
        self.nodes
            .push(FlexNode::new(index, Some(parent.0), breadth, extent));
        self.nodes[parent.0].children.push(index);
        FlexIndex(index)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes positions for every node.
    ///
    /// `spacing(a, b, same_parent)` returns the extra breadth-axis gap required between
    /// `a` (on the left contour) and `b` (on the right contour) when they face each other.
    /// After layout the root sits at `x = 0, y = 0`.
    pub fn layout(&mut self, mut spacing: impl FnMut(FlexIndex, FlexIndex, bool) -> f64) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.reset(index);
        }
        self.layout_children(0, 0.0, &mut spacing);
        let root = &self.nodes[0];
        let prev_sum = -root.rel_x - root.prelim;
        self.resolve_x(0, prev_sum, 0.0);
    }

    /// Position of `index` after [`FlexTree::layout`]: `x` is the breadth-axis center,
    /// `y` the depth-axis start.
    pub fn position(&self, index: FlexIndex) -> Point {
        let node = &self.nodes[index.0];
        Point::new(node.x, node.y)
    }

    /// Size of `index` as `(breadth, extent)`.
    pub fn size(&self, index: FlexIndex) -> (f64, f64) {
        let node = &self.nodes[index.0];
        (node.breadth, node.extent)
    }

    // --- algorithm ---

    fn child(&self, w: usize, i: usize) -> usize {
        self.nodes[w].children[i]
    }

    fn layout_children<S>(&mut self, w: usize, y: f64, spacing: &mut S)
    where
        S: FnMut(FlexIndex, FlexIndex, bool) -> f64,
    {
        self.nodes[w].y = y;
        let child_y = y + self.nodes[w].extent;
        let mut lows: Vec<Low> = Vec::new();
        for i in 0..self.nodes[w].children.len() {
            let kid = self.child(w, i);
            self.layout_children(kid, child_y, spacing);
            let ext = if i == 0 {
                self.nodes[kid].l_ext
            } else {
                self.nodes[kid].r_ext
            };
            let low_y = self.nodes[ext].bottom();
            if i != 0 {
                self.separate(w, i, &lows, spacing);
            }
            while lows.last().is_some_and(|low| low_y >= low.low_y) {
                lows.pop();
            }
            lows.push(Low { low_y, index: i });
        }
        self.shift_change(w);
        self.position_root(w);
    }

    fn separate<S>(&mut self, w: usize, i: usize, lows: &[Low], spacing: &mut S)
    where
        S: FnMut(FlexIndex, FlexIndex, bool) -> f64,
    {
        let l_sib = self.child(w, i - 1);
        let cur = self.child(w, i);
        let mut r_contour = Some(l_sib);
        let mut r_sum = self.nodes[l_sib].rel_x;
        let mut l_contour = Some(cur);
        let mut l_sum = self.nodes[cur].rel_x;
        let mut low = lows.len().saturating_sub(1);
        let mut first = true;

        while let (Some(r), Some(l)) = (r_contour, l_contour) {
            if low > 0 && self.nodes[r].bottom() > lows[low].low_y {
                low -= 1;
            }
            let (rn, ln) = (&self.nodes[r], &self.nodes[l]);
            let same_parent = rn.parent == ln.parent;
            let dist = (r_sum + rn.prelim) - (l_sum + ln.prelim)
                + rn.breadth / 2.0
                + ln.breadth / 2.0
                + spacing(FlexIndex(r), FlexIndex(l), same_parent);
            if dist > 0.0 || (dist < 0.0 && first) {
                l_sum += dist;
                self.move_subtree(cur, dist);
                self.distribute_extra(w, i, lows[low].index, dist);
            }
            first = false;

            let right_bottom = self.nodes[r].bottom();
            let left_bottom = self.nodes[l].bottom();
            if right_bottom <= left_bottom {
                r_contour = self.next_r_contour(r);
                if let Some(next) = r_contour {
                    r_sum += self.nodes[next].rel_x;
                }
            }
            if right_bottom >= left_bottom {
                l_contour = self.next_l_contour(l);
                if let Some(next) = l_contour {
                    l_sum += self.nodes[next].rel_x;
                }
            }
        }

        match (r_contour, l_contour) {
            (None, Some(l)) => self.set_l_thr(w, i, l, l_sum),
            (Some(r), None) => self.set_r_thr(w, i, r, r_sum),
            _ => {}
        }
    }

    fn move_subtree(&mut self, subtree: usize, distance: f64) {
        let node = &mut self.nodes[subtree];
        node.rel_x += distance;
        node.l_ext_rel_x += distance;
        node.r_ext_rel_x += distance;
    }

    fn distribute_extra(&mut self, w: usize, cur_i: usize, left_sib_i: usize, dist: f64) {
        let n = cur_i - left_sib_i;
        if n > 1 {
            let delta = dist / n as f64;
            let after_left = self.child(w, left_sib_i + 1);
            self.nodes[after_left].shift += delta;
            let cur = self.child(w, cur_i);
            self.nodes[cur].shift -= delta;
            self.nodes[cur].change -= dist - delta;
        }
    }

    fn next_l_contour(&self, w: usize) -> Option<usize> {
        let node = &self.nodes[w];
        node.children.first().copied().or(node.l_thr)
    }

    fn next_r_contour(&self, w: usize) -> Option<usize> {
        let node = &self.nodes[w];
        node.children.last().copied().or(node.r_thr)
    }

    fn set_l_thr(&mut self, w: usize, i: usize, l_contour: usize, l_sum: f64) {
        let first = self.child(w, 0);
        let cur = self.child(w, i);
        let l_ext = self.nodes[first].l_ext;
        let diff = l_sum - self.nodes[l_contour].rel_x - self.nodes[first].l_ext_rel_x;
        let ext = &mut self.nodes[l_ext];
        ext.l_thr = Some(l_contour);
        ext.rel_x += diff;
        ext.prelim -= diff;
        let (cur_l_ext, cur_l_ext_rel_x) = (self.nodes[cur].l_ext, self.nodes[cur].l_ext_rel_x);
        let first = &mut self.nodes[first];
        first.l_ext = cur_l_ext;
        first.l_ext_rel_x = cur_l_ext_rel_x;
    }

    fn set_r_thr(&mut self, w: usize, i: usize, r_contour: usize, r_sum: f64) {
        let cur = self.child(w, i);
        let l_sib = self.child(w, i - 1);
        let r_ext = self.nodes[cur].r_ext;
        let diff = r_sum - self.nodes[r_contour].rel_x - self.nodes[cur].r_ext_rel_x;
        let ext = &mut self.nodes[r_ext];
        ext.r_thr = Some(r_contour);
        ext.rel_x += diff;
        ext.prelim -= diff;
        let (sib_r_ext, sib_r_ext_rel_x) = (self.nodes[l_sib].r_ext, self.nodes[l_sib].r_ext_rel_x);
        let cur = &mut self.nodes[cur];
        cur.r_ext = sib_r_ext;
        cur.r_ext_rel_x = sib_r_ext_rel_x;
    }

    fn position_root(&mut self, w: usize) {
        let (Some(&k0), Some(&kf)) = (
            self.nodes[w].children.first(),
            self.nodes[w].children.last(),
        ) else {
            return;
        };
        let (first, last) = (&self.nodes[k0], &self.nodes[kf]);
        let prelim = (first.prelim + first.rel_x - first.breadth / 2.0
            + last.rel_x
            + last.prelim
            + last.breadth / 2.0)
            / 2.0;
        let (l_ext, l_ext_rel_x) = (first.l_ext, first.l_ext_rel_x);
        let (r_ext, r_ext_rel_x) = (last.r_ext, last.r_ext_rel_x);
        let node = &mut self.nodes[w];
        node.prelim = prelim;
        node.l_ext = l_ext;
        node.l_ext_rel_x = l_ext_rel_x;
        node.r_ext = r_ext;
        node.r_ext_rel_x = r_ext_rel_x;
    }

    fn shift_change(&mut self, w: usize) {
        let mut shift_sum = 0.0;
        let mut change_sum = 0.0;
        for i in 0..self.nodes[w].children.len() {
            let index = self.child(w, i);
            let child = &mut self.nodes[index];
            shift_sum += child.shift;
            change_sum += shift_sum + child.change;
            child.rel_x += change_sum;
        }
    }

    fn resolve_x(&mut self, w: usize, prev_sum: f64, parent_x: f64) {
        let node = &mut self.nodes[w];
        let sum = prev_sum + node.rel_x;
        node.rel_x = sum + node.prelim - parent_x;
        node.prelim = 0.0;
        node.x = parent_x + node.rel_x;
        let x = node.x;
        for i in 0..self.nodes[w].children.len() {
            let child = self.child(w, i);
            self.resolve_x(child, sum, x);
        }
    }
}
