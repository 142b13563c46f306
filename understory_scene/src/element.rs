// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element payloads: node boxes, branch links, and the highlight.

use alloc::string::String;
use kurbo::{Circle, CubicBez, Point, Rect, Shape, Size, Vec2};

use crate::types::Color;

/// Linear interpolation between two animation states.
pub trait Lerp {
    /// Returns the state `t` of the way from `self` to `other`.
    #[must_use]
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

fn mix(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl Lerp for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        mix(*self, *other, t)
    }
}

impl Lerp for Point {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::lerp(*self, *other, t)
    }
}

impl Lerp for Vec2 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::lerp(*self, *other, t)
    }
}

impl Lerp for Rect {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::from_points(
            self.origin().lerp(other.origin(), t),
            Point::new(self.x1, self.y1).lerp(Point::new(other.x1, other.y1), t),
        )
    }
}

/// The animated part of a node element.
///
/// Coordinates other than `offset` are local to the node box, whose top-left corner
/// sits at `offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeVisual {
    /// Translation of the node box.
    pub offset: Vec2,
    /// Opacity of the embedded content, `0.0..=1.0`.
    pub content_opacity: f64,
    /// Left end of the underline.
    pub line_x1: f64,
    /// Right end of the underline.
    pub line_x2: f64,
    /// Stroke width of the underline.
    pub line_stroke: f64,
    /// Radius of the expansion indicator.
    pub indicator_radius: f64,
    /// Stroke width of the expansion indicator.
    pub indicator_stroke: f64,
}

impl Lerp for NodeVisual {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            offset: self.offset.lerp(other.offset, t),
            content_opacity: mix(self.content_opacity, other.content_opacity, t),
            line_x1: mix(self.line_x1, other.line_x1, t),
            line_x2: mix(self.line_x2, other.line_x2, t),
            line_stroke: mix(self.line_stroke, other.line_stroke, t),
            indicator_radius: mix(self.indicator_radius, other.indicator_radius, t),
            indicator_stroke: mix(self.indicator_stroke, other.indicator_stroke, t),
        }
    }
}

/// Expansion indicator drawn at the right end of the underline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Indicator {
    /// Drawn filled: the node is collapsed or its children are not loaded yet.
    pub filled: bool,
    /// Optional child count shown next to the indicator.
    pub label: Option<String>,
}

/// A node box.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeElement {
    /// Size of the laid-out box.
    pub size: Size,
    /// Stroke width of the branch leading into this node; also the underline width.
    pub line_width: f64,
    /// Rendered content markup.
    pub content: String,
    /// Branch color.
    pub color: Color,
    /// Depth in the tree, 1 for the root.
    pub depth: u32,
    /// Ancestor path of the node, for renderers that expose it.
    pub path: String,
    /// `None` for nodes without children.
    pub indicator: Option<Indicator>,
    /// Current animation state.
    pub visual: NodeVisual,
}

impl NodeElement {
    /// Vertical position of the underline in local coordinates.
    pub fn line_y(&self) -> f64 {
        self.size.height + self.line_width / 2.0
    }

    /// Box in scene coordinates.
    pub fn content_rect(&self) -> Rect {
        Rect::from_origin_size(self.visual.offset.to_point(), self.size)
    }

    /// Indicator circle in scene coordinates.
    pub fn indicator_circle(&self) -> Circle {
        let center = Point::new(self.size.width, self.line_y()) + self.visual.offset;
        Circle::new(center, self.visual.indicator_radius)
    }

    pub(crate) fn bounds(&self) -> Rect {
        let mut bounds = self.content_rect();
        if self.indicator.is_some() && self.visual.indicator_radius > 0.0 {
            bounds = bounds.union(self.indicator_circle().bounding_box());
        }
        let line = Rect::new(
            self.visual.line_x1,
            self.line_y() - self.visual.line_stroke / 2.0,
            self.visual.line_x2,
            self.line_y() + self.visual.line_stroke / 2.0,
        ) + self.visual.offset;
        bounds.union(line)
    }
}

/// The animated part of a link element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkVisual {
    /// Anchor on the parent side.
    pub source: Point,
    /// Anchor on the child side.
    pub target: Point,
    /// Stroke width.
    pub stroke_width: f64,
}

impl Lerp for LinkVisual {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            source: self.source.lerp(other.source, t),
            target: self.target.lerp(other.target, t),
            stroke_width: mix(self.stroke_width, other.stroke_width, t),
        }
    }
}

impl LinkVisual {
    /// Horizontal S-curve from `source` to `target`, with both control points at the
    /// horizontal midpoint.
    pub fn path(&self) -> CubicBez {
        let mid = (self.source.x + self.target.x) / 2.0;
        CubicBez::new(
            self.source,
            Point::new(mid, self.source.y),
            Point::new(mid, self.target.y),
            self.target,
        )
    }
}

/// A branch between a parent and one of its children.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkElement {
    /// Stroke color.
    pub color: Color,
    /// Current animation state.
    pub visual: LinkVisual,
}

impl LinkElement {
    pub(crate) fn bounds(&self) -> Rect {
        let half = self.visual.stroke_width / 2.0;
        self.visual.path().bounding_box().inflate(half, half)
    }
}

/// The emphasis box drawn behind the highlighted node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightElement {
    /// Current rectangle in scene coordinates.
    pub rect: Rect,
}

/// Payload of one scene element.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    /// A node box.
    Node(NodeElement),
    /// A branch.
    Link(LinkElement),
    /// The highlight box.
    Highlight(HighlightElement),
}

impl Element {
    /// Scene-space bounds of everything the element draws.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Node(node) => node.bounds(),
            Self::Link(link) => link.bounds(),
            Self::Highlight(h) => h.rect,
        }
    }

    /// The node payload, if this is a node.
    pub fn as_node(&self) -> Option<&NodeElement> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// The link payload, if this is a link.
    pub fn as_link(&self) -> Option<&LinkElement> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }

    /// The node payload, mutably.
    pub fn as_node_mut(&mut self) -> Option<&mut NodeElement> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// The link payload, mutably.
    pub fn as_link_mut(&mut self) -> Option<&mut LinkElement> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_lerp_moves_both_corners() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(Lerp::lerp(&a, &b, 0.5), Rect::new(5.0, 10.0, 20.0, 25.0));
        assert_eq!(Lerp::lerp(&a, &b, 1.0), b, "t = 1 lands on the target");
    }

    #[test]
    fn link_path_is_horizontal_at_both_ends() {
        let link = LinkVisual {
            source: Point::new(0.0, 0.0),
            target: Point::new(100.0, 50.0),
            stroke_width: 1.0,
        };
        let path = link.path();
        assert_eq!(path.p1, Point::new(50.0, 0.0));
        assert_eq!(path.p2, Point::new(50.0, 50.0));
    }
}
