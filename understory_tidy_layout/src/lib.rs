// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Tidy Layout: variable-size tidy tree layout for mind maps.
//!
//! - [`flextree`]: a generic arena implementation of the variable-size tidy tree algorithm.
//!   Boxes of any size are packed so that subtrees never overlap and parents are centered
//!   over their children.
//! - [`layout_tree`]: maps that algorithm onto a left-to-right mind map over a
//!   [`NodeTree`](understory_fold_tree::NodeTree), producing one [`kurbo::Rect`] per visible
//!   node and their union.
//!
//! A node's thickness (the axis siblings are stacked along) is its measured height. Its
//! extent along the flow axis is the measured width, plus padding on both sides when the
//! width is non-zero, plus the horizontal spacing. Siblings are separated by the vertical
//! spacing (doubled between cousins) plus the stroke width of the upper node's branch.
//!
//! Layout is pure: measuring content and writing rectangles back ([`TreeLayout::apply`]) are
//! separate steps.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod flextree;
mod mindmap;

pub use mindmap::{Anchor, LayoutOptions, TreeLayout, layout_tree};
