// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the fold tree: identifiers, fold flags, loader hints, and node shapes.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Rect, Size};

/// Identifier of a node within one [`NodeTree`](crate::NodeTree).
///
/// Ids are assigned in increasing order by whole-tree initialization and by
/// incremental insertion. An id is never handed out twice by the same tree while
/// the node holding it is live.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the raw integer value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node fold flag.
///
/// On the wire this is the integer `0`, `1`, or `2`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub enum Fold {
    /// Children are part of the visible set.
    #[default]
    Expanded,
    /// Children stay in the model but are hidden.
    Collapsed,
    /// Collapsed, and every descendant is collapsed when the tree is first initialized.
    ForceCollapsedRecursive,
}

impl Fold {
    /// Returns `true` for both collapsed variants.
    pub const fn is_folded(self) -> bool {
        !matches!(self, Self::Expanded)
    }

    /// The flag a toggle produces: expanded becomes collapsed and vice versa.
    pub const fn toggled(self) -> Self {
        if self.is_folded() {
            Self::Expanded
        } else {
            Self::Collapsed
        }
    }
}

/// Error returned when decoding a [`Fold`] from an out-of-range integer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("fold flag must be 0, 1 or 2, got {0}")]
pub struct InvalidFold(pub u8);

impl TryFrom<u8> for Fold {
    type Error = InvalidFold;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Expanded),
            1 => Ok(Self::Collapsed),
            2 => Ok(Self::ForceCollapsedRecursive),
            other => Err(InvalidFold(other)),
        }
    }
}

impl From<Fold> for u8 {
    fn from(fold: Fold) -> Self {
        match fold {
            Fold::Expanded => 0,
            Fold::Collapsed => 1,
            Fold::ForceCollapsedRecursive => 2,
        }
    }
}

/// Hints describing whether a node has children that are not in the model yet.
///
/// These are supplied by whoever produced the data (for example a lazy loader) and are
/// not authoritative: the engine only uses them to decide whether a toggle must fetch
/// children first and how to draw the expansion indicator.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderHints {
    /// The node has children, loaded or not.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub has_children: Option<bool>,
    /// The node's children are present in the model.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub children_loaded: Option<bool>,
    /// Number of children, loaded or not.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub children_count: Option<u32>,
    /// Derived: the indicator should be drawn filled.
    pub show_children_indicator: bool,
}

impl LoaderHints {
    /// Returns `true` when children exist somewhere but have not been fetched yet.
    pub fn needs_load(&self) -> bool {
        self.has_children == Some(true) && self.children_loaded != Some(true)
    }

    /// Recomputes [`show_children_indicator`](Self::show_children_indicator).
    ///
    /// `child_len` is the number of children currently in the model and stands in
    /// for `has_children` when no hint was given.
    pub fn update_children_indicator(&mut self, fold: Fold, child_len: usize) {
        let has_children = self.has_children.unwrap_or(child_len > 0);
        self.show_children_indicator = has_children
            && (fold.is_folded() || self.children_loaded == Some(false));
    }

    /// Records that `count` children were just placed in the model.
    pub fn mark_loaded(&mut self, count: usize) {
        self.has_children = Some(count > 0);
        self.children_loaded = Some(true);
        self.children_count = u32::try_from(count).ok().filter(|c| *c > 0);
    }
}

/// Free-form metadata that travels with a node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Payload {
    /// Fold flag.
    pub fold: Fold,
    /// Loader hints.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub loader: LoaderHints,
    /// Opaque identifier used by loaders and edit callbacks. Falls back to the engine id.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub node_id: Option<String>,
    /// Source line range of the node, if the producer tracks one.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub lines: Option<String>,
}

/// The caller-facing node shape: content, ordered children, payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PureNode {
    /// Renderable content (rich text markup).
    pub content: String,
    /// Ordered children. Empty means leaf.
    pub children: Vec<PureNode>,
    /// Metadata.
    pub payload: Payload,
}

impl PureNode {
    /// Creates a leaf with the given content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper that appends children.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Builder-style helper that sets the fold flag.
    #[must_use]
    pub fn with_fold(mut self, fold: Fold) -> Self {
        self.payload.fold = fold;
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Self::len).sum::<usize>()
    }

    /// Always `false`: a pure node is at least itself.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Engine-owned derived state of a node.
///
/// `size` and `rect` are only meaningful after a completed measure and layout pass.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeState {
    /// Identity.
    pub id: NodeId,
    /// 1 for the root.
    pub depth: u32,
    /// Dot-joined ancestor id chain, ending with this node's id.
    pub path: String,
    /// Reconciliation identity: parent id, own id, content hash.
    pub key: String,
    /// Last measured content size.
    pub size: Size,
    /// Last computed layout rectangle.
    pub rect: Rect,
}
