// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;

use crate::types::NodeId;

/// Errors reported by [`NodeTree`](crate::NodeTree) edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The id is not live in this tree.
    #[error("node {id} is not in the tree")]
    UnknownNode {
        /// Offending id.
        id: NodeId,
    },
    /// A supplied subtree has loader hints that contradict its children.
    ///
    /// `path` is the base path of the replaced node followed by `/`-separated child
    /// indices down to the offending node.
    #[error("malformed subtree at {path}: {reason}")]
    MalformedSubtree {
        /// Location of the offending node.
        path: String,
        /// What was wrong.
        reason: &'static str,
    },
    /// The root cannot be removed or replaced in place; supply new data instead.
    #[error("the root node cannot be removed or replaced")]
    RootReplacement,
}
