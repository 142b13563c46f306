// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use understory_fold_tree::{NodeId, TreeError};

/// A lazy child fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load children: {message}")]
pub struct LoadError {
    /// What the loader reported.
    pub message: String,
}

impl LoadError {
    /// Creates a load error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors reported by [`Markmap`](crate::Markmap) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The loader rejected; the node's fold state is unchanged.
    #[error("loading children of node {node} failed")]
    Load {
        /// Node whose children were requested.
        node: NodeId,
        /// Loader error.
        #[source]
        source: LoadError,
    },
    /// The node is not in the current tree.
    #[error("node {0} is not in the current tree")]
    UnknownNode(NodeId),
    /// No data has been set yet.
    #[error("no data has been set")]
    NoData,
    /// The instance was destroyed.
    #[error("the mind map was destroyed")]
    Destroyed,
    /// A tree edit was rejected.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
