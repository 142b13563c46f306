// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Fold Tree: a foldable content tree with stable identity.
//!
//! This crate holds the model behind an outline or mind map view:
//! - A caller-facing shape ([`PureNode`]) of content, ordered children, and a [`Payload`].
//! - Derived per-node state ([`NodeState`]): id, depth, ancestor path, reconciliation key,
//!   and the last measured size and layout rectangle.
//! - Fold flags ([`Fold`]) and lazy-loading hints ([`LoaderHints`]).
//!
//! [`NodeTree::initialize`] assigns ids `1..=N` in depth-first order and applies the initial
//! fold policy. Later insertions ([`NodeTree::insert_subtree`], [`NodeTree::attach_children`],
//! [`NodeTree::replace_subtree`]) hand out ids above every id seen so far and leave every
//! other node's id, path, and key untouched, which is what lets a renderer keep its scene
//! stable across edits.
//!
//! ## Keys
//!
//! A node's key is its parent id, its own id, and a short hash of its content. Two nodes
//! with the same key across two renders are treated as the same visual element; a content
//! change yields a new key and therefore an exit/enter pair.
//!
//! ## Not a layout engine
//!
//! `size` and `rect` in [`NodeState`] are written by whoever measures and lays out the tree
//! (see `understory_tidy_layout`); this crate only stores them.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod error;
mod hash;
pub mod loading;
mod tree;
mod types;

pub use error::TreeError;
pub use loading::LoadMode;
pub use tree::{FoldPolicy, Node, NodeTree, Walk};
pub use types::{Fold, InvalidFold, LoaderHints, NodeId, NodeState, Payload, PureNode};
