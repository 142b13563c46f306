// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Mindmap: incremental layout, reconciliation, and animation for foldable
//! mind maps.
//!
//! A [`Markmap`] owns a [`NodeTree`](understory_fold_tree::NodeTree), a
//! [`Scene`](understory_scene::Scene) of persistent elements, and a camera. Every change to
//! the model goes through one pass:
//!
//! 1. [`plan_visible`] walks the tree, skipping the children of folded nodes.
//! 2. [`Reconciler::diff`] matches the plan against the elements already drawn, by key,
//!    into entering, updated, and exiting sets.
//! 3. The [`Host`] measures content after one frame, and
//!    [`layout_tree`](understory_tidy_layout::layout_tree) places every visible node.
//! 4. A [`Transition`](animation::Transition) moves each element from where it was to
//!    where it belongs. Entering nodes grow out of the node the change started from
//!    ([`OriginMap`]); exiting ones shrink back into it and are removed.
//!
//! Inserting nodes with [`Markmap::add_node`] runs the same steps on one subtree only, so
//! the rest of the diagram stays put.
//!
//! Other pieces:
//! - [`MarkmapOptions`] and its JSON form [`JsonOptions`].
//! - [`NodeLoader`] for children fetched on first expansion.
//! - [`InlineEditor`] and [`EditorSession`] for in-place editing, with
//!   [`PlainTextEditor`] as the default.
//! - [`viewport`] for fitting, centering, and panning the camera.
//! - [`RefreshHook`] and [`ResizeDebouncer`] for re-rendering on outside events.
//!
//! ## Driving it
//!
//! Operations that animate are `async`: they wait on [`Host::next_frame`]. Any executor
//! works; tests use `futures::executor::block_on` with a [`StaticHost`], whose clock only
//! moves when a frame is requested.
//!
//! ```
//! use futures::executor::block_on;
//! use understory_fold_tree::PureNode;
//! use understory_mindmap::{Markmap, MarkmapOptions, StaticHost};
//!
//! let data = PureNode::new("root").with_children([PureNode::new("a"), PureNode::new("b")]);
//! let options = MarkmapOptions::default();
//! let map = block_on(Markmap::create(StaticHost::default(), options, Some(&data))).unwrap();
//! assert_eq!(map.tree().unwrap().len(), 3);
//! ```

mod editor;
mod error;
mod host;
mod markmap;
mod options;
mod planner;
mod reconcile;
mod refresh;
mod resize;

pub mod animation;
pub mod viewport;

pub use editor::{
    CancelFn, CommitFn, EditKey, EditOutcome, EditableOptions, EditorArgs, EditorEvent,
    EditorSession, InlineEditor, KeyEvent, Modifiers, PlainTextEditor, markup_text,
};
pub use error::{Error, LoadError};
pub use host::{Host, StaticHost};
pub use markmap::{Entered, Markmap, NodeLoader, RenderReport};
pub use options::{
    DEFAULT_PALETTE, JsonOptions, LineWidth, MarkmapOptions, NodeFn, NodeRef, OrdinalScale,
    freeze_path,
};
pub use planner::{OriginMap, VisiblePlan, plan_visible};
pub use reconcile::{Diff, Keyed, LinkBinding, NodeBinding, Reconciler};
pub use refresh::{RefreshHook, Subscription};
pub use resize::{ResizeDebouncer, ResizeHandle, SuspendGuard};
pub use viewport::Padding;

pub use kurbo;
pub use understory_fold_tree;
pub use understory_scene;
pub use understory_tidy_layout;
