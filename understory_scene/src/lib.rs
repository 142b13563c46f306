// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scene: the persistent drawable side of a mind map.
//!
//! A [`Scene`] is a flat set of elements that outlive individual renders. Each element is
//! bound to the reconciliation key it was created for, so a renderer can keep, move, or
//! retire it across updates instead of rebuilding the whole picture.
//!
//! - [`Element`]: a node box ([`NodeElement`]), a branch ([`LinkElement`]), or the highlight
//!   ([`HighlightElement`]).
//! - [`NodeVisual`] and [`LinkVisual`]: the animated state of an element. Both implement
//!   [`Lerp`], so an animation is a pair of states and a progress value.
//! - [`ElementFlags`]: visibility, picking, and transient states (exiting, editing).
//! - [`ElementId`]: generational handle of an element.
//!
//! Key operations:
//! - [`Scene::insert`] / [`Scene::get_mut`] / [`Scene::remove`]
//! - [`Scene::commit`] → [`Damage`]; recomputes bounds of changed elements.
//! - [`Scene::hit_test_point`] for indicator and content picking, and
//!   [`Scene::intersect_rect`] for visibility queries.
//! - [`Scene::paint_order`] lists visible elements back to front.
//!
//! ## Not a layout engine
//!
//! Positions come from upstream layout and animation; this crate only stores and queries
//! them. Removing an element mid-animation is always allowed: stale [`ElementId`]s simply
//! stop resolving.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod damage;
mod element;
mod scene;
mod types;

pub use damage::Damage;
pub use element::{
    Element, HighlightElement, Indicator, Lerp, LinkElement, LinkVisual, NodeElement, NodeVisual,
};
pub use scene::{Hit, HitPart, QueryFilter, Scene};
pub use types::{Color, ElementFlags, ElementId};
