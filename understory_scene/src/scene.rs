// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core scene implementation: element slots, updates, queries.

use alloc::string::String;
use alloc::vec::Vec;
use kurbo::{Point, Rect, Shape};

use crate::damage::Damage;
use crate::element::Element;
use crate::types::{ElementFlags, ElementId};

/// A flat, persistent set of drawable elements.
///
/// Each element carries the reconciliation key it was created for, a z-order, flags,
/// and an [`Element`] payload. Ids are generational: once an element is removed, its
/// id stays dead even if the slot is reused.
///
/// Payload changes are batched and folded into scene-space bounds when
/// [`Scene::commit`] is called, which also reports what needs repainting.
///
/// ## Example
///
/// ```rust
/// use kurbo::Rect;
/// use understory_scene::{Element, HighlightElement, Scene};
///
/// let mut scene = Scene::new();
/// let id = scene.insert(
///     "highlight",
///     -1,
///     Element::Highlight(HighlightElement { rect: Rect::new(0.0, 0.0, 10.0, 10.0) }),
/// );
///
/// let damage = scene.commit();
/// assert_eq!(damage.union_rect(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
/// assert_eq!(scene.bounds(id), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
/// ```
pub struct Scene {
    /// slots
    slots: Vec<Option<Slot>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    /// bounds of elements removed since the last commit
    removed: Vec<Rect>,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.slots.len();
        let alive = self.slots.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Scene")
            .field("slots_total", &total)
            .field("slots_alive", &alive)
            .field("free_list", &free)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Which part of a node a hit landed on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HitPart {
    /// The expansion indicator.
    Indicator,
    /// The content box.
    Content,
}

/// Result of a hit test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    /// The matched element.
    pub element: ElementId,
    /// Which part was hit.
    pub part: HitPart,
}

/// Filters applied during hit testing and rectangle intersection.
#[derive(Clone, Copy, Debug)]
pub struct QueryFilter {
    /// Only elements containing all these flags are included.
    pub required_flags: ElementFlags,
    /// Elements containing any of these flags are skipped.
    pub excluded_flags: ElementFlags,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            required_flags: ElementFlags::empty(),
            excluded_flags: ElementFlags::empty(),
        }
    }
}

impl QueryFilter {
    /// Create a new empty filter (includes all elements).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to only visible elements.
    pub fn visible(mut self) -> Self {
        self.required_flags |= ElementFlags::VISIBLE;
        self
    }

    /// Filter to only pickable elements.
    pub fn pickable(mut self) -> Self {
        self.required_flags |= ElementFlags::PICKABLE;
        self
    }

    /// Skip elements that are animating out.
    pub fn settled(mut self) -> Self {
        self.excluded_flags |= ElementFlags::EXITING;
        self
    }

    /// Check if an element's flags satisfy this filter.
    pub fn matches(&self, flags: ElementFlags) -> bool {
        flags.contains(self.required_flags) && !flags.intersects(self.excluded_flags)
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    key: String,
    z_index: i32,
    flags: ElementFlags,
    element: Element,
    /// as of the last commit
    bounds: Rect,
    dirty: bool,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Insert a new element bound to `key`.
    ///
    /// The element is live immediately; its bounds are computed on the next
    /// [`Scene::commit`].
    pub fn insert(&mut self, key: impl Into<String>, z_index: i32, element: Element) -> ElementId {
        let slot = |generation| Slot {
            generation,
            key: key.into(),
            z_index,
            flags: ElementFlags::default(),
            element,
            bounds: Rect::ZERO,
            dirty: true,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(slot(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(slot(generation)));
            self.generations.push(generation);
            (self.slots.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ElementId uses 32-bit indices by design."
        )]
        ElementId::new(idx as u32, generation)
    }

    /// Remove an element. Stale ids are ignored.
    ///
    /// The area it covered is reported by the next [`Scene::commit`].
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        if !self.is_alive(id) {
            return None;
        }
        let slot = self.slots[id.idx()].take()?;
        self.removed.push(slot.bounds);
        self.free_list.push(id.idx());
        Some(slot.element)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        for idx in 0..self.slots.len() {
            if let Some(slot) = self.slots[idx].take() {
                self.removed.push(slot.bounds);
                self.free_list.push(idx);
            }
        }
    }

    /// Returns true if `id` refers to a live element.
    pub fn is_alive(&self, id: ElementId) -> bool {
        self.slot(id).is_some()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Returns `true` if there are no live elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload of a live element.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.slot(id).map(|s| &s.element)
    }

    /// The payload of a live element, for mutation. Marks the element dirty.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let slot = self.slot_mut(id)?;
        slot.dirty = true;
        Some(&mut slot.element)
    }

    /// The key the element was inserted with.
    pub fn key(&self, id: ElementId) -> Option<&str> {
        self.slot(id).map(|s| s.key.as_str())
    }

    /// Flags of a live element.
    pub fn flags(&self, id: ElementId) -> Option<ElementFlags> {
        self.slot(id).map(|s| s.flags)
    }

    /// Update element flags.
    pub fn set_flags(&mut self, id: ElementId, flags: ElementFlags) {
        if let Some(slot) = self.slot_mut(id)
            && slot.flags != flags
        {
            slot.flags = flags;
            slot.dirty = true;
        }
    }

    /// Z-order of a live element. Higher is drawn on top.
    pub fn z_index(&self, id: ElementId) -> Option<i32> {
        self.slot(id).map(|s| s.z_index)
    }

    /// Scene-space bounds of a live element as of the last [`Scene::commit`].
    pub fn bounds(&self, id: ElementId) -> Option<Rect> {
        self.slot(id).map(|s| s.bounds)
    }

    /// Live elements in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let slot = slot.as_ref()?;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ElementId uses 32-bit indices by design."
            )]
            Some((ElementId::new(idx as u32, slot.generation), &slot.element))
        })
    }

    /// Visible elements back to front: by z-order, then by age.
    pub fn paint_order(&self) -> Vec<ElementId> {
        let mut order: Vec<ElementId> = self
            .iter()
            .map(|(id, _)| id)
            .filter(|id| {
                self.flags(*id)
                    .is_some_and(|f| f.contains(ElementFlags::VISIBLE))
            })
            .collect();
        order.sort_by(|a, b| {
            let (za, zb) = (self.z_index(*a), self.z_index(*b));
            za.cmp(&zb).then_with(|| newer_order(*a, *b))
        });
        order
    }

    /// Recompute bounds of changed elements and return coarse damage.
    ///
    /// Damage holds the old and new bounds of every element whose bounds moved, plus
    /// the last bounds of every element removed since the previous commit. Rectangles
    /// may overlap.
    pub fn commit(&mut self) -> Damage {
        let mut damage = Damage {
            dirty_rects: core::mem::take(&mut self.removed),
        };
        for slot in self.slots.iter_mut().flatten() {
            if !slot.dirty {
                continue;
            }
            slot.dirty = false;
            let old = slot.bounds;
            let new = slot.element.bounds();
            if old != new {
                if old.width() > 0.0 || old.height() > 0.0 {
                    damage.dirty_rects.push(old);
                }
                if new.width() > 0.0 || new.height() > 0.0 {
                    damage.dirty_rects.push(new);
                }
                slot.bounds = new;
            }
        }
        damage.dirty_rects.retain(|r| r.width() > 0.0 || r.height() > 0.0);
        damage
    }

    /// Hit test a scene-space point against node elements.
    ///
    /// The expansion indicator takes precedence over the content box. Among
    /// candidates, higher `z_index` wins; if that ties, the newer [`ElementId`] wins.
    pub fn hit_test_point(&self, point: Point, filter: QueryFilter) -> Option<Hit> {
        let mut best: Option<(Hit, i32)> = None;
        for (id, element) in self.iter() {
            let Some(node) = element.as_node() else {
                continue;
            };
            let Some(slot) = self.slot(id) else {
                continue;
            };
            if !filter.matches(slot.flags) {
                continue;
            }
            let on_indicator = node.indicator.is_some()
                && node.visual.indicator_radius > 0.0
                && node.indicator_circle().contains(point);
            let part = if on_indicator {
                HitPart::Indicator
            } else if node.content_rect().contains(point) {
                HitPart::Content
            } else {
                continue;
            };
            let hit = Hit { element: id, part };
            best = match best {
                None => Some((hit, slot.z_index)),
                Some((current, z)) => {
                    let better = (part == HitPart::Indicator && current.part == HitPart::Content)
                        || (part == current.part
                            && (slot.z_index > z
                                || (slot.z_index == z && id_is_newer(id, current.element))));
                    if better {
                        Some((hit, slot.z_index))
                    } else {
                        Some((current, z))
                    }
                }
            };
        }
        best.map(|(hit, _)| hit)
    }

    /// Iterate live elements whose bounds intersect a scene-space rectangle.
    ///
    /// Edges are inclusive. Order is unspecified.
    pub fn intersect_rect(
        &self,
        rect: Rect,
        filter: QueryFilter,
    ) -> impl Iterator<Item = ElementId> + '_ {
        self.iter().filter_map(move |(id, _)| {
            let slot = self.slot(id)?;
            let b = slot.bounds;
            let overlaps =
                b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1;
            (overlaps && filter.matches(slot.flags)).then_some(id)
        })
    }

    // --- internals ---

    fn slot(&self, id: ElementId) -> Option<&Slot> {
        self.slots
            .get(id.idx())?
            .as_ref()
            .filter(|s| s.generation == id.1)
    }

    fn slot_mut(&mut self, id: ElementId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.idx())?
            .as_mut()
            .filter(|s| s.generation == id.1)
    }
}

#[inline]
fn id_is_newer(a: ElementId, b: ElementId) -> bool {
    (a.1 > b.1) || (a.1 == b.1 && a.0 > b.0)
}

fn newer_order(a: ElementId, b: ElementId) -> core::cmp::Ordering {
    a.1.cmp(&b.1).then(a.0.cmp(&b.0))
}
