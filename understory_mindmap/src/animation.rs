// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-based transitions over scene elements and the camera.

use std::time::Duration;

use kurbo::{Rect, TranslateScale};
use understory_scene::{Element, ElementId, Lerp, LinkVisual, NodeVisual, Scene};

use crate::host::Host;

/// Cubic ease-in-out: slow start, fast middle, slow end.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// Interpolates a camera transform.
pub fn lerp_camera(from: TranslateScale, to: TranslateScale, t: f64) -> TranslateScale {
    TranslateScale::new(
        from.translation.lerp(to.translation, t),
        from.scale + (to.scale - from.scale) * t,
    )
}

/// One animated element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tween {
    /// A node box.
    Node {
        /// Target element.
        element: ElementId,
        /// State at `t = 0`.
        from: NodeVisual,
        /// State at `t = 1`.
        to: NodeVisual,
    },
    /// A branch.
    Link {
        /// Target element.
        element: ElementId,
        /// State at `t = 0`.
        from: LinkVisual,
        /// State at `t = 1`.
        to: LinkVisual,
    },
    /// The highlight box.
    Highlight {
        /// Target element.
        element: ElementId,
        /// Rectangle at `t = 0`.
        from: Rect,
        /// Rectangle at `t = 1`.
        to: Rect,
    },
}

impl Tween {
    /// Writes the state at eased progress `t`. Returns `false` if the element is gone.
    ///
    /// At `t >= 1` the target is written as is.
    fn apply(&self, scene: &mut Scene, t: f64) -> bool {
        let done = t >= 1.0;
        match *self {
            Self::Node { element, from, to } => match scene.get_mut(element) {
                Some(Element::Node(node)) => {
                    node.visual = if done { to } else { from.lerp(&to, t) };
                    true
                }
                _ => false,
            },
            Self::Link { element, from, to } => match scene.get_mut(element) {
                Some(Element::Link(link)) => {
                    link.visual = if done { to } else { from.lerp(&to, t) };
                    true
                }
                _ => false,
            },
            Self::Highlight { element, from, to } => match scene.get_mut(element) {
                Some(Element::Highlight(h)) => {
                    h.rect = if done { to } else { Lerp::lerp(&from, &to, t) };
                    true
                }
                _ => false,
            },
        }
    }
}

/// The tweens of one pass, plus the elements to remove once they finish.
///
/// An element removed while the transition runs is skipped from then on.
#[derive(Clone, Debug, Default)]
pub struct Transition {
    tweens: Vec<Tween>,
    exits: Vec<ElementId>,
}

impl Transition {
    /// An empty transition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tween.
    pub fn push(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    /// Removes `element` from the scene when the transition finishes.
    pub fn remove_on_finish(&mut self, element: ElementId) {
        self.exits.push(element);
    }

    /// Number of tweens.
    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    /// Returns `true` if nothing animates and nothing is removed.
    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty() && self.exits.is_empty()
    }

    /// Writes every live tween at eased progress `t`. Returns how many were skipped.
    pub fn apply(&self, scene: &mut Scene, t: f64) -> usize {
        self.tweens
            .iter()
            .filter(|tween| !tween.apply(scene, t))
            .count()
    }

    /// Writes the final state and removes exiting elements.
    pub fn finish(self, scene: &mut Scene) {
        self.apply(scene, 1.0);
        for element in self.exits {
            // Already-removed elements are fine.
            scene.remove(element);
        }
    }
}

/// Calls `step` with eased progress once per frame until `duration` has elapsed.
///
/// The last call is always `step(1.0)`. A zero duration makes exactly that call without
/// waiting for a frame. Returns the number of frames waited.
pub async fn drive<H: Host + ?Sized>(
    host: &mut H,
    duration: Duration,
    mut step: impl FnMut(f64),
) -> u32 {
    if duration.is_zero() {
        step(1.0);
        return 0;
    }
    let start = host.now();
    let mut frames = 0_u32;
    loop {
        host.next_frame().await;
        frames += 1;
        let elapsed = host.now().saturating_sub(start);
        let t = (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0);
        tracing::trace!(frame = frames, t, "transition frame");
        step(ease_cubic_in_out(t));
        if t >= 1.0 {
            return frames;
        }
    }
}
