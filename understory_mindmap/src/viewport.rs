// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Camera math.
//!
//! The camera maps scene coordinates to viewport coordinates:
//! `screen = scene * scale + translation`. Every helper here is pure; the engine
//! animates from the current camera to the one returned.

use kurbo::{Rect, Size, TranslateScale, Vec2};

/// Viewport insets respected by [`ensure_visible`] and [`center_node`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Padding {
    /// Left inset.
    pub left: f64,
    /// Right inset.
    pub right: f64,
    /// Top inset.
    pub top: f64,
    /// Bottom inset.
    pub bottom: f64,
}

impl Padding {
    /// The same inset on every side.
    pub const fn uniform(inset: f64) -> Self {
        Self {
            left: inset,
            right: inset,
            top: inset,
            bottom: inset,
        }
    }
}

/// Largest scale at which `content` covers at most `fit_ratio` of `viewport`, capped at
/// `max_scale`. Degenerate axes do not constrain the result.
fn fit_scale(content: Rect, viewport: Size, fit_ratio: f64, max_scale: f64) -> f64 {
    let axis = |view: f64, natural: f64| {
        if natural > 0.0 {
            view / natural * fit_ratio
        } else {
            f64::INFINITY
        }
    };
    let scale = axis(viewport.width, content.width())
        .min(axis(viewport.height, content.height()))
        .min(max_scale);
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Scales `content` to fit and centers it.
pub fn fit(content: Rect, viewport: Size, fit_ratio: f64, max_scale: f64) -> TranslateScale {
    let scale = fit_scale(content, viewport, fit_ratio, max_scale);
    let translation = Vec2::new(
        (viewport.width - content.width() * scale) / 2.0 - content.x0 * scale,
        (viewport.height - content.height() * scale) / 2.0 - content.y0 * scale,
    );
    TranslateScale::new(translation, scale)
}

/// Scales `content` to fit, centers it horizontally, and places it vertically by
/// `target_pos`: `0` aligns its top with the viewport top, `1` its bottom with the
/// viewport bottom, values between interpolate.
pub fn center_svg(
    content: Rect,
    viewport: Size,
    target_pos: f64,
    fit_ratio: f64,
    max_scale: f64,
) -> TranslateScale {
    let scale = fit_scale(content, viewport, fit_ratio, max_scale);
    let translate_x = viewport.width / 2.0 - content.center().x * scale;
    let top = -content.y0 * scale;
    let bottom = viewport.height - content.y1 * scale;
    let t = target_pos.clamp(0.0, 1.0);
    let target = top * (1.0 - t) + bottom * t;
    let translate_y = target.clamp(top.min(bottom), top.max(bottom));
    TranslateScale::new(Vec2::new(translate_x, translate_y), scale)
}

/// Pans the smallest distance that brings `node` fully inside the padded viewport.
///
/// Returns `None` when it already is, or when it cannot fit on an axis (it then
/// straddles both edges and panning would not help).
pub fn ensure_visible(
    camera: TranslateScale,
    node: Rect,
    viewport: Size,
    padding: Padding,
) -> Option<TranslateScale> {
    let k = camera.scale;
    let t = camera.translation;
    let left = node.x0 * k + t.x;
    let right = (node.x1 + 2.0) * k + t.x;
    let top = node.y0 * k + t.y;
    let bottom = node.y1 * k + t.y;
    let shift = |a: f64, b: f64| {
        if a * b > 0.0 {
            if a.abs() <= b.abs() { a } else { b }
        } else {
            0.0
        }
    };
    let dx = shift(padding.left - left, viewport.width - padding.right - right);
    let dy = shift(padding.top - top, viewport.height - padding.bottom - bottom);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(TranslateScale::new(t + Vec2::new(dx, dy), k))
}

/// Pans so the center of `node` sits at the center of the padded viewport.
///
/// Returns `None` when it already does.
pub fn center_node(
    camera: TranslateScale,
    node: Rect,
    viewport: Size,
    padding: Padding,
) -> Option<TranslateScale> {
    let k = camera.scale;
    let center = node.center();
    let x = center.x * k + camera.translation.x;
    let y = center.y * k + camera.translation.y;
    let cx = (padding.left + viewport.width - padding.right) / 2.0;
    let cy = (padding.top + viewport.height - padding.bottom) / 2.0;
    let delta = Vec2::new(cx - x, cy - y);
    if delta == Vec2::ZERO {
        return None;
    }
    Some(TranslateScale::new(camera.translation + delta, k))
}

/// Multiplies the zoom by `factor`, keeping the viewport center fixed.
pub fn rescale(camera: TranslateScale, viewport: Size, factor: f64) -> TranslateScale {
    let half = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
    let translation = camera.translation + (half - camera.translation) * (1.0 - factor);
    TranslateScale::new(translation, camera.scale * factor)
}

/// Moves the content by `delta` viewport pixels.
pub fn pan(camera: TranslateScale, delta: Vec2) -> TranslateScale {
    TranslateScale::new(camera.translation + delta, camera.scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    const VIEW: Size = Size::new(800.0, 600.0);

    #[test]
    fn fit_centers_and_caps_scale() {
        let content = Rect::new(0.0, -50.0, 400.0, 50.0);
        let camera = fit(content, VIEW, 1.0, 10.0);
        assert_eq!(camera.scale, 2.0, "width is the binding axis");
        assert_eq!(camera * Point::new(0.0, 0.0), Point::new(0.0, 300.0));

        let capped = fit(content, VIEW, 1.0, 1.0);
        assert_eq!(capped.scale, 1.0);
        assert_eq!(capped * content.center(), Point::new(400.0, 300.0));
    }

    #[test]
    fn fit_survives_degenerate_content() {
        let camera = fit(Rect::ZERO, VIEW, 0.95, 2.0);
        assert_eq!(camera.scale, 2.0);
        assert!(camera.translation.x.is_finite() && camera.translation.y.is_finite());
        let line = fit(Rect::new(0.0, 0.0, 100.0, 0.0), VIEW, 1.0, 100.0);
        assert_eq!(line.scale, 8.0, "a flat box only constrains the horizontal axis");
    }

    #[test]
    fn center_svg_aligns_top_and_bottom() {
        let content = Rect::new(0.0, 0.0, 800.0, 300.0);
        let top = center_svg(content, VIEW, 0.0, 1.0, 1.0);
        assert_eq!(top.translation, Vec2::new(0.0, 0.0));
        let bottom = center_svg(content, VIEW, 1.0, 1.0, 1.0);
        assert_eq!(bottom.translation.y, 300.0);
        let clamped = center_svg(content, VIEW, 7.0, 1.0, 1.0);
        assert_eq!(clamped, bottom, "positions beyond 1 clamp");
        let middle = center_svg(content, VIEW, 0.5, 1.0, 1.0);
        assert_eq!(middle.translation.y, 150.0);
    }

    #[test]
    fn ensure_visible_moves_the_short_way() {
        let camera = TranslateScale::new(Vec2::ZERO, 1.0);
        let inside = Rect::new(100.0, 100.0, 200.0, 120.0);
        assert_eq!(ensure_visible(camera, inside, VIEW, Padding::default()), None);

        let off_right = Rect::new(850.0, 100.0, 900.0, 120.0);
        let moved = ensure_visible(camera, off_right, VIEW, Padding::default()).unwrap();
        assert_eq!(moved.translation, Vec2::new(-102.0, 0.0));

        let padded = ensure_visible(camera, inside, VIEW, Padding::uniform(150.0)).unwrap();
        assert_eq!(padded.translation, Vec2::new(50.0, 50.0));

        let huge = Rect::new(-100.0, 100.0, 1000.0, 120.0);
        assert_eq!(
            ensure_visible(camera, huge, VIEW, Padding::default()),
            None,
            "wider than the viewport"
        );
    }

    #[test]
    fn center_node_and_rescale() {
        let camera = TranslateScale::new(Vec2::ZERO, 2.0);
        let node = Rect::new(0.0, 0.0, 100.0, 50.0);
        let centered = center_node(camera, node, VIEW, Padding::default()).unwrap();
        assert_eq!(centered * node.center(), Point::new(400.0, 300.0));
        assert_eq!(center_node(centered, node, VIEW, Padding::default()), None);

        let zoomed = rescale(centered, VIEW, 2.0);
        assert_eq!(zoomed.scale, 4.0);
        assert_eq!(zoomed * node.center(), Point::new(400.0, 300.0), "the center is pinned");

        let panned = pan(camera, Vec2::new(5.0, -5.0));
        assert_eq!(panned.translation, Vec2::new(5.0, -5.0));
    }
}
