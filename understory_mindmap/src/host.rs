// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host seam: text measurement, viewport size, clock, and frame pacing.

use std::time::Duration;

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use hashbrown::HashMap;
use kurbo::Size;

/// Services the embedding application provides to the engine.
pub trait Host {
    /// Measures rendered `content` markup. `max_width` of `0` means unlimited.
    fn measure(&mut self, content: &str, max_width: f64) -> Size;

    /// Size of the drawing surface.
    fn viewport_size(&self) -> Size;

    /// Monotonic time since an arbitrary epoch.
    fn now(&self) -> Duration;

    /// Resolves at the next frame. Measurement waits one of these after binding.
    fn next_frame(&mut self) -> LocalBoxFuture<'_, ()>;
}

/// A deterministic host for headless use and tests.
///
/// Text is measured as a grid of fixed-width characters. Each frame advances the clock by
/// [`frame_interval`](Self::frame_interval) and resolves immediately.
#[derive(Clone, Debug)]
pub struct StaticHost {
    /// Width of one character.
    pub char_width: f64,
    /// Height of one line.
    pub line_height: f64,
    /// Reported viewport.
    pub viewport: Size,
    /// Clock step per frame.
    pub frame_interval: Duration,
    overrides: HashMap<String, Size>,
    clock: Duration,
    frames: u64,
}

impl Default for StaticHost {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            viewport: Size::new(800.0, 600.0),
            frame_interval: Duration::from_millis(16),
            overrides: HashMap::new(),
            clock: Duration::ZERO,
            frames: 0,
        }
    }
}

impl StaticHost {
    /// A host with the given viewport.
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    /// Reports `size` for exactly this content.
    pub fn set_size(&mut self, content: impl Into<String>, size: Size) {
        self.overrides.insert(content.into(), size);
    }

    /// Frames elapsed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Moves the clock forward without a frame.
    pub fn advance(&mut self, by: Duration) {
        self.clock += by;
    }
}

impl Host for StaticHost {
    fn measure(&mut self, content: &str, max_width: f64) -> Size {
        if let Some(size) = self.overrides.get(content) {
            return *size;
        }
        let text = crate::editor::markup_text(content);
        if text.is_empty() {
            return Size::ZERO;
        }
        let mut width: f64 = 0.0;
        let mut lines = 0_usize;
        for line in text.lines() {
            let line_width = line.chars().count() as f64 * self.char_width;
            if max_width > 0.0 && line_width > max_width {
                let wrapped = (line_width / max_width).ceil();
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "wrapped is a small positive line count"
                )]
                let wrapped = wrapped as usize;
                lines += wrapped;
                width = width.max(max_width);
            } else {
                lines += 1;
                width = width.max(line_width);
            }
        }
        let height = lines.max(1) as f64 * self.line_height;
        Size::new(width, height)
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn now(&self) -> Duration {
        self.clock
    }

    fn next_frame(&mut self) -> LocalBoxFuture<'_, ()> {
        self.clock += self.frame_interval;
        self.frames += 1;
        future::ready(()).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_character_grid() {
        let mut host = StaticHost::default();
        assert_eq!(host.measure("abc", 0.0), Size::new(24.0, 20.0));
        assert_eq!(host.measure("<b>ab</b><br>abcd", 0.0), Size::new(32.0, 40.0));
        assert_eq!(host.measure("", 0.0), Size::ZERO);
        assert_eq!(
            host.measure("abcdefghij", 40.0),
            Size::new(40.0, 40.0),
            "long lines wrap at max width"
        );
        host.set_size("abc", Size::new(1.0, 2.0));
        assert_eq!(host.measure("abc", 0.0), Size::new(1.0, 2.0));
    }

    #[test]
    fn frames_advance_the_clock() {
        let mut host = StaticHost::default();
        futures::executor::block_on(host.next_frame());
        futures::executor::block_on(host.next_frame());
        assert_eq!(host.now(), Duration::from_millis(32));
        assert_eq!(host.frames(), 2);
    }
}
