// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: element identifiers, flags, and colors.

use core::fmt;

/// Identifier for an element in the scene (generational).
///
/// A removed element's slot may be reused; the generation makes stale ids fail
/// [`Scene::is_alive`](crate::Scene::is_alive) instead of aliasing the new occupant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ElementId(pub(crate) u32, pub(crate) u32);

impl ElementId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Element flags controlling visibility, picking, and transient states.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u8 {
        /// Element is drawn and participates in intersection queries.
        const VISIBLE  = 0b0000_0001;
        /// Element participates in hit testing.
        const PICKABLE = 0b0000_0010;
        /// Element is animating out and will be removed.
        const EXITING  = 0b0000_0100;
        /// Element content is being edited in place.
        const EDITING  = 0b0000_1000;
    }
}

impl Default for ElementFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::PICKABLE
    }
}

/// An 8-bit sRGB color with alpha.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 255 is opaque.
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);

    /// An opaque color.
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb` or `#rrggbb`. Returns `None` for anything else.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let nibble = |i: usize| {
            digits
                .get(i..=i)
                .and_then(|d| u8::from_str_radix(d, 16).ok())
        };
        match digits.len() {
            3 => Some(Self::from_rgb8(
                nibble(0)? * 17,
                nibble(1)? * 17,
                nibble(2)? * 17,
            )),
            6 => {
                let byte = |i: usize| {
                    digits
                        .get(i..i + 2)
                        .and_then(|d| u8::from_str_radix(d, 16).ok())
                };
                Some(Self::from_rgb8(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn hex_colors() {
        assert_eq!(Color::from_hex("#1f77b4"), Some(Color::from_rgb8(0x1f, 0x77, 0xb4)));
        assert_eq!(Color::from_hex("#fff"), Some(Color::from_rgb8(255, 255, 255)));
        assert_eq!(Color::from_hex("1f77b4"), None, "a leading # is required");
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_rgb8(0x1f, 0x77, 0xb4).to_string(), "#1f77b4");
    }
}
