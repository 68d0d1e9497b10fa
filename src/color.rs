//! Color token resolution.
//!
//! Badge paths name their background either by palette name (`green`) or
//! by hex value (`4c1`, `#97CA00`).

use crate::error::{BadgeError, Result};
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }
}

/// Maps a color token to an RGBA value.
pub trait ColorResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Rgba>;
}

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?([0-9a-fA-F]{6}|[0-9a-fA-F]{3})$").expect("hex color pattern is valid")
});

const PALETTE: &[(&str, Rgba)] = &[
    ("brightgreen", Rgba::opaque(0x44, 0xcc, 0x11)),
    ("green", Rgba::opaque(0x97, 0xca, 0x00)),
    ("yellowgreen", Rgba::opaque(0xa4, 0xa6, 0x1d)),
    ("yellow", Rgba::opaque(0xdf, 0xb3, 0x17)),
    ("orange", Rgba::opaque(0xfe, 0x7d, 0x37)),
    ("red", Rgba::opaque(0xe0, 0x5d, 0x44)),
    ("blue", Rgba::opaque(0x00, 0x7e, 0xc6)),
    ("lightgrey", Rgba::opaque(0x9f, 0x9f, 0x9f)),
    ("lightgray", Rgba::opaque(0x9f, 0x9f, 0x9f)),
    ("grey", Rgba::opaque(0x55, 0x55, 0x55)),
    ("gray", Rgba::opaque(0x55, 0x55, 0x55)),
    ("black", Rgba::opaque(0x00, 0x00, 0x00)),
    ("white", Rgba::opaque(0xff, 0xff, 0xff)),
];

/// Fixed palette plus hex notation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamedColors;

impl ColorResolver for NamedColors {
    fn resolve(&self, token: &str) -> Result<Rgba> {
        let lowered = token.to_ascii_lowercase();
        if let Some((_, rgba)) = PALETTE.iter().find(|(name, _)| *name == lowered) {
            return Ok(*rgba);
        }

        let digits = HEX_COLOR
            .captures(token)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| BadgeError::UnknownColor(token.to_string()))?;

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| BadgeError::UnknownColor(token.to_string()));
        if digits.len() == 3 {
            // Shorthand: each digit is doubled
            let expanded: Vec<u8> = digits
                .chars()
                .map(|c| channel(&format!("{c}{c}")))
                .collect::<Result<_>>()?;
            Ok(Rgba::opaque(expanded[0], expanded[1], expanded[2]))
        } else {
            Ok(Rgba::opaque(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            ))
        }
    }
}
