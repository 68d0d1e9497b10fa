//! Badge rasterization.

use crate::badge::BadgeData;
use crate::color::Rgba;
use crate::error::{BadgeError, Result};
use image::{ImageFormat, Rgba as Pixel, RgbaImage};
use std::io::Cursor;

pub trait Renderer: Send + Sync {
    /// Encode `data` as a PNG image.
    fn render(&self, data: &BadgeData) -> Result<Vec<u8>>;
}

const HEIGHT: u32 = 18;
const CHAR_WIDTH: u32 = 7;
const PADDING: u32 = 6;
const LABEL_BACKGROUND: Rgba = Rgba::opaque(0x55, 0x55, 0x55);

/// Two-panel badge: a grey label panel followed by a value panel in the
/// badge color, each sized from its text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngRenderer;

impl PngRenderer {
    fn panel_width(text: &str) -> u32 {
        text.chars().count() as u32 * CHAR_WIDTH + 2 * PADDING
    }

    /// Badge dimensions as (label width, total width, height).
    pub fn dimensions(data: &BadgeData) -> (u32, u32, u32) {
        let label = Self::panel_width(data.label());
        (label, label + Self::panel_width(data.value()), HEIGHT)
    }
}

impl Renderer for PngRenderer {
    fn render(&self, data: &BadgeData) -> Result<Vec<u8>> {
        let (split, width, height) = Self::dimensions(data);
        let to_pixel = |c: Rgba| Pixel([c.r, c.g, c.b, c.a]);
        let label = to_pixel(LABEL_BACKGROUND);
        let value = to_pixel(data.color());

        let image = RgbaImage::from_fn(width, height, |x, _| if x < split { label } else { value });

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| BadgeError::Render(e.to_string()))?;
        Ok(png)
    }
}
