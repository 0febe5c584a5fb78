use std::path::Path;

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use unicode_normalization::UnicodeNormalization as _;

use crate::error::ContextError;

/// The (insofar) relevant vertical metrics of a typeface at a given size, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerticalMetrics {
    /// The distance from the baseline to the top of the tallest glyph.
    pub ascent: f32,
    /// The distance from the baseline to the bottom of the lowest glyph, negative.
    pub descent: f32,
    /// The extra spacing between two consecutive lines.
    pub line_gap: f32,
}

impl VerticalMetrics {
    /// The height of one line of text.
    pub fn line_height(&self) -> f32 {
        self.ascent - self.descent + self.line_gap
    }
}

/// Anything able to measure and paint a single line of text onto a raster.
pub trait Typeface {
    fn vertical_metrics(&self, size: f32) -> VerticalMetrics;

    /// The horizontal advance of the whole text, kerning included.
    fn advance_width(&self, text: &str, size: f32) -> f32;

    /// Paints the text with its baseline starting at `origin`, clipping to the canvas.
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: f32,
        origin: [f32; 2],
        color: Rgba<u8>,
    );
}

/// A TTF/OTF typeface loaded through `rusttype`.
pub struct FontFace {
    font: Font<'static>,
}

impl FontFace {
    /// Loads the typeface from the given font file.
    pub fn from_path(font_path: &Path) -> Result<Self, ContextError> {
        let raw_font_data = std::fs::read(font_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the font data {:?}", font_path),
                &error,
            )
        })?;

        FontFace::from_bytes(raw_font_data)
    }

    pub fn from_bytes(raw_font_data: Vec<u8>) -> Result<Self, ContextError> {
        let font = Font::try_from_vec(raw_font_data)
            .ok_or_else(|| ContextError::with_context("Unable to load the font"))?;

        Ok(FontFace { font })
    }
}

impl Typeface for FontFace {
    fn vertical_metrics(&self, size: f32) -> VerticalMetrics {
        let metrics = self.font.v_metrics(Scale::uniform(size));
        VerticalMetrics {
            ascent: metrics.ascent,
            descent: metrics.descent,
            line_gap: metrics.line_gap,
        }
    }

    fn advance_width(&self, text: &str, size: f32) -> f32 {
        let scale = Scale::uniform(size);
        let mut caret = 0.0;
        let mut last_glyph_id = None;

        for character in text.nfc() {
            let base_glyph = self.font.glyph(character);
            if let Some(id) = last_glyph_id.take() {
                caret += self.font.pair_kerning(scale, id, base_glyph.id());
            }
            last_glyph_id = Some(base_glyph.id());
            caret += base_glyph.scaled(scale).h_metrics().advance_width;
        }

        caret
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: f32,
        origin: [f32; 2],
        color: Rgba<u8>,
    ) {
        let normalized_text: String = text.nfc().collect();
        let scale = Scale::uniform(size);

        for glyph in self
            .font
            .layout(&normalized_text, scale, point(origin[0], origin[1]))
        {
            if let Some(bounding_box) = glyph.pixel_bounding_box() {
                // Draw the glyph into the image per-pixel by using the draw closure
                glyph.draw(|x, y, coverage| {
                    blend_coverage(
                        canvas,
                        // Offset the position by the glyph bounding box
                        x as i64 + bounding_box.min.x as i64,
                        y as i64 + bounding_box.min.y as i64,
                        color,
                        coverage,
                    )
                });
            }
        }
    }
}

/// A typeface without any font file: every visible character is painted as a solid box
/// of a fixed fraction of the size. It keeps layouts measurable where no font is installed.
#[derive(Debug, Clone, Copy)]
pub struct BlockTypeface {
    /// The advance of a single character relative to the font size.
    pub advance_ratio: f32,
}

impl Default for BlockTypeface {
    fn default() -> Self {
        BlockTypeface { advance_ratio: 0.5 }
    }
}

impl Typeface for BlockTypeface {
    fn vertical_metrics(&self, size: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: size * 0.8,
            descent: -size * 0.2,
            line_gap: 0.0,
        }
    }

    fn advance_width(&self, text: &str, size: f32) -> f32 {
        text.nfc().count() as f32 * size * self.advance_ratio
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: f32,
        origin: [f32; 2],
        color: Rgba<u8>,
    ) {
        let advance = size * self.advance_ratio;
        let top = (origin[1] - size * 0.7).round() as i64;
        let bottom = origin[1].round() as i64;

        for (index, character) in text.nfc().enumerate() {
            if character.is_whitespace() {
                continue;
            }
            let left = (origin[0] + index as f32 * advance).round() as i64;
            let right = (origin[0] + (index as f32 + 0.8) * advance).round() as i64;
            for y in top..bottom {
                for x in left..right {
                    blend_coverage(canvas, x, y, color, 1.0);
                }
            }
        }
    }
}

/// Composites `color` with the given coverage over the pixel at `(x, y)`, ignoring
/// coordinates outside of the canvas.
pub(crate) fn blend_coverage(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }

    let source_alpha = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if source_alpha <= 0.0 {
        return;
    }

    let destination = canvas.get_pixel_mut(x as u32, y as u32);
    let destination_alpha = destination[3] as f32 / 255.0;
    let output_alpha = source_alpha + destination_alpha * (1.0 - source_alpha);

    for channel in 0..3 {
        let source_channel = color[channel] as f32 / 255.0;
        let destination_channel = destination[channel] as f32 / 255.0;
        let output_channel = (source_channel * source_alpha
            + destination_channel * destination_alpha * (1.0 - source_alpha))
            / output_alpha;
        destination[channel] = (output_channel * 255.0).round() as u8;
    }
    destination[3] = (output_alpha * 255.0).round() as u8;
}
