use image::{
    imageops::{self, FilterType},
    Rgba, RgbaImage,
};

use crate::{
    error::ContextError,
    layout::{Element, LayoutNode, LayoutSource, NodeStyle},
    signature::MarkKind,
    typeface::{blend_coverage, Typeface},
};

const PAGE_PADDING: f32 = 40.0;
const TEXT_COLOR: Rgba<u8> = Rgba([17, 17, 17, 255]);
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([150, 150, 150, 255]);
const RULE_COLOR: Rgba<u8> = Rgba([120, 120, 120, 255]);
const FOCUS_COLOR: Rgba<u8> = Rgba([59, 130, 246, 255]);
const CHECKBOX_SIZE: f32 = 14.0;
/// Every page is printed on opaque white, whatever the renderer leaves transparent.
const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// The fixed parameters of the capture of every page, independent of any display.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// The width in logical pixels at which every section is laid out.
    pub logical_width: f32,
    /// The number of raster pixels per logical pixel.
    pub scale: f32,
    /// The minimum height given to input-like nodes on the print copy of the layout.
    pub minimum_input_height: f32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        RasterOptions {
            logical_width: 1024.0,
            scale: 2.0,
            minimum_input_height: 28.0,
        }
    }
}

/// The raster produced by a `SectionRenderer` together with the size of the laid out box.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub image: RgbaImage,
    pub logical_width: f32,
    pub logical_height: f32,
}

/// Anything able to turn the layout of one section into pixels.
pub trait SectionRenderer {
    fn render_section_to_raster(
        &self,
        section: &LayoutNode,
        options: &RasterOptions,
    ) -> Result<RasterImage, ContextError>;
}

/// Something to be painted, in logical pixels from the top-left corner of the section.
#[derive(Debug, Clone)]
enum PaintItem {
    Text {
        text: String,
        origin: [f32; 2],
        size: f32,
        bold: bool,
        color: Rgba<u8>,
    },
    Fill {
        rect: Rect,
        color: Rgba<u8>,
    },
    Image {
        image: RgbaImage,
        rect: Rect,
    },
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// The renderer shipped with the crate: it lays the tree out top to bottom in a single
/// column and paints it with the given typeface.
pub struct LayoutRenderer {
    typeface: Box<dyn Typeface>,
}

impl LayoutRenderer {
    pub fn new(typeface: Box<dyn Typeface>) -> Self {
        LayoutRenderer { typeface }
    }
}

impl SectionRenderer for LayoutRenderer {
    fn render_section_to_raster(
        &self,
        section: &LayoutNode,
        options: &RasterOptions,
    ) -> Result<RasterImage, ContextError> {
        if options.logical_width <= 2.0 * PAGE_PADDING || options.scale <= 0.0 {
            return Err(ContextError::with_context(format!(
                "Unable to lay out the section at a width of {} with a scale of {}",
                options.logical_width, options.scale
            )));
        }

        let mut measurer = Measurer {
            typeface: self.typeface.as_ref(),
            left: PAGE_PADDING,
            content_width: options.logical_width - 2.0 * PAGE_PADDING,
            cursor: PAGE_PADDING,
            items: Vec::new(),
        };
        measurer.lay_out(section)?;

        // An integral logical height keeps the raster aspect ratio equal to the box's
        let logical_height = (measurer.cursor + PAGE_PADDING).ceil();
        let pixel_width = (options.logical_width * options.scale).round() as u32;
        let pixel_height = (logical_height * options.scale).round() as u32;

        let mut canvas = RgbaImage::from_pixel(pixel_width, pixel_height, PAGE_BACKGROUND);
        for item in measurer.items {
            self.paint(&mut canvas, item, options.scale);
        }
        log::debug!(
            "Rendered a section of {}x{} logical pixels into {}x{} pixels",
            options.logical_width,
            logical_height,
            pixel_width,
            pixel_height
        );

        Ok(RasterImage {
            image: canvas,
            logical_width: options.logical_width,
            logical_height,
        })
    }
}

impl LayoutRenderer {
    fn paint(&self, canvas: &mut RgbaImage, item: PaintItem, scale: f32) {
        match item {
            PaintItem::Text {
                text,
                origin,
                size,
                bold,
                color,
            } => {
                let origin = [origin[0] * scale, origin[1] * scale];
                self.typeface
                    .draw_text(canvas, &text, size * scale, origin, color);
                if bold {
                    let offset = (scale * 0.5).max(1.0);
                    self.typeface.draw_text(
                        canvas,
                        &text,
                        size * scale,
                        [origin[0] + offset, origin[1]],
                        color,
                    );
                }
            }
            PaintItem::Fill { rect, color } => {
                let left = (rect.x * scale).floor() as i64;
                let top = (rect.y * scale).floor() as i64;
                let right = ((rect.x + rect.width) * scale).ceil().max(left as f32 + 1.0) as i64;
                let bottom = ((rect.y + rect.height) * scale).ceil().max(top as f32 + 1.0) as i64;
                for y in top..bottom {
                    for x in left..right {
                        blend_coverage(canvas, x, y, color, 1.0);
                    }
                }
            }
            PaintItem::Image { image, rect } => {
                let width = (rect.width * scale).round().max(1.0) as u32;
                let height = (rect.height * scale).round().max(1.0) as u32;
                let resized = imageops::resize(&image, width, height, FilterType::Triangle);
                imageops::overlay(
                    canvas,
                    &resized,
                    (rect.x * scale).round() as i64,
                    (rect.y * scale).round() as i64,
                );
            }
        }
    }
}

/// Walks the tree once, stacking the nodes vertically and recording what to paint.
struct Measurer<'a> {
    typeface: &'a dyn Typeface,
    left: f32,
    content_width: f32,
    cursor: f32,
    items: Vec<PaintItem>,
}

impl Measurer<'_> {
    fn lay_out(&mut self, node: &LayoutNode) -> Result<(), ContextError> {
        let style = &node.style;
        match &node.element {
            Element::Section { .. } => {}
            Element::Heading { text } | Element::Paragraph { text } | Element::Label { text } => {
                self.text_block(text, style);
            }
            Element::Input { value, placeholder } => self.input(value, placeholder, style),
            Element::Checkbox { checked, label } => self.checkbox(*checked, label, style),
            Element::SignatureBox {
                image,
                mark,
                placeholder,
            } => {
                let (box_width, box_height) = match mark {
                    MarkKind::Signature => (300.0, 64.0),
                    MarkKind::Initials => (120.0, 40.0),
                };
                let box_height = style.min_height.max(box_height);
                let top = self.cursor;

                match image.to_rgba()? {
                    Some(raster) => {
                        let (image_width, image_height) =
                            (raster.width() as f32, raster.height() as f32);
                        let fit = (box_width / image_width).min(box_height / image_height);
                        let (width, height) = (image_width * fit, image_height * fit);
                        self.items.push(PaintItem::Image {
                            image: raster,
                            rect: Rect {
                                x: self.left + (box_width - width) / 2.0,
                                y: top + (box_height - height) / 2.0,
                                width,
                                height,
                            },
                        });
                    }
                    None if !placeholder.is_empty() => {
                        let metrics = self.typeface.vertical_metrics(style.font_size);
                        self.items.push(PaintItem::Text {
                            text: placeholder.clone(),
                            origin: [self.left + 6.0, top + box_height / 2.0 + metrics.ascent / 2.0],
                            size: style.font_size,
                            bold: false,
                            color: PLACEHOLDER_COLOR,
                        });
                    }
                    None => {}
                }

                self.decorate_box(top, box_width, box_height, style);
                self.cursor += box_height;
            }
        }

        for child in node.children.iter() {
            self.lay_out(child)?;
        }
        self.cursor += style.margin_bottom;

        Ok(())
    }

    fn line_height(&self, size: f32) -> f32 {
        self.typeface.vertical_metrics(size).line_height() + size * 0.25
    }

    fn text_block(&mut self, text: &str, style: &NodeStyle) {
        let metrics = self.typeface.vertical_metrics(style.font_size);
        let line_height = self.line_height(style.font_size);

        for line in wrap_text(self.typeface, text, style.font_size, self.content_width) {
            let line_width = self.typeface.advance_width(&line, style.font_size);
            let x = if style.centered {
                self.left + (self.content_width - line_width).max(0.0) / 2.0
            } else {
                self.left
            };
            let baseline = self.cursor + metrics.ascent;
            if style.underline {
                self.items.push(PaintItem::Fill {
                    rect: Rect {
                        x,
                        y: baseline + 2.0,
                        width: line_width,
                        height: 1.0,
                    },
                    color: TEXT_COLOR,
                });
            }
            self.items.push(PaintItem::Text {
                text: line,
                origin: [x, baseline],
                size: style.font_size,
                bold: style.bold,
                color: TEXT_COLOR,
            });
            self.cursor += line_height;
        }
    }

    fn input(&mut self, value: &str, placeholder: &str, style: &NodeStyle) {
        let metrics = self.typeface.vertical_metrics(style.font_size);
        let text_height = metrics.ascent - metrics.descent;
        let height = style.min_height.max(text_height + 6.0);
        let top = self.cursor;

        let (text, color) = if value.is_empty() {
            (placeholder, PLACEHOLDER_COLOR)
        } else {
            (value, TEXT_COLOR)
        };
        if !text.is_empty() {
            self.items.push(PaintItem::Text {
                text: text.to_string(),
                origin: [self.left + 4.0, top + (height - text_height) / 2.0 + metrics.ascent],
                size: style.font_size,
                bold: style.bold,
                color,
            });
        }

        self.decorate_box(top, self.content_width, height, style);
        self.cursor += height;
    }

    fn checkbox(&mut self, checked: bool, label: &str, style: &NodeStyle) {
        let metrics = self.typeface.vertical_metrics(style.font_size);
        let height = CHECKBOX_SIZE.max(self.line_height(style.font_size));
        let top = self.cursor;
        let box_top = top + (height - CHECKBOX_SIZE) / 2.0;

        self.frame(
            Rect {
                x: self.left,
                y: box_top,
                width: CHECKBOX_SIZE,
                height: CHECKBOX_SIZE,
            },
            TEXT_COLOR,
        );
        if checked {
            self.items.push(PaintItem::Fill {
                rect: Rect {
                    x: self.left + 3.0,
                    y: box_top + 3.0,
                    width: CHECKBOX_SIZE - 6.0,
                    height: CHECKBOX_SIZE - 6.0,
                },
                color: TEXT_COLOR,
            });
        }
        self.items.push(PaintItem::Text {
            text: label.to_string(),
            origin: [
                self.left + CHECKBOX_SIZE + 8.0,
                top + (height - (metrics.ascent - metrics.descent)) / 2.0 + metrics.ascent,
            ],
            size: style.font_size,
            bold: style.bold,
            color: TEXT_COLOR,
        });
        self.cursor += height;
    }

    fn decorate_box(&mut self, top: f32, width: f32, height: f32, style: &NodeStyle) {
        if style.border_bottom {
            self.items.push(PaintItem::Fill {
                rect: Rect {
                    x: self.left,
                    y: top + height - 1.0,
                    width,
                    height: 1.0,
                },
                color: RULE_COLOR,
            });
        }
        if style.focus_ring {
            self.frame(
                Rect {
                    x: self.left - 2.0,
                    y: top - 2.0,
                    width: width + 4.0,
                    height: height + 4.0,
                },
                FOCUS_COLOR,
            );
        }
    }

    fn frame(&mut self, rect: Rect, color: Rgba<u8>) {
        let edges = [
            Rect { height: 1.0, ..rect },
            Rect {
                y: rect.y + rect.height - 1.0,
                height: 1.0,
                ..rect
            },
            Rect { width: 1.0, ..rect },
            Rect {
                x: rect.x + rect.width - 1.0,
                width: 1.0,
                ..rect
            },
        ];
        for edge in edges {
            self.items.push(PaintItem::Fill { rect: edge, color });
        }
    }
}

/// Greedily breaks the text into lines no wider than `maximum_width`; a single word wider
/// than that is kept whole on its own line.
fn wrap_text(typeface: &dyn Typeface, text: &str, size: f32, maximum_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current_line, word);
        if typeface.advance_width(&candidate, size) <= maximum_width {
            current_line = candidate;
        } else {
            lines.push(std::mem::replace(&mut current_line, word.to_string()));
        }
    }
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// The raster snapshot of one page section, flattened onto an opaque background.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    section_id: String,
    image: RgbaImage,
}

impl RenderedPage {
    pub fn new(section_id: String, image: RgbaImage) -> Self {
        RenderedPage { section_id, image }
    }

    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }
}

/// Why a section produced no page.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterizationFailure {
    /// The layout of the section could not be found.
    NotMounted,
    /// The section laid out to an empty box.
    ZeroDimensions,
    RenderFailed(ContextError),
    /// The raster does not have the proportions of the laid out box.
    Distorted {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

impl std::fmt::Display for RasterizationFailure {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterizationFailure::NotMounted => write!(formatter, "the section is not mounted"),
            RasterizationFailure::ZeroDimensions => {
                write!(formatter, "the section has zero dimensions")
            }
            RasterizationFailure::RenderFailed(error) => write!(formatter, "{}", error),
            RasterizationFailure::Distorted { expected, found } => write!(
                formatter,
                "the raster is {}x{} pixels instead of {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for RasterizationFailure {}

/// The print copy of a section layout, alive only while the section is rasterized.
struct ScratchLayout {
    section_id: String,
    layout: LayoutNode,
}

impl ScratchLayout {
    fn new(section_id: &str, mut layout: LayoutNode, minimum_input_height: f32) -> Self {
        layout.normalize_for_print(minimum_input_height);
        ScratchLayout {
            section_id: section_id.to_string(),
            layout,
        }
    }
}

impl Drop for ScratchLayout {
    fn drop(&mut self) {
        log::debug!("Discarded the print copy of the section {:?}", self.section_id);
    }
}

/// Captures the sections of a document one at a time with a fixed set of options.
pub struct PageRasterizer<'a> {
    renderer: &'a dyn SectionRenderer,
    options: RasterOptions,
}

impl<'a> PageRasterizer<'a> {
    pub fn new(renderer: &'a dyn SectionRenderer, options: RasterOptions) -> Self {
        PageRasterizer { renderer, options }
    }

    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    /// Rasterizes a print copy of the section, leaving the live layout untouched.
    pub fn rasterize(
        &self,
        source: &dyn LayoutSource,
        section_id: &str,
    ) -> Result<RenderedPage, RasterizationFailure> {
        let layout = source
            .section_layout(section_id)
            .ok_or(RasterizationFailure::NotMounted)?;
        let scratch = ScratchLayout::new(section_id, layout, self.options.minimum_input_height);

        let raster = self
            .renderer
            .render_section_to_raster(&scratch.layout, &self.options)
            .map_err(RasterizationFailure::RenderFailed)?;
        if raster.image.width() == 0
            || raster.image.height() == 0
            || raster.logical_width <= 0.0
            || raster.logical_height <= 0.0
        {
            return Err(RasterizationFailure::ZeroDimensions);
        }

        let expected = (
            (raster.logical_width * self.options.scale).round() as u32,
            (raster.logical_height * self.options.scale).round() as u32,
        );
        let found = raster.image.dimensions();
        if expected != found {
            return Err(RasterizationFailure::Distorted { expected, found });
        }

        let mut flattened = RgbaImage::from_pixel(found.0, found.1, PAGE_BACKGROUND);
        imageops::overlay(&mut flattened, &raster.image, 0, 0);

        Ok(RenderedPage::new(section_id.to_string(), flattened))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::DocumentType,
        document::{DocumentModel, FieldValue},
        typeface::BlockTypeface,
    };

    struct TransparentRenderer {
        size: (u32, u32),
        logical: (f32, f32),
    }

    impl SectionRenderer for TransparentRenderer {
        fn render_section_to_raster(
            &self,
            _section: &LayoutNode,
            _options: &RasterOptions,
        ) -> Result<RasterImage, ContextError> {
            Ok(RasterImage {
                image: RgbaImage::new(self.size.0, self.size.1),
                logical_width: self.logical.0,
                logical_height: self.logical.1,
            })
        }
    }

    fn block_renderer() -> LayoutRenderer {
        LayoutRenderer::new(Box::new(BlockTypeface::default()))
    }

    #[test]
    fn pages_are_captured_at_the_fixed_width_and_scale() {
        let renderer = block_renderer();
        let rasterizer = PageRasterizer::new(&renderer, RasterOptions::default());
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();

        let page = rasterizer.rasterize(&model, "warranty-page-1").unwrap();
        assert_eq!(page.width(), 2048);
        assert_eq!(page.height() % 2, 0);
        assert!(page.height() > 2 * 2 * PAGE_PADDING as u32);
        assert_eq!(page.section_id(), "warranty-page-1");
    }

    #[test]
    fn background_is_forced_opaque() {
        let renderer = TransparentRenderer {
            size: (20, 10),
            logical: (10.0, 5.0),
        };
        let rasterizer = PageRasterizer::new(&renderer, RasterOptions::default());
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();

        let page = rasterizer.rasterize(&model, "warranty-page-1").unwrap();
        assert!(page.image().pixels().all(|pixel| pixel == &PAGE_BACKGROUND));
    }

    #[test]
    fn translucent_ink_is_flattened_onto_white() {
        struct TranslucentRenderer;

        impl SectionRenderer for TranslucentRenderer {
            fn render_section_to_raster(
                &self,
                _section: &LayoutNode,
                _options: &RasterOptions,
            ) -> Result<RasterImage, ContextError> {
                Ok(RasterImage {
                    image: RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 128])),
                    logical_width: 10.0,
                    logical_height: 5.0,
                })
            }
        }

        let rasterizer = PageRasterizer::new(&TranslucentRenderer, RasterOptions::default());
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();

        let page = rasterizer.rasterize(&model, "warranty-page-1").unwrap();
        for pixel in page.image().pixels() {
            assert_eq!(pixel[3], 255);
            assert!(pixel[0] > 100 && pixel[0] < 160);
            assert_eq!(pixel[0], pixel[2]);
        }
    }

    #[test]
    fn unusable_sections_are_reported() {
        let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        let options = RasterOptions::default();

        let renderer = block_renderer();
        let rasterizer = PageRasterizer::new(&renderer, options.clone());
        assert_eq!(
            rasterizer.rasterize(&model, "warranty-page-9").unwrap_err(),
            RasterizationFailure::NotMounted
        );

        let empty = TransparentRenderer {
            size: (0, 0),
            logical: (0.0, 0.0),
        };
        let rasterizer = PageRasterizer::new(&empty, options.clone());
        assert_eq!(
            rasterizer.rasterize(&model, "warranty-page-1").unwrap_err(),
            RasterizationFailure::ZeroDimensions
        );

        let stretched = TransparentRenderer {
            size: (20, 30),
            logical: (10.0, 10.0),
        };
        let rasterizer = PageRasterizer::new(&stretched, options);
        assert!(matches!(
            rasterizer.rasterize(&model, "warranty-page-1"),
            Err(RasterizationFailure::Distorted { .. })
        ));
    }

    #[test]
    fn longer_values_grow_the_page() {
        let renderer = block_renderer();
        let rasterizer = PageRasterizer::new(&renderer, RasterOptions::default());
        let mut model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();
        let before = rasterizer.rasterize(&model, "warranty-page-1").unwrap();

        // A paragraph long enough to wrap over several lines
        let mut descriptor = model.descriptor().clone();
        descriptor.sections[0]
            .paragraphs
            .push("word ".repeat(400));
        model = DocumentModel::new(descriptor).unwrap();
        model
            .set_field("projectAddress", FieldValue::Text("1 Main St".into()))
            .unwrap();
        let after = rasterizer.rasterize(&model, "warranty-page-1").unwrap();

        assert_eq!(before.width(), after.width());
        assert!(after.height() > before.height());
        assert!(after.aspect_ratio() < before.aspect_ratio());
    }

    #[test]
    fn text_is_wrapped_on_word_boundaries() {
        let typeface = BlockTypeface::default();
        // Every character is 5 pixels wide at a size of 10
        let lines = wrap_text(&typeface, "aaaa bbbb cccc", 10.0, 50.0);
        similar_asserts::assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);

        let lines = wrap_text(&typeface, "  averyveryverylongword  ", 10.0, 20.0);
        similar_asserts::assert_eq!(lines, vec!["averyveryverylongword"]);
        assert!(wrap_text(&typeface, "   ", 10.0, 20.0).is_empty());
    }
}
