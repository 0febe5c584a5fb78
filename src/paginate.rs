use serde::{Deserialize, Serialize};

use crate::{error::ContextError, pdf::PdfDocument, raster::RenderedPage};

/// The size of a PDF page in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// Portrait A4.
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
    };
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::A4
    }
}

/// The blank space around the content of every page of a document, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    /// The same margin on every side.
    pub const fn uniform(margin: f32) -> Self {
        Margins {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
        }
    }

    /// The width and height of the area left for the content on a page of the given geometry.
    pub fn content_size(&self, geometry: &PageGeometry) -> [f32; 2] {
        [
            geometry.width - self.left - self.right,
            geometry.height - self.top - self.bottom,
        ]
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::uniform(15.0)
    }
}

/// Where an image lands on a page, in millimeters from the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Computes the placement of an image of the given pixel size on one page.
///
/// The image is scaled so that its width fills the content width. When the resulting height
/// would overflow the content height, the image is instead shrunk uniformly to the content
/// height and centered horizontally. The aspect ratio of the source is always preserved and
/// the image is never cropped.
pub fn place_on_page(
    pixel_width: u32,
    pixel_height: u32,
    geometry: &PageGeometry,
    margins: &Margins,
) -> Result<Placement, ContextError> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(ContextError::with_context(format!(
            "Unable to place an image of {}x{} pixels",
            pixel_width, pixel_height
        )));
    }
    let [content_width, content_height] = margins.content_size(geometry);
    if content_width <= 0.0 || content_height <= 0.0 {
        return Err(ContextError::with_context(format!(
            "The margins {:?} leave no room for content on a page of {:?}",
            margins, geometry
        )));
    }

    let aspect_ratio = pixel_width as f32 / pixel_height as f32;
    let mut width = content_width;
    let mut height = width / aspect_ratio;
    if height > content_height {
        height = content_height;
        width = height * aspect_ratio;
    }

    Ok(Placement {
        x: margins.left + (content_width - width) / 2.0,
        y: margins.top,
        width,
        height,
    })
}

/// Lays rendered pages out onto a PDF document, one rendered page per PDF page.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub geometry: PageGeometry,
    pub margins: Margins,
}

impl Paginator {
    pub fn new(geometry: PageGeometry, margins: Margins) -> Self {
        Paginator { geometry, margins }
    }

    /// Places every rendered page, in order, on its own page of a new PDF document.
    /// The first page is placed on the first PDF page and every following one opens a new page.
    pub fn assemble(
        &self,
        rendered_pages: &[RenderedPage],
        document_identifier: String,
    ) -> Result<PdfDocument, ContextError> {
        if rendered_pages.is_empty() {
            return Err(ContextError::with_context(
                "Unable to assemble a document without any page",
            ));
        }

        let mut pdf_document = PdfDocument::new(document_identifier);
        for rendered_page in rendered_pages {
            let placement = place_on_page(
                rendered_page.width(),
                rendered_page.height(),
                &self.geometry,
                &self.margins,
            )
            .map_err(|error| {
                ContextError::with_error(
                    format!("Unable to place the section {:?}", rendered_page.section_id()),
                    &error,
                )
            })?;
            log::debug!(
                "Placing the section {:?} at {:?}",
                rendered_page.section_id(),
                placement
            );

            let (page_index, layer_index) =
                pdf_document.add_page_with_layer(self.geometry.width, self.geometry.height);
            let image_reference = pdf_document.add_image(rendered_page.image())?;
            pdf_document.place_image_on_layer_in_page(
                page_index,
                layer_index,
                &image_reference,
                placement,
            )?;
        }

        Ok(pdf_document)
    }
}
