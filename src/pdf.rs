use image::RgbaImage;
use lopdf::Object;
use std::{collections::BTreeMap, io::BufWriter, io::Write as _, mem};
use time::OffsetDateTime;

use crate::{error::ContextError, paginate::Placement};

/// One layer of PDF data. It can be converted into a `lopdf::Stream` by calling `TryInto<lopdf::Stream>::try_into`.
#[derive(Debug, Clone, Default)]
pub struct PdfLayer {
    /// Stream objects in this layer. Usually, one layer equals to one stream.
    pub(crate) operations: Vec<lopdf::content::Operation>,
}

impl TryFrom<PdfLayer> for lopdf::Stream {
    type Error = ContextError;

    fn try_from(value: PdfLayer) -> Result<Self, Self::Error> {
        // Construct the stream content from the actual underlying operations of the layer
        let stream_content = lopdf::content::Content {
            operations: value.operations,
        };
        let encoded_content = stream_content.encode().map_err(|error| {
            ContextError::with_error("Failed to encode PDF layer content", &error)
        })?;

        Ok(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content))
    }
}

/// The low-level image representation for a PDF document: 8-bit RGB samples, with the
/// alpha channel split off into a soft mask when the image is not fully opaque.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Width of the image in pixels.
    pub width: u32,
    /// Height of the image in pixels.
    pub height: u32,
    /// Should the image be interpolated when scaled?
    pub interpolate: bool,
    /// The zlib-compressed RGB samples, row by row from the top.
    pub compressed_rgb: Vec<u8>,
    /// The zlib-compressed alpha samples, if `None` the image is opaque.
    pub compressed_alpha: Option<Vec<u8>>,
}

/// The number of samples of an image with the given number of channels per pixel.
fn sample_count(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

impl ImageXObject {
    /// Splits the raster into its color and alpha planes and compresses both.
    pub fn from_rgba(image: &RgbaImage) -> Result<Self, ContextError> {
        let (width, height) = image.dimensions();
        let mut rgb_samples = Vec::with_capacity(sample_count(width, height, 3));
        let mut alpha_samples = Vec::with_capacity(sample_count(width, height, 1));
        for pixel in image.pixels() {
            let [red, green, blue, alpha] = pixel.0;
            rgb_samples.extend_from_slice(&[red, green, blue]);
            alpha_samples.push(alpha);
        }

        let compressed_rgb = compress_samples(&rgb_samples)?;
        // The soft mask is only worth embedding when some pixel is see-through
        let compressed_alpha = if alpha_samples.iter().all(|&alpha| alpha == u8::MAX) {
            None
        } else {
            Some(compress_samples(&alpha_samples)?)
        };

        Ok(ImageXObject {
            width,
            height,
            interpolate: true,
            compressed_rgb,
            compressed_alpha,
        })
    }

    /// Inserts the image (and its soft mask, if any) into the document and returns the reference to it.
    fn insert_into_document(&self, inner_document: &mut lopdf::Document) -> lopdf::ObjectId {
        let mut image_dictionary = lopdf::Dictionary::from_iter(vec![
            ("Type", Object::Name("XObject".into())),
            ("Subtype", Object::Name("Image".into())),
            ("Width", Object::Integer(self.width as i64)),
            ("Height", Object::Integer(self.height as i64)),
            ("ColorSpace", Object::Name("DeviceRGB".into())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Interpolate", Object::Boolean(self.interpolate)),
            ("Filter", Object::Name("FlateDecode".into())),
        ]);

        if let Some(compressed_alpha) = &self.compressed_alpha {
            let soft_mask_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Object::Name("XObject".into())),
                ("Subtype", Object::Name("Image".into())),
                ("Width", Object::Integer(self.width as i64)),
                ("Height", Object::Integer(self.height as i64)),
                ("ColorSpace", Object::Name("DeviceGray".into())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name("FlateDecode".into())),
            ]);
            let soft_mask_id = inner_document.add_object(
                lopdf::Stream::new(soft_mask_dictionary, compressed_alpha.clone())
                    .with_compression(false), // Already compressed
            );
            image_dictionary.set("SMask", Object::Reference(soft_mask_id));
        }

        inner_document.add_object(
            lopdf::Stream::new(image_dictionary, self.compressed_rgb.clone())
                .with_compression(false),
        )
    }
}

/// Compresses raw image samples so that they can be decoded with the `FlateDecode` filter.
fn compress_samples(samples: &[u8]) -> Result<Vec<u8>, ContextError> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(samples)
        .map_err(|error| ContextError::with_error("Failed to compress the image samples", &error))?;
    encoder
        .finish()
        .map_err(|error| ContextError::with_error("Failed to compress the image samples", &error))
}

/// `XObject`s are parts of the PDF specification. They allow for complex behavior to be
/// inserted into the PDF document: this comprises bookmarks, annotations and even images.
/// The implementation is only partial as it allows only for images.
#[derive(Debug, Clone)]
pub enum XObject {
    Image(ImageXObject),
}

/// Named reference to an `XObject`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct XObjectReference(String);

impl XObjectReference {
    /// Creates a new reference for an `XObject` from a number.
    pub fn new(index: usize) -> Self {
        Self(format!("X{index}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// The association between the `XObject`s names and the actual `XObject`s themselves.
#[derive(Default, Debug, Clone)]
pub struct XObjectMap(BTreeMap<String, XObject>);

impl XObjectMap {
    /// Inserts the `XObject`s into the document, simultaneously constructing a PDF dictionary of them.
    pub fn into_with_document(&self, document: &mut lopdf::Document) -> lopdf::Dictionary {
        self.0
            .iter()
            .map(|(name, object)| {
                let object_reference = match object {
                    XObject::Image(image) => image.insert_into_document(document),
                };
                (name.clone(), Object::Reference(object_reference))
            })
            .collect()
    }

    fn insert(&mut self, reference: &XObjectReference, object: XObject) {
        self.0.insert(reference.0.clone(), object);
    }

    fn contains(&self, reference: &XObjectReference) -> bool {
        self.0.contains_key(&reference.0)
    }
}

/// The representation of a PDF page. Utility functions are implemented for this struct
/// so that its content can be inserted into the underlying PDF document.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// Page layers.
    pub layers: Vec<PdfLayer>,
    /// External graphics objects drawn on this page.
    pub(crate) xobjects: XObjectMap,
}

impl PdfPage {
    /// Inserts the resources of the page into the document and merges all its layers
    /// into a single content stream, each one isolated in its own graphics state.
    fn collect_resources_and_content(
        &self,
        inner_document: &mut lopdf::Document,
    ) -> Result<(lopdf::Dictionary, lopdf::Stream), ContextError> {
        use lopdf::content::Operation;

        let mut resource_dictionary = lopdf::Dictionary::new();
        let xobjects_dictionary = self.xobjects.into_with_document(inner_document);
        if !xobjects_dictionary.is_empty() {
            resource_dictionary.set("XObject", Object::Dictionary(xobjects_dictionary));
        }

        let mut merged_content = Vec::<u8>::new();
        for layer in &self.layers {
            // In the PDF specification the q/Q operators delimit an isolated graphics state block
            let mut isolated_layer = PdfLayer::default();
            isolated_layer.operations.push(Operation::new("q", vec![]));
            isolated_layer
                .operations
                .extend(layer.operations.iter().cloned());
            isolated_layer.operations.push(Operation::new("Q", vec![]));

            let mut layer_stream: lopdf::Stream = isolated_layer.try_into()?;
            merged_content.append(&mut layer_stream.content);
        }

        Ok((
            resource_dictionary,
            lopdf::Stream::new(lopdf::Dictionary::new(), merged_content),
        ))
    }
}

/// Converts millimeters to points. This function is used in order to present the data
/// in the format required by the PDF specification, while the end user might want to work in
/// millimeters which are easier to reason about.
pub fn millimeters_to_points(millimeters: f32) -> f32 {
    millimeters * 2.834646
}

/// This struct represents the actual PDF document on a high-level. It is an interface to the actual underlying
/// `lopdf::Document` with the addition of the PDF pages and the document ID.
///
/// The pages only ever carry raster images: `add_page_with_layer`, `add_image` and
/// `place_image_on_layer_in_page` are all it takes to lay out a document of scanned sections.
pub struct PdfDocument {
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The pages of the PDF document.
    pub(crate) pages: Vec<PdfPage>,
    /// The images added so far, not yet attached to a page.
    images: Vec<ImageXObject>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Adds a page of given width and height in millimeters with an empty layer for contents to be added to.
    /// The function returns the index of the page and of the layer in the page, these are to be passed
    /// to the other functions when calling them, such as to `place_image_on_layer_in_page`.
    pub fn add_page_with_layer(&mut self, page_width: f32, page_height: f32) -> (usize, usize) {
        let pdf_page = PdfPage {
            // Convert millimeters to points because this is what `lopdf` expects
            width: millimeters_to_points(page_width),
            height: millimeters_to_points(page_height),
            layers: vec![PdfLayer::default()],
            xobjects: XObjectMap::default(),
        };
        self.pages.push(pdf_page);

        (self.pages.len() - 1, 0)
    }

    /// Adds a raster image to the document, returning the reference needed to place it on a page.
    pub fn add_image(&mut self, image: &RgbaImage) -> Result<XObjectReference, ContextError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ContextError::with_context(
                "Unable to embed an image without any pixel",
            ));
        }

        self.images.push(ImageXObject::from_rgba(image)?);
        Ok(XObjectReference::new(self.images.len() - 1))
    }

    /// Draws a previously added image into the rectangle given by the placement, which is
    /// expressed in millimeters from the top-left corner of the page.
    pub fn place_image_on_layer_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        image_reference: &XObjectReference,
        placement: Placement,
    ) -> Result<(), ContextError> {
        use lopdf::content::Operation;

        let image_index = image_reference
            .0
            .trim_start_matches('X')
            .parse::<usize>()
            .ok()
            .filter(|index| *index < self.images.len())
            .ok_or_else(|| {
                ContextError::with_context(format!(
                    "Failed to find the image {:?} into the document",
                    image_reference
                ))
            })?;
        let image = self.images[image_index].clone();

        let pdf_page = self.get_mut_page(page_index)?;
        // The PDF coordinate system has its origin in the bottom-left corner of the page
        let width = millimeters_to_points(placement.width);
        let height = millimeters_to_points(placement.height);
        let x = millimeters_to_points(placement.x);
        let y = pdf_page.height - millimeters_to_points(placement.y) - height;
        if !pdf_page.xobjects.contains(image_reference) {
            pdf_page
                .xobjects
                .insert(image_reference, XObject::Image(image));
        }

        let pdf_layer = pdf_page
            .layers
            .get_mut(layer_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the layer with index {}",
                layer_index
            )))?;
        // Scale the unit square of the image space to the placement rectangle, then paint the image
        pdf_layer.operations.extend(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image_reference.0.clone().into())]),
            Operation::new("Q", vec![]),
        ]);

        Ok(())
    }

    /// Write the operations so far specified to the PDF file and finalize it.
    /// One mandatory argument needed by the PDF specification is the instance ID, which needs to be a
    /// 32 characters-long string.
    pub fn write_all(&mut self, instance_id: String, title: &str) -> Result<(), ContextError> {
        use lopdf::StringFormat::Literal;

        let creation_date = to_pdf_timestamp_format(&OffsetDateTime::now_utc());
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            (
                "CreationDate",
                Object::String(creation_date.clone().into_bytes(), Literal),
            ),
            ("ModDate", Object::String(creation_date.into_bytes(), Literal)),
            ("Title", Object::String(title.as_bytes().to_vec(), Literal)),
            (
                "Producer",
                Object::String(
                    concat!("contractr ", env!("CARGO_PKG_VERSION"))
                        .as_bytes()
                        .to_vec(),
                    Literal,
                ),
            ),
            (
                "Identifier",
                Object::String(self.identifier.clone().into_bytes(), Literal),
            ),
        ]);
        let document_info_id = self
            .inner_document
            .add_object(Object::Dictionary(document_info));

        // Construct the catalog, required by the PDF specification
        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Object::Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Object::Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Object::Array(vec![
                Object::String(self.identifier.clone().into_bytes(), Literal),
                Object::String(instance_id.into_bytes(), Literal),
            ]),
        );

        let mut page_ids = Vec::<Object>::new();
        for page in &self.pages {
            let media_box: Object = vec![
                0.into(),
                0.into(),
                page.width.into(),
                page.height.into(),
            ]
            .into();
            let mut page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Object::Integer(0)),
                ("MediaBox", media_box.clone()),
                ("TrimBox", media_box.clone()),
                ("CropBox", media_box),
                ("Parent", Object::Reference(pages_id)),
            ]);

            let (resource_dictionary, content_stream) =
                page.collect_resources_and_content(&mut self.inner_document)?;
            let resources_id = self
                .inner_document
                .add_object(Object::Dictionary(resource_dictionary));
            page_dictionary.set("Resources", Object::Reference(resources_id));
            let content_id = self.inner_document.add_object(content_stream);
            page_dictionary.set("Contents", Object::Reference(content_id));

            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Object::Reference(page_id));
        }

        // Use all the collected page references in order to set the "Kids" field of the pages dictionary
        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Object::Integer(self.pages.len() as i64)),
            ("Kids", Object::Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Object::Dictionary(pages));

        Ok(())
    }

    /// Optimize the PDF document (only superficially).
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.delete_zero_length_streams();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn get_mut_page(&mut self, page_index: usize) -> Result<&mut PdfPage, ContextError> {
        self.pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))
    }
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
