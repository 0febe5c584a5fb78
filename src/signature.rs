use std::io::Cursor;

use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// The prefix of every PNG data URL produced by this crate.
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
/// The data URL a browser produces for a canvas without any pixel, treated as no signature.
pub const BLANK_DATA_URL: &str = "data:,";

/// How a signature image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureMode {
    /// Freehand strokes on the capture surface.
    Drawn,
    /// Typed text rendered in a cursive typeface.
    Typed,
}

/// Which of the two adopted marks a signature field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkKind {
    Signature,
    Initials,
}

/// A PNG-encoded raster of a handwritten mark or of a typed signature.
///
/// The empty signature is a sentinel, it carries no bytes and zero dimensions and has
/// to be treated as absent everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    width: u32,
    height: u32,
    png_bytes: Vec<u8>,
    mode: SignatureMode,
}

impl SignatureImage {
    /// The sentinel reported when a surface is cleared.
    pub fn empty() -> Self {
        SignatureImage {
            width: 0,
            height: 0,
            png_bytes: Vec::new(),
            mode: SignatureMode::Drawn,
        }
    }

    /// Encodes the given raster as a PNG signature.
    pub fn from_rgba(image: &RgbaImage, mode: SignatureMode) -> Result<Self, ContextError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(SignatureImage::empty());
        }

        let mut png_bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|error| ContextError::with_error("Failed to encode the signature", &error))?;

        Ok(SignatureImage {
            width: image.width(),
            height: image.height(),
            png_bytes,
            mode,
        })
    }

    /// Builds a signature from a PNG the caller has just encoded with known dimensions.
    pub(crate) fn from_encoded_parts(
        width: u32,
        height: u32,
        png_bytes: Vec<u8>,
        mode: SignatureMode,
    ) -> Self {
        if png_bytes.is_empty() {
            return SignatureImage::empty();
        }

        SignatureImage {
            width,
            height,
            png_bytes,
            mode,
        }
    }

    /// Wraps already encoded PNG bytes, an empty buffer yields the sentinel.
    pub fn from_png(png_bytes: Vec<u8>, mode: SignatureMode) -> Result<Self, ContextError> {
        if png_bytes.is_empty() {
            return Ok(SignatureImage::empty());
        }

        let image = image::load_from_memory_with_format(&png_bytes, ImageFormat::Png)
            .map_err(|error| ContextError::with_error("Failed to decode the signature", &error))?;

        Ok(SignatureImage {
            width: image.width(),
            height: image.height(),
            png_bytes,
            mode,
        })
    }

    /// Parses a PNG data URL, both the empty string and `data:,` give the sentinel.
    pub fn from_data_url(data_url: &str, mode: SignatureMode) -> Result<Self, ContextError> {
        let data_url = data_url.trim();
        if data_url.is_empty() || data_url == BLANK_DATA_URL {
            return Ok(SignatureImage::empty());
        }

        let encoded = data_url.strip_prefix(PNG_DATA_URL_PREFIX).ok_or_else(|| {
            ContextError::with_context(format!(
                "Unsupported signature data URL, expected the prefix {:?}",
                PNG_DATA_URL_PREFIX
            ))
        })?;
        let png_bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|error| {
                ContextError::with_error("Failed to decode the signature data URL", &error)
            })?;

        SignatureImage::from_png(png_bytes, mode)
    }

    /// Encodes the signature as a data URL, the sentinel becomes `data:,`.
    pub fn to_data_url(&self) -> String {
        if self.is_empty() {
            return BLANK_DATA_URL.to_string();
        }

        format!(
            "{}{}",
            PNG_DATA_URL_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(&self.png_bytes)
        )
    }

    /// Decodes the signature back into a raster, the sentinel has no raster.
    pub fn to_rgba(&self) -> Result<Option<RgbaImage>, ContextError> {
        if self.is_empty() {
            return Ok(None);
        }

        let image = image::load_from_memory_with_format(&self.png_bytes, ImageFormat::Png)
            .map_err(|error| ContextError::with_error("Failed to decode the signature", &error))?;

        Ok(Some(image.to_rgba8()))
    }

    pub fn is_empty(&self) -> bool {
        self.png_bytes.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png_bytes
    }

    pub fn mode(&self) -> SignatureMode {
        self.mode
    }
}

impl Default for SignatureImage {
    fn default() -> Self {
        SignatureImage::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn mark() -> RgbaImage {
        let mut image = RgbaImage::new(8, 4);
        image.put_pixel(2, 1, Rgba([0, 0, 0, 255]));
        image
    }

    #[test]
    fn blank_data_urls_are_the_sentinel() {
        for data_url in ["", "data:,", "  data:,  "] {
            let signature = SignatureImage::from_data_url(data_url, SignatureMode::Drawn).unwrap();
            assert!(signature.is_empty());
            assert_eq!(signature, SignatureImage::empty());
        }
        assert_eq!(SignatureImage::empty().to_data_url(), BLANK_DATA_URL);
    }

    #[test]
    fn data_url_keeps_the_png_bytes() {
        let signature = SignatureImage::from_rgba(&mark(), SignatureMode::Typed).unwrap();
        let data_url = signature.to_data_url();
        assert!(data_url.starts_with(PNG_DATA_URL_PREFIX));

        let parsed = SignatureImage::from_data_url(&data_url, SignatureMode::Typed).unwrap();
        assert_eq!(parsed.png_bytes(), signature.png_bytes());
        assert_eq!((parsed.width(), parsed.height()), (8, 4));
    }

    #[test]
    fn foreign_data_urls_are_rejected() {
        let result = SignatureImage::from_data_url("data:image/jpeg;base64,AAAA", SignatureMode::Drawn);
        assert!(result.is_err());
    }

    #[test]
    fn zero_sized_raster_is_the_sentinel() {
        let signature =
            SignatureImage::from_rgba(&RgbaImage::new(0, 0), SignatureMode::Drawn).unwrap();
        assert!(signature.is_empty());
        assert!(signature.to_rgba().unwrap().is_none());
    }
}
