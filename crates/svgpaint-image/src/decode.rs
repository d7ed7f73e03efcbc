//! Image decoding utilities
//!
//! Handles detection and decoding of the supported raster formats.

use image::{ImageFormat, RgbaImage};

use crate::{ImageError, ImageResult};

/// Detect image format from bytes
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Get MIME type for an image format
pub fn format_to_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Parse MIME type to image format
pub fn mime_to_format(mime: &str) -> Option<ImageFormat> {
    match mime.to_lowercase().as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some(ImageFormat::Ico),
        _ => None,
    }
}

/// Decode bytes into an RGBA raster.
///
/// The format is sniffed from the bytes first and falls back to the declared MIME type.
/// Animated formats yield their first frame.
pub fn decode_rgba(
    bytes: &[u8],
    content_type: Option<&str>,
    max_dimensions: (u32, u32),
) -> ImageResult<RgbaImage> {
    let format = detect_format(bytes)
        .or_else(|| content_type.and_then(mime_to_format))
        .ok_or_else(|| {
            ImageError::UnsupportedFormat(content_type.unwrap_or("unknown").to_string())
        })?;

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeError(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    if width > max_dimensions.0 || height > max_dimensions.1 {
        return Err(ImageError::TooLarge { width, height });
    }

    Ok(decoded.to_rgba8())
}
