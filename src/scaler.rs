//! Thumbnail scaler.
//!
//! Every thumbnail has exactly the configured dimensions: the source is
//! stretched, never letterboxed or cropped.

use crate::{Backend, Error, Result, ThumbnailSize};
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
}

/// Stretch an already decoded image to `size` and encode it as JPEG.
pub fn scale_decoded(img: &DynamicImage, size: ThumbnailSize, quality: u8) -> Result<Thumbnail> {
    let resized = img.resize_exact(size.width, size.height, FilterType::Triangle);
    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| Error::ImageDecodeError(format!("JPEG encode failed: {}", e)))?;

    Ok(Thumbnail {
        width: rgb.width(),
        height: rgb.height(),
        data_url: format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&jpeg)
        ),
    })
}

pub fn scale_image_bytes(bytes: &[u8], size: ThumbnailSize, quality: u8) -> Result<Thumbnail> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::ImageDecodeError(format!("Failed to load image: {}", e)))?;
    scale_decoded(&img, size, quality)
}

/// Load `url` through the backend and thumbnail it. No retry.
pub fn scale_image<B: Backend + ?Sized>(
    backend: &B,
    url: &str,
    size: ThumbnailSize,
    quality: u8,
) -> Result<Thumbnail> {
    let bytes = backend.fetch_bytes(url)?;
    scale_image_bytes(&bytes, size, quality)
}

/// Decode the payload of a `data:<mime>;base64,` URL.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| Error::ParseError("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::ParseError("data URL without payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::ParseError("only base64 data URLs are supported".into()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::ParseError(format!("bad base64 payload: {}", e)))?;
    Ok((mime.to_string(), bytes))
}
