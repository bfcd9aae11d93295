//! Image encoding: `DynamicImage` → baseline JPEG bytes.
//!
//! Rendered invoice pages are photographs of paper as far as the model is
//! concerned, and JPEG keeps multi-page uploads well under request size
//! limits. Alpha is dropped: JPEG has no alpha channel.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Encode a rasterised page as a baseline JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;

    debug!("Encoded {}x{} page → {} bytes JPEG", rgb.width(), rgb.height(), buf.len());
    Ok(buf)
}
