//! Preview thumbnails as PNG data URLs.

use base64::{Engine as _, engine::general_purpose};
use cutout_pipeline::resample::thumbnail;
use cutout_pipeline::{Frame, ResampleFilter};
use image::ImageEncoder as _;

use crate::error::HostError;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode `frame` as a `data:image/png;base64,...` URL no larger than
/// `max_edge` pixels on either axis.
///
/// # Errors
///
/// Returns [`HostError::Preview`] if PNG encoding fails.
pub fn encode_preview(frame: &Frame, max_edge: u32) -> Result<String, HostError> {
    let rgba = thumbnail(frame, max_edge, ResampleFilter::Lanczos3);

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        &mut png_bytes,
        image::codecs::png::CompressionType::Best,
        image::codecs::png::FilterType::Adaptive,
    );
    encoder.write_image(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(format!(
        "{DATA_URL_PREFIX}{}",
        general_purpose::STANDARD.encode(&png_bytes)
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cutout_pipeline::types::Rgb32FImage;

    use super::*;

    fn decode(url: &str) -> image::DynamicImage {
        let payload = url.strip_prefix(DATA_URL_PREFIX).unwrap();
        let bytes = general_purpose::STANDARD.decode(payload).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn large_frame_is_scaled_to_fit() {
        let frame = Frame::Rgb(Rgb32FImage::from_pixel(2048, 1024, image::Rgb([0.5; 3])));
        let url = encode_preview(&frame, 1024).unwrap();
        let decoded = decode(&url);
        assert_eq!((decoded.width(), decoded.height()), (1024, 512));
    }

    #[test]
    fn small_frame_keeps_size_and_color() {
        let frame = Frame::Rgb(Rgb32FImage::from_pixel(8, 6, image::Rgb([1.0, 0.0, 0.0])));
        let url = encode_preview(&frame, 1024).unwrap();
        let decoded = decode(&url).to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.get_pixel(3, 3).0, [255, 0, 0, 255]);
    }
}
