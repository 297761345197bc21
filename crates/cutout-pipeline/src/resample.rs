//! Resampling of masks and preview thumbnails.
//!
//! Masks move between three pixel grids: the supersampled raster grid,
//! the UI canvas grid the user drew on, and the image's own grid.
//! Supersampled coverage is reduced with an exact block average; every
//! other change of grid goes through a configurable `image` filter.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Frame, Mask};

/// Resampling filter used when changing a mask's pixel grid.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Reduce a supersampled coverage buffer by `factor` on both axes.
///
/// Each output pixel is the mean of its `factor × factor` source block,
/// which is the exact area coverage of that pixel. `coverage` is row-major
/// 8-bit coverage of size `target * factor`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn block_average(coverage: &[u8], target: Dimensions, factor: u32) -> Mask {
    let factor = factor.max(1) as usize;
    let src_width = target.width as usize * factor;
    let scale = 1.0 / (255.0 * (factor * factor) as f32);

    Mask::from_fn(target.width, target.height, |x, y| {
        let (x0, y0) = (x as usize * factor, y as usize * factor);
        let sum: u32 = (y0..y0 + factor)
            .map(|sy| {
                let row = &coverage[sy * src_width + x0..sy * src_width + x0 + factor];
                row.iter().map(|&v| u32::from(v)).sum::<u32>()
            })
            .sum();
        image::Luma([sum as f32 * scale])
    })
}

/// Resample a mask onto a `target` grid, clamping the result to `[0, 1]`.
///
/// Returns a copy when the mask is already the right size.
#[must_use]
pub fn resize_mask(mask: &Mask, target: Dimensions, filter: ResampleFilter) -> Mask {
    if (mask.width(), mask.height()) == (target.width, target.height) {
        return mask.clone();
    }
    let mut resized = image::imageops::resize(
        mask,
        target.width,
        target.height,
        filter.to_image_filter(),
    );
    for pixel in resized.pixels_mut() {
        pixel.0[0] = pixel.0[0].clamp(0.0, 1.0);
    }
    resized
}

/// Size that fits `source` within `max_edge × max_edge`, keeping aspect.
///
/// Sources already within bounds are returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(source: Dimensions, max_edge: u32) -> Dimensions {
    let long_axis = source.width.max(source.height);
    if long_axis <= max_edge || long_axis == 0 {
        return source;
    }
    let scale = f64::from(max_edge) / f64::from(long_axis);
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    Dimensions::new(scaled(source.width), scaled(source.height))
}

/// 8-bit RGBA thumbnail of a frame no larger than `max_edge` per axis.
#[must_use]
pub fn thumbnail(frame: &Frame, max_edge: u32, filter: ResampleFilter) -> RgbaImage {
    let rgba = frame.to_dynamic().to_rgba8();
    let target = fit_within(frame.dimensions(), max_edge);
    if target == frame.dimensions() {
        return rgba;
    }
    image::imageops::resize(&rgba, target.width, target.height, filter.to_image_filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rgb32FImage, filled_mask};

    #[test]
    fn default_filter_is_lanczos3() {
        assert_eq!(ResampleFilter::default(), ResampleFilter::Lanczos3);
    }

    #[test]
    fn block_average_is_exact_coverage() {
        // 2x2 target at factor 2: top-left block fully covered, top-right
        // half covered, bottom row empty.
        let coverage: Vec<u8> = vec![
            255, 255, 255, 0, //
            255, 255, 255, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ];
        let mask = block_average(&coverage, Dimensions::new(2, 2), 2);
        assert!((mask.get_pixel(0, 0).0[0] - 1.0).abs() < 1e-6);
        assert!((mask.get_pixel(1, 0).0[0] - 0.5).abs() < 1e-6);
        assert!(mask.get_pixel(0, 1).0[0].abs() < 1e-6);
    }

    #[test]
    fn resize_mask_same_size_is_identity() {
        let mask = filled_mask(Dimensions::new(5, 3), 0.4);
        assert_eq!(resize_mask(&mask, Dimensions::new(5, 3), ResampleFilter::Lanczos3), mask);
    }

    #[test]
    fn resize_mask_stays_in_unit_range() {
        // A hard step rings under Lanczos; clamping keeps it in range.
        let mask = Mask::from_fn(16, 16, |x, _| image::Luma([if x < 8 { 0.0 } else { 1.0 }]));
        let resized = resize_mask(&mask, Dimensions::new(37, 37), ResampleFilter::Lanczos3);
        assert_eq!(resized.dimensions(), (37, 37));
        assert!(resized.pixels().all(|p| (0.0..=1.0).contains(&p.0[0])));
    }

    #[test]
    fn fit_within_landscape() {
        assert_eq!(
            fit_within(Dimensions::new(2048, 1536), 1024),
            Dimensions::new(1024, 768)
        );
    }

    #[test]
    fn fit_within_leaves_small_images() {
        assert_eq!(
            fit_within(Dimensions::new(640, 480), 1024),
            Dimensions::new(640, 480)
        );
    }

    #[test]
    fn thumbnail_fits_bounds() {
        let frame = Frame::Rgb(Rgb32FImage::new(300, 100));
        let thumb = thumbnail(&frame, 64, ResampleFilter::Triangle);
        assert_eq!(thumb.dimensions(), (64, 21));
    }
}
