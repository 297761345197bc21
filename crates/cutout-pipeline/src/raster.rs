//! Polygon rasterization into an anti-aliased coverage mask.
//!
//! The outline is filled at `supersample ×` the canvas resolution with
//! `tiny-skia`, reduced back to the canvas with an exact block average,
//! optionally feathered, and finally resampled onto the image's own pixel
//! grid when the UI canvas and the image differ in size.

use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, PathBuilder, Transform};

use crate::blur::smooth_mask;
use crate::resample::{ResampleFilter, block_average, resize_mask};
use crate::types::{Dimensions, Mask, PipelineError, Polygon, filled_mask};

/// Rasterizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Supersampling factor per axis. Edge pixels get `supersample²`
    /// levels of coverage.
    pub supersample: u32,
    /// Filter for mapping the canvas-space mask onto the image grid.
    pub filter: ResampleFilter,
}

impl RasterConfig {
    /// Default supersampling factor.
    pub const DEFAULT_SUPERSAMPLE: u32 = 4;
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            supersample: Self::DEFAULT_SUPERSAMPLE,
            filter: ResampleFilter::Lanczos3,
        }
    }
}

/// Rasterize `polygon` into a mask at `canvas` resolution.
///
/// Coordinates are in canvas pixels; vertices off the canvas are not
/// clamped, the covered area simply ends at the canvas edge. Interior is
/// decided by the even-odd rule, so self-intersecting freehand strokes
/// leave their doubly-enclosed lobes empty. When `smooth > 0` the edge is
/// feathered by a Gaussian of sigma `smooth / 2`.
///
/// # Errors
///
/// Returns [`PipelineError::InsufficientPoints`] for fewer than three
/// vertices, [`PipelineError::EmptyCanvas`] for a zero-area canvas, and
/// [`PipelineError::InvalidConfig`] when the supersampled canvas is too
/// large to allocate.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn rasterize(
    polygon: &Polygon,
    canvas: Dimensions,
    smooth: u32,
    config: &RasterConfig,
) -> Result<Mask, PipelineError> {
    if polygon.len() < Polygon::MIN_POINTS {
        return Err(PipelineError::InsufficientPoints {
            count: polygon.len(),
        });
    }
    if canvas.is_empty() {
        return Err(PipelineError::EmptyCanvas);
    }

    let factor = config.supersample.max(1);
    let oversized = || {
        PipelineError::InvalidConfig(format!(
            "canvas {canvas} at {factor}x supersampling is too large"
        ))
    };
    let hi_width = canvas.width.checked_mul(factor).ok_or_else(oversized)?;
    let hi_height = canvas.height.checked_mul(factor).ok_or_else(oversized)?;
    let mut coverage = tiny_skia::Mask::new(hi_width, hi_height).ok_or_else(oversized)?;

    let points = polygon.points();
    let mut pb = PathBuilder::new();
    pb.move_to(points[0].x as f32, points[0].y as f32);
    for p in &points[1..] {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();

    let Some(path) = pb.finish() else {
        // Every vertex on one spot or line: nothing is enclosed.
        tracing::debug!(points = polygon.len(), "degenerate polygon encloses no area");
        return Ok(filled_mask(canvas, 0.0));
    };

    let scale = factor as f32;
    coverage.fill_path(
        &path,
        FillRule::EvenOdd,
        true,
        Transform::from_scale(scale, scale),
    );

    let mask = block_average(coverage.data(), canvas, factor);
    Ok(smooth_mask(&mask, smooth))
}

/// Rasterize `polygon` drawn on a `canvas`-sized UI surface into a mask
/// that lines up with an image of size `image`.
///
/// # Errors
///
/// See [`rasterize`].
pub fn polygon_mask(
    polygon: &Polygon,
    canvas: Dimensions,
    image: Dimensions,
    smooth: u32,
    config: &RasterConfig,
) -> Result<Mask, PipelineError> {
    if image.is_empty() {
        return Err(PipelineError::EmptyCanvas);
    }
    let mask = rasterize(polygon, canvas, smooth, config)?;
    Ok(resize_mask(&mask, image, config.filter))
}
