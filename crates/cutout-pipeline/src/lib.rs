//! cutout-pipeline: Pure mask rasterization and compositing (sans-IO).
//!
//! Turns a user-drawn outline into a cut-out image batch through:
//! polygon -> supersampled coverage -> optional feathering -> image grid
//! -> background fill -> optional auto-crop.
//!
//! A second entry point, [`border::crop_with_border`], takes a precomputed
//! mask and surrounds the cut-out with a solid ring.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! frames and masks and returns structured data. Sessions, UI messaging
//! and file handling live in `cutout-host` and the `cutout` binary.

pub mod blur;
pub mod border;
pub mod composite;
pub mod crop;
pub mod morphology;
pub mod raster;
pub mod resample;
pub mod types;

pub use border::crop_with_border;
pub use composite::{apply_fill, composite_batch};
pub use raster::{RasterConfig, polygon_mask, rasterize};
pub use resample::ResampleFilter;
pub use types::{
    BorderColor, BorderParams, CropMode, CropParams, CropPolicy, CropResult, Dimensions,
    FillPolicy, Frame, ImageBatch, Mask, MaskBatch, PipelineError, Point, Polygon,
};

/// Cut an image batch along a polygon drawn on a UI canvas.
///
/// # Pipeline steps
///
/// 1. Clamp parameters into their accepted ranges
/// 2. Rasterize the polygon at canvas resolution (supersampled)
/// 3. Feather the edge by `edge_smooth`
/// 4. Resample the mask onto the image grid
/// 5. Composite every frame with the shared mask
/// 6. Optional auto-crop to the selection
///
/// # Errors
///
/// Returns [`PipelineError::InsufficientPoints`] for fewer than three
/// vertices and [`PipelineError::EmptyCanvas`] for a zero-area canvas.
pub fn polygon_crop(
    batch: &ImageBatch,
    polygon: &Polygon,
    canvas: Dimensions,
    params: &CropParams,
    config: &RasterConfig,
) -> Result<CropResult, PipelineError> {
    let params = params.clamped();
    let mask = polygon_mask(
        polygon,
        canvas,
        batch.dimensions(),
        params.edge_smooth,
        config,
    )?;
    composite_batch(
        batch,
        &MaskBatch::single(mask),
        params.background_fill,
        params.crop_policy(),
    )
}
