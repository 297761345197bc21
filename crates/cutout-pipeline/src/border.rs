//! Border compositing around a precomputed mask.
//!
//! For each batch item the mask is grown by a disk of `border_width`
//! pixels. The grown area minus the mask is the ring. The ring is painted
//! in the border color on a transparent canvas and the masked object is
//! composited over it with Porter-Duff "over". Output frames are always
//! RGBA with straight alpha.

use crate::composite::with_alpha;
use crate::crop::{NONZERO_THRESHOLD, crop_box};
use crate::morphology::border_ring;
use crate::types::{
    BorderParams, Frame, ImageBatch, Mask, MaskBatch, PipelineError, Rgba32FImage,
    mask_dimensions,
};

/// Cut every frame out along its mask and surround it with a solid ring.
///
/// Frame `i` uses `masks.for_item(i)`. A zero `border_width` only applies
/// the mask as alpha. With auto-crop on, each frame is trimmed to the
/// non-zero extent of object plus ring.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range parameters,
/// [`PipelineError::DimensionMismatch`] if a mask does not line up with its
/// frame, and [`PipelineError::RaggedBatch`] if per-item masks trim frames
/// to different sizes.
pub fn crop_with_border(
    batch: &ImageBatch,
    masks: &MaskBatch,
    params: &BorderParams,
) -> Result<ImageBatch, PipelineError> {
    params.validate()?;

    let frames = batch
        .frames()
        .iter()
        .enumerate()
        .map(|(i, frame)| bordered_frame(frame, masks.for_item(i), params))
        .collect::<Result<Vec<_>, _>>()?;

    ImageBatch::new(frames)
}

fn bordered_frame(
    frame: &Frame,
    mask: &Mask,
    params: &BorderParams,
) -> Result<Frame, PipelineError> {
    let (image, mask_dims) = (frame.dimensions(), mask_dimensions(mask));
    if image != mask_dims {
        return Err(PipelineError::DimensionMismatch {
            image,
            mask: mask_dims,
        });
    }

    if params.border_width == 0 {
        let out = with_alpha(frame, mask);
        return Ok(match crop_box(mask, NONZERO_THRESHOLD, params.crop_policy()) {
            Some(region) => out.crop(region),
            None => out,
        });
    }

    let ring = border_ring(mask, params.border_width);
    let out = over_ring(frame, mask, &ring, params.border_color.rgb());
    let full = object_or_ring(mask, &ring);

    tracing::debug!(
        border_width = params.border_width,
        color = params.border_color.as_str(),
        size = %image,
        "bordered frame"
    );

    Ok(match crop_box(&full, NONZERO_THRESHOLD, params.crop_policy()) {
        Some(region) => out.crop(region),
        None => out,
    })
}

/// Object (alpha `m`) over a solid `color` layer with alpha `ring`.
fn over_ring(frame: &Frame, mask: &Mask, ring: &Mask, color: [f32; 3]) -> Frame {
    let src = frame.samples();
    let channels = usize::from(frame.channels());
    let (m, r) = (mask.as_raw(), ring.as_raw());
    let width = frame.width() as usize;

    Frame::Rgba(Rgba32FImage::from_fn(frame.width(), frame.height(), |x, y| {
        let i = y as usize * width + x as usize;
        let (fg, bg) = (m[i], r[i] * (1.0 - m[i]));
        let alpha = fg + bg;
        if alpha <= 0.0 {
            return image::Rgba([0.0; 4]);
        }
        let px = &src[i * channels..i * channels + 3];
        let mix = |c: usize| px[c].mul_add(fg, color[c] * bg) / alpha;
        image::Rgba([mix(0), mix(1), mix(2), alpha.min(1.0)])
    }))
}

/// Extent mask for trimming: the object where it is non-zero, else the ring.
fn object_or_ring(mask: &Mask, ring: &Mask) -> Mask {
    let mut full = ring.clone();
    for (out, object) in full.pixels_mut().zip(mask.pixels()) {
        if object.0[0] > 0.0 {
            *out = *object;
        }
    }
    full
}
