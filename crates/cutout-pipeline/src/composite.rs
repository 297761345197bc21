//! Masked compositing of image batches.
//!
//! Every pixel is blended with its mask value `m` as the weight of the
//! source:
//!
//! | fill          | output                                   |
//! |---------------|------------------------------------------|
//! | `Transparent` | RGB + alpha `m` (alpha replaced if RGBA) |
//! | `Black`       | `src * m`                                |
//! | `White`       | `src * m + (1 - m)`                      |
//! | `Blur`        | `src * m + box_mean(src) * (1 - m)`      |
//!
//! Solid and blurred fills apply to every channel, alpha included.

use crate::blur::{FILL_BLUR_KERNEL, box_mean};
use crate::crop::{AUTO_CROP_THRESHOLD, crop_box, crop_pair};
use crate::types::{
    CropPolicy, CropResult, FillPolicy, Frame, ImageBatch, Mask, MaskBatch, PipelineError,
    Rgba32FImage, mask_dimensions,
};

/// Blend one frame with its mask according to `fill`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] when the mask and frame
/// differ in size.
pub fn apply_fill(frame: &Frame, mask: &Mask, fill: FillPolicy) -> Result<Frame, PipelineError> {
    check_alignment(frame, mask)?;

    let weights: &[f32] = mask.as_raw();
    Ok(match fill {
        FillPolicy::Transparent => with_alpha(frame, mask),
        FillPolicy::Black => blend(frame, weights, |src, _, m| src * m),
        FillPolicy::White => blend(frame, weights, |src, _, m| src.mul_add(m, 1.0 - m)),
        FillPolicy::Blur => {
            let background = box_mean(frame, FILL_BLUR_KERNEL);
            let bg = background.samples();
            blend(frame, weights, |src, i, m| src.mul_add(m, bg[i] * (1.0 - m)))
        }
    })
}

/// Copy of `frame` as RGBA with the mask as its alpha channel.
///
/// Existing alpha is discarded. The mask must match the frame's size.
#[must_use]
pub fn with_alpha(frame: &Frame, mask: &Mask) -> Frame {
    let alpha = mask.as_raw();
    let dims = frame.dimensions();
    let src = frame.samples();
    let channels = usize::from(frame.channels());
    let rgba = Rgba32FImage::from_fn(dims.width, dims.height, |x, y| {
        let i = y as usize * dims.width as usize + x as usize;
        let px = &src[i * channels..i * channels + 3];
        image::Rgba([px[0], px[1], px[2], alpha[i]])
    });
    Frame::Rgba(rgba)
}

/// Composite every frame of `batch` with its mask and optionally trim the
/// results to the mask's bounding box.
///
/// Frame `i` uses `masks.for_item(i)`. The returned masks are trimmed to
/// the same boxes, one per frame. With a single shared mask every frame is
/// cut to the same box; per-frame masks may disagree, which is rejected.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if a mask does not line up
/// with its frame, and [`PipelineError::RaggedBatch`] if per-frame crop
/// boxes produce frames of different sizes.
pub fn composite_batch(
    batch: &ImageBatch,
    masks: &MaskBatch,
    fill: FillPolicy,
    crop: CropPolicy,
) -> Result<CropResult, PipelineError> {
    let mut frames = Vec::with_capacity(batch.len());
    let mut out_masks = Vec::with_capacity(batch.len());

    for (i, frame) in batch.frames().iter().enumerate() {
        let mask = masks.for_item(i);
        let filled = apply_fill(frame, mask, fill)?;
        match crop_box(mask, AUTO_CROP_THRESHOLD, crop) {
            Some(region) => {
                let (frame, mask) = crop_pair(&filled, mask, region);
                frames.push(frame);
                out_masks.push(mask);
            }
            None => {
                frames.push(filled);
                out_masks.push(mask.clone());
            }
        }
    }

    Ok(CropResult {
        image: ImageBatch::new(frames)?,
        mask: MaskBatch::new(out_masks)?,
    })
}

fn check_alignment(frame: &Frame, mask: &Mask) -> Result<(), PipelineError> {
    let (image, mask) = (frame.dimensions(), mask_dimensions(mask));
    if image == mask {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch { image, mask })
    }
}

/// Apply `op(sample, sample_index, mask_value)` to every sample.
fn blend(frame: &Frame, weights: &[f32], op: impl Fn(f32, usize, f32) -> f32) -> Frame {
    let channels = usize::from(frame.channels());
    let mut out = frame.clone();
    for (i, sample) in out.samples_mut().iter_mut().enumerate() {
        *sample = op(*sample, i, weights[i / channels]);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Dimensions, Rgb32FImage, filled_mask};

    fn gradient_rgb(width: u32, height: u32) -> Frame {
        #[allow(clippy::cast_precision_loss)]
        Frame::Rgb(Rgb32FImage::from_fn(width, height, |x, y| {
            let v = (x + y) as f32 / (width + height) as f32;
            image::Rgb([v, 0.5, 1.0 - v])
        }))
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn transparent_appends_alpha_to_rgb() {
        let frame = gradient_rgb(4, 4);
        let mask = filled_mask(Dimensions::new(4, 4), 0.3);
        let out = apply_fill(&frame, &mask, FillPolicy::Transparent).unwrap();
        assert_eq!(out.channels(), 4);
        let Frame::Rgba(img) = &out else {
            unreachable!("transparent fill always yields RGBA");
        };
        let px = img.get_pixel(1, 2).0;
        let Frame::Rgb(src) = &frame else {
            unreachable!("built as RGB");
        };
        assert_eq!(&px[..3], &src.get_pixel(1, 2).0[..]);
        assert!(close(px[3], 0.3));
    }

    #[test]
    fn transparent_overwrites_existing_alpha() {
        let frame = Frame::Rgba(Rgba32FImage::from_pixel(3, 3, image::Rgba([0.2, 0.4, 0.6, 1.0])));
        let mask = filled_mask(Dimensions::new(3, 3), 0.25);
        let out = apply_fill(&frame, &mask, FillPolicy::Transparent).unwrap();
        let samples = out.samples();
        assert!(close(samples[0], 0.2) && close(samples[3], 0.25));
    }

    #[test]
    fn black_scales_by_mask() {
        let frame = gradient_rgb(4, 4);
        let mask = filled_mask(Dimensions::new(4, 4), 0.5);
        let out = apply_fill(&frame, &mask, FillPolicy::Black).unwrap();
        for (o, s) in out.samples().iter().zip(frame.samples()) {
            assert!(close(*o, s * 0.5));
        }
    }

    #[test]
    fn white_full_mask_is_source_and_empty_mask_is_white() {
        let frame = gradient_rgb(5, 5);
        let ones = filled_mask(Dimensions::new(5, 5), 1.0);
        let opaque = apply_fill(&frame, &ones, FillPolicy::White).unwrap();
        assert_eq!(opaque, frame);

        let zeros = filled_mask(Dimensions::new(5, 5), 0.0);
        let cleared = apply_fill(&frame, &zeros, FillPolicy::White).unwrap();
        assert!(cleared.samples().iter().all(|&v| close(v, 1.0)));
    }

    #[test]
    fn blur_fill_keeps_selected_pixels() {
        let frame = gradient_rgb(12, 12);
        let mask = Mask::from_fn(12, 12, |x, _| image::Luma([if x < 6 { 1.0 } else { 0.0 }]));
        let out = apply_fill(&frame, &mask, FillPolicy::Blur).unwrap();
        let background = box_mean(&frame, FILL_BLUR_KERNEL);
        // Selected column: source. Unselected column: local average.
        let selected = (5 * 12 + 2) * 3;
        let unselected = (5 * 12 + 9) * 3;
        assert!(close(out.samples()[selected], frame.samples()[selected]));
        assert!(close(out.samples()[unselected], background.samples()[unselected]));
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let frame = gradient_rgb(4, 4);
        let mask = filled_mask(Dimensions::new(4, 5), 1.0);
        assert_eq!(
            apply_fill(&frame, &mask, FillPolicy::Black),
            Err(PipelineError::DimensionMismatch {
                image: Dimensions::new(4, 4),
                mask: Dimensions::new(4, 5),
            })
        );
    }

    #[test]
    fn auto_crop_with_empty_mask_is_noop() {
        let batch = ImageBatch::single(gradient_rgb(8, 8));
        let masks = MaskBatch::single(filled_mask(Dimensions::new(8, 8), 0.05));
        let policy = CropPolicy {
            enabled: true,
            padding: 2,
        };
        let result = composite_batch(&batch, &masks, FillPolicy::White, policy).unwrap();
        assert_eq!(result.image.dimensions(), Dimensions::new(8, 8));
        assert_eq!(result.mask.masks()[0], masks.masks()[0]);
    }

    #[test]
    fn auto_crop_trims_every_frame_to_shared_mask() {
        let batch = ImageBatch::new(vec![gradient_rgb(16, 16), gradient_rgb(16, 16)]).unwrap();
        let mask = Mask::from_fn(16, 16, |x, y| {
            image::Luma([if (4..8).contains(&x) && (6..9).contains(&y) { 1.0 } else { 0.0 }])
        });
        let policy = CropPolicy {
            enabled: true,
            padding: 1,
        };
        let result =
            composite_batch(&batch, &MaskBatch::single(mask), FillPolicy::Transparent, policy)
                .unwrap();
        assert_eq!(result.image.len(), 2);
        assert_eq!(result.image.dimensions(), Dimensions::new(6, 5));
        assert_eq!(result.mask.len(), 2);
        assert_eq!(result.mask.masks()[1].dimensions(), (6, 5));
    }

    #[test]
    fn disagreeing_per_frame_crops_are_rejected() {
        let batch = ImageBatch::new(vec![gradient_rgb(16, 16), gradient_rgb(16, 16)]).unwrap();
        let corner = |size: u32| {
            Mask::from_fn(16, 16, move |x, y| {
                image::Luma([f32::from(u8::from(x < size && y < size))])
            })
        };
        let (small, large) = (corner(2), corner(9));
        let masks = MaskBatch::new(vec![small, large]).unwrap();
        let policy = CropPolicy {
            enabled: true,
            padding: 0,
        };
        assert_eq!(
            composite_batch(&batch, &masks, FillPolicy::Black, policy),
            Err(PipelineError::RaggedBatch)
        );
    }
}
