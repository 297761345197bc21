//! Blurs used by the compositor and the rasterizer.
//!
//! [`smooth_mask`] feathers a rasterized mask edge with a Gaussian.
//! [`box_mean`] is the fixed 9×9 local average behind the `blur`
//! background fill. It pads with zeros and always divides by the full
//! kernel area, so pixels near the border darken the way a zero-padded
//! average pool does.

use crate::types::{Frame, Mask};

/// Side length of the background-fill averaging kernel.
pub const FILL_BLUR_KERNEL: usize = 9;

/// Feather a mask edge.
///
/// `radius` is the edge-smoothing parameter; the Gaussian sigma is half of
/// it. A zero radius returns the mask unchanged, since
/// `image::imageops::blur` substitutes a default sigma for non-positive
/// values.
#[must_use = "returns the smoothed mask"]
#[allow(clippy::cast_precision_loss)]
pub fn smooth_mask(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let mut blurred = image::imageops::blur(mask, radius as f32 / 2.0);
    for pixel in blurred.pixels_mut() {
        pixel.0[0] = pixel.0[0].clamp(0.0, 1.0);
    }
    blurred
}

/// Zero-padded `kernel × kernel` mean of every channel of a frame.
///
/// Stride 1, same-size output. The divisor is always `kernel²`.
#[must_use = "returns the averaged frame"]
pub fn box_mean(frame: &Frame, kernel: usize) -> Frame {
    let mut out = frame.clone();
    let dims = frame.dimensions();
    let averaged = box_mean_samples(
        frame.samples(),
        dims.width as usize,
        dims.height as usize,
        usize::from(frame.channels()),
        kernel,
    );
    out.samples_mut().copy_from_slice(&averaged);
    out
}

/// Separable zero-padded box mean over interleaved samples.
#[allow(clippy::cast_precision_loss)]
fn box_mean_samples(
    samples: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    kernel: usize,
) -> Vec<f32> {
    let half = kernel / 2;
    let stride = width * channels;

    // Horizontal running sums.
    let mut horizontal = vec![0.0_f32; samples.len()];
    for y in 0..height {
        let row = &samples[y * stride..(y + 1) * stride];
        let out = &mut horizontal[y * stride..(y + 1) * stride];
        for c in 0..channels {
            let mut sum = 0.0_f32;
            // Prime the window with the taps right of x = 0.
            for x in 0..half.min(width) {
                sum += row[x * channels + c];
            }
            for x in 0..width {
                let enter = x + half;
                if enter < width {
                    sum += row[enter * channels + c];
                }
                out[x * channels + c] = sum;
                if x >= half {
                    sum -= row[(x - half) * channels + c];
                }
            }
        }
    }

    // Vertical running sums, then normalize.
    let norm = 1.0 / (kernel * kernel) as f32;
    let mut result = vec![0.0_f32; samples.len()];
    for i in 0..stride {
        let mut sum = 0.0_f32;
        for y in 0..half.min(height) {
            sum += horizontal[y * stride + i];
        }
        for y in 0..height {
            let enter = y + half;
            if enter < height {
                sum += horizontal[enter * stride + i];
            }
            result[y * stride + i] = sum * norm;
            if y >= half {
                sum -= horizontal[(y - half) * stride + i];
            }
        }
    }
    result
}
