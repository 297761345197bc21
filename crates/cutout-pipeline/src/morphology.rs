//! Grayscale dilation by a disk and the border ring derived from it.
//!
//! A disk of radius `r` is the union of horizontal spans, one per row
//! offset `dy`, each `2 * floor(sqrt(r² - dy²)) + 1` pixels wide. Dilation
//! therefore reduces to a running maximum along each source row (van
//! Herk / Gil-Werman, constant work per pixel regardless of span width)
//! followed by a maximum over the `2r + 1` row offsets. Pixels outside the
//! mask count as 0.

use crate::types::Mask;

/// Dilate a mask by a Euclidean disk of `radius` pixels.
///
/// Each output pixel is the maximum of the input over the disk centred on
/// it. A zero radius returns the mask unchanged.
#[must_use = "returns the dilated mask"]
pub fn dilate_disk(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }

    let width = mask.width() as usize;
    let height = mask.height() as usize;
    let r = radius as usize;
    let spans: Vec<usize> = (0..=r).map(|dy| (r * r - dy * dy).isqrt()).collect();

    let src: &[f32] = mask.as_raw();
    let mut out = vec![0.0_f32; src.len()];
    let mut scratch = RunningMax::new(width, r);
    let mut row_max = vec![0.0_f32; width];

    for sy in 0..height {
        let row = &src[sy * width..(sy + 1) * width];
        let mut current_span = usize::MAX;

        for (dy, &span) in spans.iter().enumerate() {
            // Spans shrink monotonically, so equal spans are adjacent.
            if span != current_span {
                scratch.apply(row, span, &mut row_max);
                current_span = span;
            }
            // Source row `sy` reaches output rows `sy ± dy`.
            if let Some(y) = sy.checked_sub(dy) {
                merge_max(&mut out[y * width..(y + 1) * width], &row_max);
            }
            if dy > 0 && sy + dy < height {
                let y = sy + dy;
                merge_max(&mut out[y * width..(y + 1) * width], &row_max);
            }
        }
    }

    Mask::from_raw(mask.width(), mask.height(), out).unwrap_or_else(|| mask.clone())
}

/// Border-only ring: `dilate(mask, width) - mask`, floored at zero.
#[must_use = "returns the border ring"]
pub fn border_ring(mask: &Mask, width: u32) -> Mask {
    let mut dilated = dilate_disk(mask, width);
    for (ring, original) in dilated.pixels_mut().zip(mask.pixels()) {
        ring.0[0] = (ring.0[0] - original.0[0]).max(0.0);
    }
    dilated
}

fn merge_max(target: &mut [f32], source: &[f32]) {
    for (t, &s) in target.iter_mut().zip(source) {
        *t = t.max(s);
    }
}

/// Reusable buffers for the van Herk / Gil-Werman running maximum.
struct RunningMax {
    padded: Vec<f32>,
    prefix: Vec<f32>,
    suffix: Vec<f32>,
}

impl RunningMax {
    fn new(width: usize, max_half: usize) -> Self {
        let capacity = width + 2 * max_half + 2 * max_half + 1;
        Self {
            padded: Vec::with_capacity(capacity),
            prefix: Vec::with_capacity(capacity),
            suffix: Vec::with_capacity(capacity),
        }
    }

    /// `out[x] = max(row[x - half ..= x + half])`, zero outside the row.
    fn apply(&mut self, row: &[f32], half: usize, out: &mut [f32]) {
        if half == 0 {
            out.copy_from_slice(row);
            return;
        }

        let window = 2 * half + 1;
        let width = row.len();
        // Pad with `half` zeros on the left, then round the length up to
        // whole blocks so every block is complete.
        let len = (width + 2 * half).div_ceil(window) * window;

        self.padded.clear();
        self.padded.resize(half, 0.0);
        self.padded.extend_from_slice(row);
        self.padded.resize(len, 0.0);

        self.prefix.clear();
        self.prefix.resize(len, 0.0);
        self.suffix.clear();
        self.suffix.resize(len, 0.0);

        for block in (0..len).step_by(window) {
            let mut running = f32::MIN;
            for i in block..block + window {
                running = running.max(self.padded[i]);
                self.prefix[i] = running;
            }
            running = f32::MIN;
            for i in (block..block + window).rev() {
                running = running.max(self.padded[i]);
                self.suffix[i] = running;
            }
        }

        // The window for output x covers padded[x ..= x + 2 * half].
        for (x, slot) in out.iter_mut().enumerate() {
            *slot = self.suffix[x].max(self.prefix[x + window - 1]);
        }
    }
}
