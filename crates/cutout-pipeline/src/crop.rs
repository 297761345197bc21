//! Auto-crop: trim output to the bounding box of the mask.
//!
//! The box is the smallest axis-aligned rectangle holding every mask
//! pixel above a threshold, grown by the requested padding and clamped to
//! the image. Image and mask are cut to the same box so they stay aligned.

use serde::{Deserialize, Serialize};

use crate::types::{CropPolicy, Dimensions, Frame, Mask};

/// Mask value a pixel must exceed to count towards the interactive crop box.
pub const AUTO_CROP_THRESHOLD: f32 = 0.1;

/// Mask value a pixel must exceed to count as non-empty.
///
/// Half an 8-bit step: anything that would quantize to a non-zero byte.
pub const NONZERO_THRESHOLD: f32 = 0.5 / 255.0;

/// Axis-aligned pixel rectangle, `x`/`y` inclusive, extent exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CropBox {
    /// Size of the box.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Returns `true` if the box spans the whole of `bounds`.
    #[must_use]
    pub const fn covers(&self, bounds: Dimensions) -> bool {
        self.x == 0 && self.y == 0 && self.width == bounds.width && self.height == bounds.height
    }

    /// Grow the box by `padding` on every side, clamped to `bounds`.
    #[must_use]
    pub fn padded(self, padding: u32, bounds: Dimensions) -> Self {
        let left = self.x.saturating_sub(padding);
        let top = self.y.saturating_sub(padding);
        let right = (self.x + self.width).saturating_add(padding).min(bounds.width);
        let bottom = (self.y + self.height)
            .saturating_add(padding)
            .min(bounds.height);
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// Smallest box holding every mask pixel strictly above `threshold`.
///
/// Returns `None` when no pixel qualifies.
#[must_use]
pub fn bounding_box(mask: &Mask, threshold: f32) -> Option<CropBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > threshold {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| CropBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Box an auto-crop with `policy` would cut to, or `None` to leave the
/// image alone (policy disabled or nothing above `threshold`).
#[must_use]
pub fn crop_box(mask: &Mask, threshold: f32, policy: CropPolicy) -> Option<CropBox> {
    if !policy.enabled {
        return None;
    }
    let bounds = Dimensions::new(mask.width(), mask.height());
    bounding_box(mask, threshold).map(|b| b.padded(policy.padding, bounds))
}

/// Cut a mask to `region`. The box must lie within the mask.
#[must_use]
pub fn crop_mask(mask: &Mask, region: CropBox) -> Mask {
    image::imageops::crop_imm(mask, region.x, region.y, region.width, region.height).to_image()
}

/// Cut a frame and its mask to the same box.
#[must_use]
pub fn crop_pair(frame: &Frame, mask: &Mask, region: CropBox) -> (Frame, Mask) {
    (frame.crop(region), crop_mask(mask, region))
}
