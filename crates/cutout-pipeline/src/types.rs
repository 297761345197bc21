//! Shared types for the cutout mask pipeline.

use std::fmt;

use image::{DynamicImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::crop::CropBox;

/// Re-export the floating-point image buffers so downstream crates can
/// build frames without depending on `image` directly.
pub use image::{Rgb32FImage, Rgba32FImage};

/// Single-channel coverage mask with values in `[0, 1]`.
///
/// A mask is addressed by spatial alignment with its image only; it does
/// not own or reference the image it belongs to.
pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Build a mask of the given size filled with `value`.
#[must_use]
pub fn filled_mask(dimensions: Dimensions, value: f32) -> Mask {
    Mask::from_pixel(dimensions.width, dimensions.height, Luma([value]))
}

/// Dimensions of a mask.
#[must_use]
pub fn mask_dimensions(mask: &Mask) -> Dimensions {
    Dimensions::new(mask.width(), mask.height())
}

/// A 2D point in UI pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Closed polygon outline drawn by the user, in UI canvas coordinates.
///
/// The outline is implicitly closed: the last point connects back to the
/// first. Points may lie outside the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Minimum number of vertices that encloses an area.
    pub const MIN_POINTS: usize = 3;

    /// Create a polygon from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Drop every vertex after the first `max_points`.
    ///
    /// Returns `true` if anything was removed.
    pub fn truncate(&mut self, max_points: usize) -> bool {
        let truncated = self.0.len() > max_points;
        self.0.truncate(max_points);
        truncated
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty polygon.
    #[must_use]
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.0.first()?;
        Some(self.0.iter().fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One image of a batch: `H × W × C` floating-point samples in `[0, 1]`.
///
/// Three channels are opaque RGB; four channels carry straight alpha.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Opaque RGB.
    Rgb(Rgb32FImage),
    /// RGB with straight (non-premultiplied) alpha.
    Rgba(Rgba32FImage),
}

impl Frame {
    /// Build a frame from interleaved samples.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedChannels`] for channel counts
    /// other than 3 or 4, and [`PipelineError::InvalidConfig`] when the
    /// sample count does not match the dimensions.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<f32>,
    ) -> Result<Self, PipelineError> {
        let len = samples.len();
        let frame = match channels {
            3 => Rgb32FImage::from_raw(width, height, samples).map(Self::Rgb),
            4 => Rgba32FImage::from_raw(width, height, samples).map(Self::Rgba),
            other => return Err(PipelineError::UnsupportedChannels(other)),
        };
        frame.ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "{len} samples do not fill a {width}x{height}x{channels} frame"
            ))
        })
    }

    /// Convert a decoded image, keeping alpha only if the source has it.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_alpha() {
            Self::Rgba(image.to_rgba32f())
        } else {
            Self::Rgb(image.to_rgb32f())
        }
    }

    /// Wrap the frame as a [`DynamicImage`] for encoding.
    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Self::Rgb(img) => DynamicImage::ImageRgb32F(img.clone()),
            Self::Rgba(img) => DynamicImage::ImageRgba32F(img.clone()),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    /// Spatial size of the frame.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Number of interleaved channels (3 or 4).
    #[must_use]
    pub const fn channels(&self) -> u8 {
        match self {
            Self::Rgb(_) => 3,
            Self::Rgba(_) => 4,
        }
    }

    /// Interleaved samples, row-major.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        match self {
            Self::Rgb(img) => img.as_raw(),
            Self::Rgba(img) => img.as_raw(),
        }
    }

    /// Mutable interleaved samples, row-major.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        match self {
            Self::Rgb(img) => &mut **img,
            Self::Rgba(img) => &mut **img,
        }
    }

    /// Cut out the given box. The box must lie within the frame.
    #[must_use]
    pub fn crop(&self, region: CropBox) -> Self {
        let CropBox {
            x,
            y,
            width,
            height,
        } = region;
        match self {
            Self::Rgb(img) => {
                Self::Rgb(image::imageops::crop_imm(img, x, y, width, height).to_image())
            }
            Self::Rgba(img) => {
                Self::Rgba(image::imageops::crop_imm(img, x, y, width, height).to_image())
            }
        }
    }
}

/// Ordered sequence of same-sized frames with a common channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch(Vec<Frame>);

impl ImageBatch {
    /// Build a batch, checking that every frame agrees on size and
    /// channel count.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBatch`] for no frames,
    /// [`PipelineError::RaggedBatch`] if sizes differ, and
    /// [`PipelineError::MixedChannels`] if channel counts differ.
    pub fn new(frames: Vec<Frame>) -> Result<Self, PipelineError> {
        let first = frames.first().ok_or(PipelineError::EmptyBatch)?;
        let (dims, channels) = (first.dimensions(), first.channels());
        if frames.iter().any(|f| f.dimensions() != dims) {
            return Err(PipelineError::RaggedBatch);
        }
        if frames.iter().any(|f| f.channels() != channels) {
            return Err(PipelineError::MixedChannels);
        }
        Ok(Self(frames))
    }

    /// A batch holding a single frame.
    #[must_use]
    pub fn single(frame: Frame) -> Self {
        Self(vec![frame])
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: construction rejects empty batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shared size of every frame.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.0.first().map_or(Dimensions::new(0, 0), Frame::dimensions)
    }

    /// Shared channel count of every frame.
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.0.first().map_or(0, Frame::channels)
    }

    /// All frames, in order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    /// Consume the batch, returning its frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> {
        self.0
    }
}

/// One or more masks that accompany an [`ImageBatch`].
///
/// A batch item without a mask of its own uses the first mask, so a
/// single mask is shared across the whole image batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskBatch(Vec<Mask>);

impl MaskBatch {
    /// Build a mask batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBatch`] if `masks` is empty.
    pub fn new(masks: Vec<Mask>) -> Result<Self, PipelineError> {
        if masks.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        Ok(Self(masks))
    }

    /// A batch holding one shared mask.
    #[must_use]
    pub fn single(mask: Mask) -> Self {
        Self(vec![mask])
    }

    /// A single fully-opaque mask of the given size.
    #[must_use]
    pub fn ones(dimensions: Dimensions) -> Self {
        Self::single(filled_mask(dimensions, 1.0))
    }

    /// The mask that applies to batch item `index`.
    #[must_use]
    pub fn for_item(&self, index: usize) -> &Mask {
        self.0.get(index).unwrap_or(&self.0[0])
    }

    /// Number of masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: construction rejects empty batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All masks, in order.
    #[must_use]
    pub fn masks(&self) -> &[Mask] {
        &self.0
    }

    /// Consume the batch, returning its masks.
    #[must_use]
    pub fn into_masks(self) -> Vec<Mask> {
        self.0
    }
}

/// Drawing tool the UI opens with. Only forwarded to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Freehand stroke; the stroke is closed into an outline.
    FreeDraw,
    /// Click-to-place polygon vertices.
    #[default]
    Polygon,
}

impl CropMode {
    /// Every mode, in UI order.
    pub const ALL: [Self; 2] = [Self::FreeDraw, Self::Polygon];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeDraw => "free_draw",
            Self::Polygon => "polygon",
        }
    }
}

/// How pixels outside the selection are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Mask becomes the alpha channel.
    #[default]
    Transparent,
    /// Blend towards black.
    Black,
    /// Blend towards white.
    White,
    /// Blend towards a blurred copy of the source.
    Blur,
}

impl FillPolicy {
    /// Every policy, in UI order.
    pub const ALL: [Self; 4] = [Self::Transparent, Self::Black, Self::White, Self::Blur];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Black => "black",
            Self::White => "white",
            Self::Blur => "blur",
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solid color painted into the border ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderColor {
    /// Pure white.
    #[default]
    White,
    /// Pure black.
    Black,
    /// Mid gray (128/255).
    Gray,
}

impl BorderColor {
    /// Every color, in UI order.
    pub const ALL: [Self; 3] = [Self::White, Self::Black, Self::Gray];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Gray => "gray",
        }
    }

    /// RGB components in `[0, 1]`.
    #[must_use]
    pub fn rgb(self) -> [f32; 3] {
        match self {
            Self::White => [1.0; 3],
            Self::Black => [0.0; 3],
            Self::Gray => [128.0 / 255.0; 3],
        }
    }
}

/// Whether and how far to trim output to the mask's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPolicy {
    /// Trim to the bounding box of the mask.
    pub enabled: bool,
    /// Extra pixels kept around the box on every side.
    pub padding: u32,
}

impl CropPolicy {
    /// No trimming.
    pub const DISABLED: Self = Self {
        enabled: false,
        padding: 0,
    };
}

/// Parameters of one interactive crop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropParams {
    /// Drawing tool the UI opens with.
    pub crop_mode: CropMode,
    /// Rendering of pixels outside the selection.
    pub background_fill: FillPolicy,
    /// Edge smoothing radius, `0..=20`.
    pub edge_smooth: u32,
    /// Trim the result to the selection.
    pub auto_crop: bool,
    /// Padding kept around the trimmed selection, `0..=100`.
    pub crop_padding: u32,
}

impl CropParams {
    /// Largest accepted `edge_smooth`.
    pub const EDGE_SMOOTH_MAX: u32 = 20;
    /// Largest accepted `crop_padding`.
    pub const CROP_PADDING_MAX: u32 = 100;

    /// Copy with every numeric field pinned into its accepted range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            edge_smooth: self.edge_smooth.min(Self::EDGE_SMOOTH_MAX),
            crop_padding: self.crop_padding.min(Self::CROP_PADDING_MAX),
            ..self
        }
    }

    /// Auto-crop settings as a [`CropPolicy`].
    #[must_use]
    pub const fn crop_policy(&self) -> CropPolicy {
        CropPolicy {
            enabled: self.auto_crop,
            padding: self.crop_padding,
        }
    }
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            crop_mode: CropMode::Polygon,
            background_fill: FillPolicy::Transparent,
            edge_smooth: 0,
            auto_crop: true,
            crop_padding: 10,
        }
    }
}

/// Parameters of the mask border node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderParams {
    /// Ring width in pixels, `0..=200`.
    pub border_width: u32,
    /// Ring color.
    pub border_color: BorderColor,
    /// Trim the result to object plus ring.
    pub auto_crop: bool,
    /// Padding kept around the trimmed region, `0..=100`.
    pub crop_padding: u32,
}

impl BorderParams {
    /// Largest accepted `border_width`.
    pub const BORDER_WIDTH_MAX: u32 = 200;

    /// Check every numeric field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field out
    /// of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.border_width > Self::BORDER_WIDTH_MAX {
            return Err(PipelineError::InvalidConfig(format!(
                "border_width {} exceeds {}",
                self.border_width,
                Self::BORDER_WIDTH_MAX
            )));
        }
        if self.crop_padding > CropParams::CROP_PADDING_MAX {
            return Err(PipelineError::InvalidConfig(format!(
                "crop_padding {} exceeds {}",
                self.crop_padding,
                CropParams::CROP_PADDING_MAX
            )));
        }
        Ok(())
    }

    /// Auto-crop settings as a [`CropPolicy`].
    #[must_use]
    pub const fn crop_policy(&self) -> CropPolicy {
        CropPolicy {
            enabled: self.auto_crop,
            padding: self.crop_padding,
        }
    }
}

impl Default for BorderParams {
    fn default() -> Self {
        Self {
            border_width: 20,
            border_color: BorderColor::White,
            auto_crop: true,
            crop_padding: 10,
        }
    }
}

/// Output of a masked composite: the rendered batch and the masks that
/// now align with it.
#[derive(Debug, Clone, PartialEq)]
pub struct CropResult {
    /// Composited (and possibly trimmed) frames.
    pub image: ImageBatch,
    /// Masks trimmed to the same boxes as `image`.
    pub mask: MaskBatch,
}

/// Errors that can occur in the mask pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The polygon encloses no area.
    #[error("polygon needs at least 3 points, got {count}")]
    InsufficientPoints {
        /// Number of points supplied.
        count: usize,
    },

    /// The target canvas has a zero-length axis.
    #[error("canvas has zero area")]
    EmptyCanvas,

    /// A mask does not line up with its image.
    #[error("mask is {mask} but image is {image}")]
    DimensionMismatch {
        /// Image size.
        image: Dimensions,
        /// Mask size.
        mask: Dimensions,
    },

    /// Frames must have 3 or 4 channels.
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u8),

    /// Frames in one batch disagree on channel count.
    #[error("batch frames have different channel counts")]
    MixedChannels,

    /// Frames in one batch disagree on size.
    #[error("batch frames have different sizes")]
    RaggedBatch,

    /// A batch must hold at least one item.
    #[error("batch is empty")]
    EmptyBatch,

    /// Configuration is out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rgb(width: u32, height: u32) -> Frame {
        Frame::Rgb(Rgb32FImage::new(width, height))
    }

    // --- Polygon tests ---

    #[test]
    fn polygon_truncate_reports_removal() {
        let mut poly = Polygon::new((0..5).map(|i| Point::new(f64::from(i), 0.0)).collect());
        assert!(poly.truncate(3));
        assert_eq!(poly.len(), 3);
        assert!(!poly.truncate(3));
    }

    #[test]
    fn polygon_bounds() {
        let poly = Polygon::new(vec![
            Point::new(3.0, -1.0),
            Point::new(-2.0, 4.0),
            Point::new(5.0, 2.0),
        ]);
        let (lo, hi) = poly.bounds().unwrap();
        assert_eq!(lo, Point::new(-2.0, -1.0));
        assert_eq!(hi, Point::new(5.0, 4.0));
        assert!(Polygon::new(vec![]).bounds().is_none());
    }

    #[test]
    fn polygon_deserializes_from_xy_objects() {
        let poly: Polygon = serde_json::from_str(r#"[{"x":1,"y":2},{"x":3.5,"y":4}]"#).unwrap();
        assert_eq!(poly.points()[1], Point::new(3.5, 4.0));
    }

    // --- Frame tests ---

    #[test]
    fn frame_from_raw_rejects_two_channels() {
        let err = Frame::from_raw(1, 1, 2, vec![0.0; 2]).unwrap_err();
        assert_eq!(err, PipelineError::UnsupportedChannels(2));
    }

    #[test]
    fn frame_from_raw_rejects_short_buffer() {
        let err = Frame::from_raw(2, 2, 3, vec![0.0; 11]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn frame_crop_keeps_channels() {
        let frame = Frame::Rgba(Rgba32FImage::new(8, 6));
        let cropped = frame.crop(CropBox {
            x: 2,
            y: 1,
            width: 3,
            height: 4,
        });
        assert_eq!(cropped.dimensions(), Dimensions::new(3, 4));
        assert_eq!(cropped.channels(), 4);
    }

    // --- Batch tests ---

    #[test]
    fn batch_rejects_empty() {
        assert_eq!(ImageBatch::new(vec![]), Err(PipelineError::EmptyBatch));
        assert_eq!(MaskBatch::new(vec![]), Err(PipelineError::EmptyBatch));
    }

    #[test]
    fn batch_rejects_ragged_sizes() {
        let result = ImageBatch::new(vec![rgb(4, 4), rgb(4, 5)]);
        assert_eq!(result, Err(PipelineError::RaggedBatch));
    }

    #[test]
    fn batch_rejects_mixed_channels() {
        let result = ImageBatch::new(vec![rgb(4, 4), Frame::Rgba(Rgba32FImage::new(4, 4))]);
        assert_eq!(result, Err(PipelineError::MixedChannels));
    }

    #[test]
    fn mask_batch_broadcasts_first_mask() {
        let masks = MaskBatch::new(vec![
            filled_mask(Dimensions::new(2, 2), 0.25),
            filled_mask(Dimensions::new(2, 2), 0.75),
        ])
        .unwrap();
        assert!((masks.for_item(1).get_pixel(0, 0).0[0] - 0.75).abs() < f32::EPSILON);
        assert!((masks.for_item(5).get_pixel(0, 0).0[0] - 0.25).abs() < f32::EPSILON);
    }

    // --- Params tests ---

    #[test]
    fn crop_params_defaults_match_node_defaults() {
        let params = CropParams::default();
        assert_eq!(params.crop_mode, CropMode::Polygon);
        assert_eq!(params.background_fill, FillPolicy::Transparent);
        assert_eq!(params.edge_smooth, 0);
        assert!(params.auto_crop);
        assert_eq!(params.crop_padding, 10);
    }

    #[test]
    fn crop_params_clamped_pins_ranges() {
        let params = CropParams {
            edge_smooth: 99,
            crop_padding: 500,
            ..CropParams::default()
        }
        .clamped();
        assert_eq!(params.edge_smooth, 20);
        assert_eq!(params.crop_padding, 100);
    }

    #[test]
    fn crop_params_wire_names() {
        let json = serde_json::to_value(CropParams::default()).unwrap();
        assert_eq!(json["crop_mode"], "polygon");
        assert_eq!(json["background_fill"], "transparent");
    }

    #[test]
    fn border_params_validate_rejects_wide_border() {
        let params = BorderParams {
            border_width: 201,
            ..BorderParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(BorderParams::default().validate().is_ok());
    }

    #[test]
    fn gray_border_is_mid_gray() {
        let [r, g, b] = BorderColor::Gray.rgb();
        assert!((r - 128.0 / 255.0).abs() < f32::EPSILON);
        assert!((r - g).abs() < f32::EPSILON && (g - b).abs() < f32::EPSILON);
    }
}
