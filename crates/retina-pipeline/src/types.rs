//! Shared types for the retinal segmentation pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::morphology::MAX_ELEMENT_SIZE;
use crate::ridge::RidgePolarity;

/// Re-export `GrayImage` so downstream crates can reference 8-bit
/// single-channel rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the pipeline's input type.
pub use image::RgbImage;

/// Single-channel floating-point raster used for intermediate filter
/// output (projections, blurred intensities, ridge responses).
pub type ChannelImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions record.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of any `image` raster.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either side is zero.
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

/// A boolean raster. `true` marks the positive class: the retinal
/// field for background masks, vessel pixels for vessel masks.
///
/// Stored row-major, one `bool` per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    dimensions: Dimensions,
    data: Vec<bool>,
}

impl Mask {
    /// Create an all-`false` mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, false)
    }

    /// Create a mask with every pixel set to `value`.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: bool) -> Self {
        let dimensions = Dimensions::new(width, height);
        Self {
            dimensions,
            data: vec![value; dimensions.pixel_count()],
        }
    }

    /// Create a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let dimensions = Dimensions::new(width, height);
        let mut data = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { dimensions, data }
    }

    /// Wrap a row-major buffer. Returns `None` if its length does not
    /// match `width * height`.
    #[must_use]
    pub fn from_vec(width: u32, height: u32, data: Vec<bool>) -> Option<Self> {
        let dimensions = Dimensions::new(width, height);
        (data.len() == dimensions.pixel_count()).then_some(Self { dimensions, data })
    }

    /// Interpret an 8-bit raster as a mask: any non-zero pixel is `true`.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            dimensions: Dimensions::of(image),
            data: image.as_raw().iter().map(|&v| v != 0).collect(),
        }
    }

    /// Render as an 8-bit raster: `true` = 255, `false` = 0.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        let raw = self.data.iter().map(|&v| if v { 255 } else { 0 }).collect();
        GrayImage::from_raw(self.dimensions.width, self.dimensions.height, raw)
            .unwrap_or_else(|| GrayImage::new(self.dimensions.width, self.dimensions.height))
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Spatial dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Total number of pixels, `true` or not.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the mask has no pixels at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    /// Value at `(x, y)`, or `None` outside the raster.
    #[must_use]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<bool> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        (x < self.width() && y < self.height()).then(|| self.get(x, y))
    }

    /// Set the value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Number of `true` pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Returns `true` if at least one pixel is `true`.
    #[must_use]
    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    /// Coordinates of every `true` pixel in row-major order.
    pub fn iter_true(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width().max(1);
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .filter_map(move |(i, _)| {
                let i = u32::try_from(i).ok()?;
                Some((i % width, i / width))
            })
    }

    /// Pixel-wise AND of two masks of the same dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ShapeMismatch`] if the dimensions differ.
    pub fn intersection(&self, other: &Self) -> Result<Self, SegmentError> {
        self.ensure_same_shape(other)?;
        Ok(Self {
            dimensions: self.dimensions,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a && b)
                .collect(),
        })
    }

    /// Returns `true` if every `true` pixel of `self` is also `true`
    /// in `other`. Masks of different dimensions are never subsets.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.data.iter().zip(&other.data).all(|(&a, &b)| !a || b)
    }

    /// Fail with [`SegmentError::ShapeMismatch`] unless `other` has the
    /// same dimensions as `self`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ShapeMismatch`] if the dimensions differ.
    pub const fn ensure_same_shape(&self, other: &Self) -> Result<(), SegmentError> {
        if self.dimensions.width == other.dimensions.width
            && self.dimensions.height == other.dimensions.height
        {
            Ok(())
        } else {
            Err(SegmentError::ShapeMismatch {
                expected: self.dimensions,
                actual: other.dimensions,
            })
        }
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.dimensions.width as usize + x as usize
    }
}

/// Configuration for the segmentation pipeline.
///
/// Field names and defaults follow the pipeline stages they feed.
/// Construct a [`Segmenter`](crate::Segmenter) to validate it; the
/// segmenter then owns the configuration and never mutates it.
///
/// # Invariants (checked by [`validate`](Self::validate))
///
/// - Every size and area field is at least 1.
/// - `bg_blur_ks` and `vessel_blur_ks` are odd.
/// - Sigmas are finite and non-negative (zero derives sigma from the
///   kernel size).
/// - `clahe_clip_limit` is finite and positive.
///
/// `bg_canny_min_scale` and `bg_canny_max_scale` are accepted for
/// configuration compatibility but are not applied: Canny thresholds
/// are always `(0.5 * otsu, otsu)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Gaussian kernel size for the background blur. Must be odd.
    pub bg_blur_ks: u32,
    /// Gaussian sigma for the background blur.
    pub bg_blur_sigma: f32,
    /// Unused; retained for configuration compatibility.
    pub bg_canny_min_scale: f32,
    /// Unused; retained for configuration compatibility.
    pub bg_canny_max_scale: f32,
    /// Elliptical element size used to close gaps in the Canny edge map.
    pub bg_canny_dilate: u32,
    /// Elliptical element size used to pull the vessel search area in
    /// from the field boundary.
    pub mask_erode: u32,
    /// Gaussian kernel size applied before the ridge filter. Must be odd.
    pub vessel_blur_ks: u32,
    /// Gaussian sigma applied before the ridge filter.
    pub vessel_blur_sigma: f32,
    /// Elliptical element size used to reconnect broken vessel segments.
    pub vessel_dilate_ks: u32,
    /// Connected vessel fragments smaller than this many pixels are dropped.
    pub remove_small_obj_min_area: u32,
    /// CLAHE contrast clip limit.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size (`clahe_ks` x `clahe_ks` tiles).
    pub clahe_ks: u32,
    /// Which ridge shape the ridge filter responds to.
    pub ridge_polarity: RidgePolarity,
}

impl SegmenterConfig {
    /// Default background blur kernel size.
    pub const DEFAULT_BG_BLUR_KS: u32 = 5;
    /// Default background blur sigma.
    pub const DEFAULT_BG_BLUR_SIGMA: f32 = 10.0;
    /// Default (unused) Canny minimum scale.
    pub const DEFAULT_BG_CANNY_MIN_SCALE: f32 = 1.0;
    /// Default (unused) Canny maximum scale.
    pub const DEFAULT_BG_CANNY_MAX_SCALE: f32 = 2.0;
    /// Default edge dilation element size.
    pub const DEFAULT_BG_CANNY_DILATE: u32 = 5;
    /// Default field erosion element size.
    pub const DEFAULT_MASK_ERODE: u32 = 20;
    /// Default vessel blur kernel size.
    pub const DEFAULT_VESSEL_BLUR_KS: u32 = 5;
    /// Default vessel blur sigma.
    pub const DEFAULT_VESSEL_BLUR_SIGMA: f32 = 1.3;
    /// Default vessel reconnection element size.
    pub const DEFAULT_VESSEL_DILATE_KS: u32 = 3;
    /// Default minimum vessel fragment area.
    pub const DEFAULT_REMOVE_SMALL_OBJ_MIN_AREA: u32 = 64;
    /// Default CLAHE clip limit.
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;
    /// Default CLAHE tile grid size.
    pub const DEFAULT_CLAHE_KS: u32 = 9;
    /// Default ridge polarity.
    pub const DEFAULT_RIDGE_POLARITY: RidgePolarity = RidgePolarity::Both;

    /// Check every field against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SegmentError> {
        odd_kernel("bg_blur_ks", self.bg_blur_ks)?;
        sigma("bg_blur_sigma", self.bg_blur_sigma)?;
        element_size("bg_canny_dilate", self.bg_canny_dilate)?;
        element_size("mask_erode", self.mask_erode)?;
        odd_kernel("vessel_blur_ks", self.vessel_blur_ks)?;
        sigma("vessel_blur_sigma", self.vessel_blur_sigma)?;
        element_size("vessel_dilate_ks", self.vessel_dilate_ks)?;
        positive("remove_small_obj_min_area", self.remove_small_obj_min_area)?;
        positive("clahe_ks", self.clahe_ks)?;
        if !(self.clahe_clip_limit.is_finite() && self.clahe_clip_limit > 0.0) {
            return Err(SegmentError::InvalidConfig {
                field: "clahe_clip_limit",
                reason: format!("must be finite and positive, got {}", self.clahe_clip_limit),
            });
        }
        Ok(())
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            bg_blur_ks: Self::DEFAULT_BG_BLUR_KS,
            bg_blur_sigma: Self::DEFAULT_BG_BLUR_SIGMA,
            bg_canny_min_scale: Self::DEFAULT_BG_CANNY_MIN_SCALE,
            bg_canny_max_scale: Self::DEFAULT_BG_CANNY_MAX_SCALE,
            bg_canny_dilate: Self::DEFAULT_BG_CANNY_DILATE,
            mask_erode: Self::DEFAULT_MASK_ERODE,
            vessel_blur_ks: Self::DEFAULT_VESSEL_BLUR_KS,
            vessel_blur_sigma: Self::DEFAULT_VESSEL_BLUR_SIGMA,
            vessel_dilate_ks: Self::DEFAULT_VESSEL_DILATE_KS,
            remove_small_obj_min_area: Self::DEFAULT_REMOVE_SMALL_OBJ_MIN_AREA,
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_ks: Self::DEFAULT_CLAHE_KS,
            ridge_polarity: Self::DEFAULT_RIDGE_POLARITY,
        }
    }
}

fn positive(field: &'static str, value: u32) -> Result<(), SegmentError> {
    if value == 0 {
        return Err(SegmentError::InvalidConfig {
            field,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn element_size(field: &'static str, value: u32) -> Result<(), SegmentError> {
    positive(field, value)?;
    if value > MAX_ELEMENT_SIZE {
        return Err(SegmentError::InvalidConfig {
            field,
            reason: format!("must be at most {MAX_ELEMENT_SIZE}, got {value}"),
        });
    }
    Ok(())
}

fn odd_kernel(field: &'static str, value: u32) -> Result<(), SegmentError> {
    positive(field, value)?;
    if value % 2 == 0 {
        return Err(SegmentError::InvalidConfig {
            field,
            reason: format!("must be odd, got {value}"),
        });
    }
    Ok(())
}

fn sigma(field: &'static str, value: f32) -> Result<(), SegmentError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(SegmentError::InvalidConfig {
            field,
            reason: format!("must be finite and non-negative, got {value}"),
        });
    }
    Ok(())
}

/// Errors that can occur during segmentation or scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    /// A configuration field violates its domain.
    #[error("invalid segmenter configuration: `{field}` {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The input image has no pixels.
    #[error("input image is empty ({0})")]
    EmptyImage(Dimensions),

    /// Background extraction found no contour enclosing an area.
    #[error("no retinal field detected: the edge map encloses no region")]
    NoFieldDetected,

    /// Otsu's method was given data with a single value.
    #[error("threshold is undefined for constant input (every value is {value})")]
    DegenerateThreshold {
        /// The single value present in the input.
        value: f32,
    },

    /// Two rasters that must share a shape do not.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape of the reference raster.
        expected: Dimensions,
        /// Shape of the offending raster.
        actual: Dimensions,
    },
}

impl SegmentError {
    /// Returns `true` for failures caused by unusable input data
    /// ([`NoFieldDetected`](Self::NoFieldDetected),
    /// [`DegenerateThreshold`](Self::DegenerateThreshold)) rather than by
    /// caller mistakes.
    #[must_use]
    pub const fn is_degenerate_input(&self) -> bool {
        matches!(self, Self::NoFieldDetected | Self::DegenerateThreshold { .. })
    }
}
