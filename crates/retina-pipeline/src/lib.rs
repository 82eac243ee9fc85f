//! retina-pipeline: Pure retinal fundus segmentation pipeline (sans-IO).
//!
//! Turns an RGB fundus photograph into a binary vessel mask in two
//! phases:
//!
//! - **background**: principal-axis projection -> stretch -> blur ->
//!   Otsu-scaled Canny -> dilation -> largest contour -> filled field;
//! - **vessels**: lightness CLAHE -> blur -> Hessian ridge filter ->
//!   masked Otsu threshold -> dilation -> small-object removal.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! images and returns [`Mask`]s. Loading and saving files lives in
//! `retina-io`; the evaluation command line lives in `retina-eval`.

pub mod background;
pub mod blur;
pub mod canny;
pub mod clahe;
pub mod color;
pub mod components;
pub mod contour;
pub mod diagnostics;
pub mod gradient;
pub mod mask;
pub mod metrics;
pub mod morphology;
pub mod normalize;
pub mod pca;
pub mod ridge;
pub mod threshold;
pub mod types;
pub mod vessels;

pub use contour::{ContourTracer, ContourTracerKind};
pub use diagnostics::{Clock, SegmentDiagnostics, predict_with_diagnostics};
pub use metrics::ConfusionMatrix;
pub use morphology::{ElementShape, StructuringElement};
pub use ridge::RidgePolarity;
pub use types::{
    ChannelImage, Dimensions, GrayImage, Mask, RgbImage, SegmentError, SegmenterConfig,
};

use diagnostics::NoopRecorder;

/// A validated segmentation configuration.
///
/// `Segmenter` holds no state besides its configuration, so a single
/// instance can be shared across threads and used for any number of
/// images.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    /// Validate `config` and build a segmenter from it.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidConfig`] naming the first field that
    /// fails validation.
    pub fn new(config: SegmenterConfig) -> Result<Self, SegmentError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Run the full pipeline: extract the retinal field, then the vessels
    /// inside it.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::EmptyImage`] for a zero-sized image,
    /// [`SegmentError::DegenerateThreshold`] when a thresholding stage
    /// sees constant data (for example an all-black image), and
    /// [`SegmentError::NoFieldDetected`] when the edge map encloses no
    /// region.
    pub fn predict(&self, image: &RgbImage) -> Result<Mask, SegmentError> {
        let field = self.segment_background(image)?;
        self.segment_vessels(image, &field)
    }

    /// Compute the retinal field mask of `image`.
    ///
    /// The result has the image's dimensions and its `true` region is a
    /// single 4-connected component.
    ///
    /// # Errors
    ///
    /// See [`predict`](Self::predict).
    pub fn segment_background(&self, image: &RgbImage) -> Result<Mask, SegmentError> {
        background::segment(&self.config, image, &mut NoopRecorder)
    }

    /// Compute the vessel mask of `image` inside `field`.
    ///
    /// The result is a subset of `field` eroded by `mask_erode`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ShapeMismatch`] if `field` does not match
    /// the image dimensions, plus the errors of [`predict`](Self::predict).
    pub fn segment_vessels(&self, image: &RgbImage, field: &Mask) -> Result<Mask, SegmentError> {
        vessels::segment(&self.config, image, field, &mut NoopRecorder)
    }

    /// F1 score of `predicted` against `truth`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ShapeMismatch`] if the masks have different
    /// element counts.
    pub fn score(&self, predicted: &Mask, truth: &Mask) -> Result<f64, SegmentError> {
        metrics::f1_score(predicted, truth)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            config: SegmenterConfig::default(),
        }
    }
}
