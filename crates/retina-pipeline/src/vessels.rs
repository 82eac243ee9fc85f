//! Vessel extraction inside a known retinal field.
//!
//! Stages:
//!
//! 1. CLAHE on the 8-bit lightness channel (`clahe_clip_limit`,
//!    `clahe_ks` x `clahe_ks` tiles), chroma untouched;
//! 2. Gaussian blur (`vessel_blur_ks`, `vessel_blur_sigma`);
//! 3. Hessian ridge filter on the luma of the blurred image;
//! 4. erode the field with a `mask_erode` ellipse and zero the ridge
//!    response outside it;
//! 5. Otsu over the whole masked response; pixels strictly above the
//!    level are vessel candidates;
//! 6. dilate candidates with a `vessel_dilate_ks` ellipse and clip the
//!    result to the eroded field;
//! 7. drop 4-connected pieces smaller than `remove_small_obj_min_area`.

use crate::color::{self, LabImage};
use crate::diagnostics::{Stage, StageMetrics, StageRecorder};
use crate::morphology::{self, StructuringElement};
use crate::types::{ChannelImage, Dimensions, Mask, RgbImage, SegmentError, SegmenterConfig};
use crate::{background, blur, clahe, components, ridge, threshold};

/// Compute the vessel mask of `image` restricted to `field`.
pub(crate) fn segment<R: StageRecorder>(
    config: &SegmenterConfig,
    image: &RgbImage,
    field: &Mask,
    recorder: &mut R,
) -> Result<Mask, SegmentError> {
    let dimensions = Dimensions::of(image);
    if dimensions.is_empty() {
        return Err(SegmentError::EmptyImage(dimensions));
    }
    if field.dimensions() != dimensions {
        return Err(SegmentError::ShapeMismatch {
            expected: dimensions,
            actual: field.dimensions(),
        });
    }

    let equalized = recorder.record(
        Stage::Equalize,
        || equalize_lightness(image, config.clahe_clip_limit, config.clahe_ks),
        |_| StageMetrics::Equalize {
            clip_limit: config.clahe_clip_limit,
            tiles: config.clahe_ks,
        },
    );

    let blurred = recorder.record(
        Stage::VesselBlur,
        || blur::gaussian_blur_rgb(&equalized, config.vessel_blur_ks, config.vessel_blur_sigma),
        |_| StageMetrics::Blur {
            kernel_size: config.vessel_blur_ks,
            sigma: config.vessel_blur_sigma,
        },
    );

    let ridges = recorder.record(
        Stage::RidgeFilter,
        || ridge::ridge_filter(&color::luma(&blurred), config.ridge_polarity),
        background::range_metrics,
    );

    let interior = recorder.record(
        Stage::FieldErosion,
        || morphology::erode(field, &StructuringElement::ellipse(config.mask_erode)),
        |m| StageMetrics::Morphology {
            kernel_size: config.mask_erode,
            pixels_before: field.count() as u64,
            pixels_after: m.count() as u64,
        },
    );
    let masked = apply_mask(&ridges, &interior);

    let level = recorder.record(
        Stage::RidgeThreshold,
        || threshold::otsu(&masked),
        |t| StageMetrics::Threshold {
            level: t.as_ref().ok().copied(),
        },
    )?;
    let candidates = Mask::from_fn(dimensions.width, dimensions.height, |x, y| {
        masked.get_pixel(x, y).0[0] > level
    });

    let reconnected = recorder.record(
        Stage::Reconnect,
        || {
            morphology::dilate(&candidates, &StructuringElement::ellipse(config.vessel_dilate_ks))
                .intersection(&interior)
        },
        |r| StageMetrics::Morphology {
            kernel_size: config.vessel_dilate_ks,
            pixels_before: candidates.count() as u64,
            pixels_after: r.as_ref().map_or(0, |m| m.count() as u64),
        },
    )?;

    Ok(recorder.record(
        Stage::Prune,
        || components::remove_small_objects(&reconnected, config.remove_small_obj_min_area),
        |pruned| StageMetrics::Prune {
            min_area: config.remove_small_obj_min_area,
            components_before: components::count_components(&reconnected),
            components_after: components::count_components(pruned),
            pixels_after: pruned.count() as u64,
        },
    ))
}

/// Equalize lightness with CLAHE while leaving chroma untouched.
#[must_use]
pub fn equalize_lightness(image: &RgbImage, clip_limit: f32, tiles: u32) -> RgbImage {
    let lab = color::rgb_to_lab(image);
    let lightness = clahe::clahe(&lab.lightness, clip_limit, tiles, tiles);
    color::lab_to_rgb(&LabImage { lightness, ..lab })
}

/// Zero every sample outside `mask`.
fn apply_mask(image: &ChannelImage, mask: &Mask) -> ChannelImage {
    let (w, h) = image.dimensions();
    ChannelImage::from_fn(w, h, |x, y| {
        image::Luma([if mask.get(x, y) { image.get_pixel(x, y).0[0] } else { 0.0 }])
    })
}
