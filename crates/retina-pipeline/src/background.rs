//! Retinal field (background mask) extraction.
//!
//! Stages:
//!
//! 1. project RGB onto its principal color axis ([`pca::project`]);
//! 2. stretch to `[0, 255]`;
//! 3. Gaussian blur (`bg_blur_ks`, `bg_blur_sigma`);
//! 4. Otsu level `o` of the blurred projection;
//! 5. Canny with thresholds `(0.5 * o, o)` on the 8-bit image;
//! 6. dilate the edges with a `bg_canny_dilate` ellipse;
//! 7. trace contours and keep the largest by area;
//! 8. fill it, erode the fill by the same ellipse to undo the edge
//!    dilation, and keep the largest 4-connected piece. If the erosion
//!    removes everything the un-eroded fill is used instead.

use crate::canny::{self, clamp_thresholds};
use crate::contour::{self, Contour};
use crate::diagnostics::{Stage, StageMetrics, StageRecorder, count_lit};
use crate::morphology::{self, StructuringElement};
use crate::types::{Dimensions, Mask, RgbImage, SegmentError, SegmenterConfig};
use crate::{blur, components, mask, normalize, pca, threshold};

/// Compute the retinal field mask of `image`.
pub(crate) fn segment<R: StageRecorder>(
    config: &SegmenterConfig,
    image: &RgbImage,
    recorder: &mut R,
) -> Result<Mask, SegmentError> {
    let dimensions = Dimensions::of(image);
    if dimensions.is_empty() {
        return Err(SegmentError::EmptyImage(dimensions));
    }

    let projection = recorder.record(
        Stage::Reduce,
        || pca::project(image),
        |p| StageMetrics::Reduce {
            axis: p.axis,
            explained_variance_ratio: p.explained_variance_ratio,
            flipped: p.flipped,
        },
    );

    let normalized = recorder.record(
        Stage::Normalize,
        || normalize::min_max_scale(&projection.image, 0.0, 255.0),
        range_metrics,
    );

    let blurred = recorder.record(
        Stage::BackgroundBlur,
        || blur::gaussian_blur(&normalized, config.bg_blur_ks, config.bg_blur_sigma),
        |_| StageMetrics::Blur {
            kernel_size: config.bg_blur_ks,
            sigma: config.bg_blur_sigma,
        },
    );

    let level = recorder.record(
        Stage::EdgeThreshold,
        || threshold::otsu(&blurred),
        |t| StageMetrics::Threshold {
            level: t.as_ref().ok().copied(),
        },
    )?;

    let edges = recorder.record(
        Stage::EdgeDetection,
        || canny::canny(&normalize::to_gray_truncated(&blurred), 0.5 * level, level),
        |e| {
            let (low_threshold, high_threshold) = clamp_thresholds(0.5 * level, level);
            StageMetrics::EdgeDetection {
                low_threshold,
                high_threshold,
                edge_pixel_count: count_lit(e),
                total_pixel_count: dimensions.pixel_count() as u64,
            }
        },
    );

    let element = StructuringElement::ellipse(config.bg_canny_dilate);
    let edge_mask = Mask::from_gray(&edges);
    let dilated = recorder.record(
        Stage::EdgeDilation,
        || morphology::dilate(&edge_mask, &element),
        |d| StageMetrics::Morphology {
            kernel_size: config.bg_canny_dilate,
            pixels_before: edge_mask.count() as u64,
            pixels_after: d.count() as u64,
        },
    );

    let contours = recorder.record(
        Stage::ContourTracing,
        || contour::trace_contours(&dilated),
        |c| StageMetrics::ContourTracing {
            contour_count: c.len(),
            total_point_count: c.iter().map(|c| c.points.len()).sum(),
            largest_area: contour::largest_contour(c).map_or(0.0, Contour::area),
        },
    );

    let largest = contour::largest_contour(&contours)
        .filter(|c| c.area() > 0.0)
        .ok_or(SegmentError::NoFieldDetected)?;

    Ok(recorder.record(
        Stage::FieldFill,
        || fill_field(largest, &element, dimensions),
        |f| StageMetrics::FieldFill {
            field_pixel_count: f.count() as u64,
            total_pixel_count: dimensions.pixel_count() as u64,
        },
    ))
}

/// Fill `outline`, shrink it back by `element`, and keep the largest
/// 4-connected piece.
#[must_use]
pub fn fill_field(outline: &Contour, element: &StructuringElement, dimensions: Dimensions) -> Mask {
    let filled = mask::fill_polygon(&outline.points, dimensions);
    let eroded = morphology::erode(&filled, element);
    let base = if eroded.any() { eroded } else { filled };
    components::largest_component(&base)
}

pub(crate) fn range_metrics(image: &crate::types::ChannelImage) -> StageMetrics {
    let (min, max) = normalize::value_range(image).unwrap_or((0.0, 0.0));
    StageMetrics::Range { min, max }
}
