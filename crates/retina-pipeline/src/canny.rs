//! Canny edge detection on an already-smoothed 8-bit image.
//!
//! Adapted from `imageproc::edges::{canny, non_maximum_suppression,
//! hysteresis}` (imageproc 0.26). Gradients come straight from
//! [`imageproc::gradients`]; the two later stages are local because
//! upstream differs in ways this pipeline cannot use:
//!
//! 1. **No pre-blur**: upstream always applies a sigma 1.4 Gaussian.
//!    Here the caller controls smoothing explicitly.
//! 2. **Non-maximum suppression**: the gradient direction is quantized
//!    to 0/45/90/135 degrees. A pixel survives if it is strictly greater
//!    than the neighbour behind it and at least as large as the one
//!    ahead, so a plateau of equal magnitudes keeps exactly one pixel
//!    instead of two. Border pixels take part, with out-of-image
//!    neighbours read as zero.
//! 3. **Hysteresis**: pixels above `high` seed a walk over all 8
//!    neighbours (upstream visits 6) that accepts any surviving pixel
//!    above `low`. Neighbour coordinates are bounds-checked, so edges
//!    touching the image border are safe
//!    (<https://github.com/image-rs/imageproc/issues/705>).
//!
//! Output pixels are 255 (edge) or 0.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::types::ChannelImage;

type Gradient = Image<Luma<i16>>;

/// Floor applied to both thresholds so a near-zero Otsu level never
/// turns every gradient into an edge.
pub const MIN_THRESHOLD: f32 = 1.0;

/// tan(22.5 degrees)
const TAN_22_5: f32 = 0.414_213_57;
/// tan(67.5 degrees)
const TAN_67_5: f32 = 2.414_213_6;

/// Run Canny edge detection with hysteresis thresholds `low` and `high`.
///
/// `high` is raised to at least [`MIN_THRESHOLD`] and `low` is clamped
/// into `[MIN_THRESHOLD, high]`.
#[must_use = "returns the edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (low, high) = clamp_thresholds(low, high);
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let magnitude = ChannelImage::from_fn(w, h, |x, y| {
        Luma([f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0]))])
    });

    let classes = suppress_non_maxima(&magnitude, &gx, &gy, low, high);
    hysteresis(&classes, w, h)
}

/// Normalize a threshold pair so `MIN_THRESHOLD <= low <= high`.
#[must_use]
pub fn clamp_thresholds(low: f32, high: f32) -> (f32, f32) {
    let high = high.max(MIN_THRESHOLD);
    let low = low.clamp(MIN_THRESHOLD, high);
    (low, high)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    None,
    Weak,
    Strong,
}

fn suppress_non_maxima(
    magnitude: &ChannelImage,
    gx: &Gradient,
    gy: &Gradient,
    low: f32,
    high: f32,
) -> Vec<Class> {
    let (w, h) = magnitude.dimensions();
    let mag = |x: i64, y: i64| -> f32 {
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) if x < w && y < h => magnitude.get_pixel(x, y).0[0],
            _ => 0.0,
        }
    };

    let mut classes = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let m = magnitude.get_pixel(x, y).0[0];
            if m <= low {
                classes.push(Class::None);
                continue;
            }
            let dx = f32::from(gx.get_pixel(x, y).0[0]);
            let dy = f32::from(gy.get_pixel(x, y).0[0]);
            let (ax, ay) = (dx.abs(), dy.abs());

            let ((bx, by), (fx, fy)) = if ay <= ax * TAN_22_5 {
                ((xi - 1, yi), (xi + 1, yi))
            } else if ay > ax * TAN_67_5 {
                ((xi, yi - 1), (xi, yi + 1))
            } else {
                let s = if (dx < 0.0) == (dy < 0.0) { 1 } else { -1 };
                ((xi - s, yi - 1), (xi + s, yi + 1))
            };

            let is_max = m > mag(bx, by) && m >= mag(fx, fy);
            classes.push(match (is_max, m > high) {
                (false, _) => Class::None,
                (true, true) => Class::Strong,
                (true, false) => Class::Weak,
            });
        }
    }
    classes
}

fn hysteresis(classes: &[Class], w: u32, h: u32) -> GrayImage {
    let mut out = GrayImage::new(w, h);
    let index = |x: u32, y: u32| y as usize * w as usize + x as usize;
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if classes[index(x, y)] != Class::Strong || out.get_pixel(x, y).0[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in NEIGHBOURS {
                    let nx = i64::from(cx) + dx;
                    let ny = i64::from(cy) + dy;
                    let (Ok(nx), Ok(ny)) = (u32::try_from(nx), u32::try_from(ny)) else {
                        continue;
                    };
                    if nx >= w || ny >= h {
                        continue;
                    }
                    if classes[index(nx, ny)] != Class::None && out.get_pixel(nx, ny).0[0] == 0 {
                        out.put_pixel(nx, ny, Luma([255]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    /// A bright column one pixel from the left border: hysteresis walks
    /// into x=0 and must not underflow.
    #[test]
    fn border_edge_does_not_panic() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        for y in 0..10 {
            img.put_pixel(1, y, Luma([255]));
        }
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(12, 12, Luma([90]));
        assert_eq!(edge_count(&canny(&img, 1.0, 2.0)), 0);
    }

    #[test]
    fn vertical_step_gives_one_pixel_per_row() {
        let img = GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) });
        let edges = canny(&img, 50.0, 150.0);
        for y in 0..20 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y).0[0] > 0).collect();
            assert_eq!(row, vec![9], "row {y}");
        }
    }

    #[test]
    fn weak_pixels_need_a_strong_neighbour() {
        // Two separate steps: a strong one and a faint one.
        let img = GrayImage::from_fn(30, 10, |x, _y| match x {
            0..10 => Luma([0]),
            10..20 => Luma([200]),
            _ => Luma([210]),
        });
        // Faint step magnitude is 40, strong one 800.
        let edges = canny(&img, 20.0, 500.0);
        assert!(edges.get_pixel(9, 5).0[0] > 0);
        assert_eq!(edges.get_pixel(19, 5).0[0], 0);
    }

    #[test]
    fn weak_pixels_connected_to_strong_ones_survive() {
        // Step height ramps down along the column so the top half is
        // strong and the bottom half only weak.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            if x < 10 { Luma([0]) } else { Luma([if y < 10 { 200 } else { 60 }]) }
        });
        let edges = canny(&img, 100.0, 500.0);
        for y in 0..20 {
            assert!(
                (8..12).any(|x| edges.get_pixel(x, y).0[0] > 0),
                "row {y} lost",
            );
        }
        // The bottom half alone never reaches the high threshold.
        assert!(edges.get_pixel(9, 15).0[0] > 0);
    }

    #[test]
    fn thresholds_are_clamped() {
        assert_eq!(clamp_thresholds(0.0, 0.0), (MIN_THRESHOLD, MIN_THRESHOLD));
        assert_eq!(clamp_thresholds(80.0, 40.0), (40.0, 40.0));
        assert_eq!(clamp_thresholds(20.0, 40.0), (20.0, 40.0));
    }
}
