//! Projection of RGB pixels onto their principal color axis.
//!
//! Every pixel is treated as a point in RGB space. The axis of greatest
//! variance is the eigenvector of the 3x3 covariance matrix with the
//! largest eigenvalue. In a fundus photograph that axis separates the
//! bright retinal field from the dark surround, which is all the
//! background stage needs.
//!
//! Eigenvectors have no inherent sign, so the projection is oriented
//! deterministically:
//!
//! 1. the axis is flipped so its components sum to a non-negative value;
//! 2. the projection is then negated if the mean projection along the
//!    image frame (first/last row and column) exceeds the global mean,
//!    so the usually-dark surround always projects low.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::types::{ChannelImage, RgbImage};

/// Result of [`project`].
#[derive(Debug, Clone)]
pub struct Projection {
    /// Per-pixel coordinate along the principal axis (centered on the
    /// mean color).
    pub image: ChannelImage,
    /// Unit principal axis in RGB space, after orientation.
    pub axis: [f32; 3],
    /// Fraction of the total color variance along `axis`, in `[0, 1]`.
    pub explained_variance_ratio: f32,
    /// Whether the frame rule negated the projection.
    pub flipped: bool,
}

/// Reduce an RGB image to one channel by principal component analysis.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn project(image: &RgbImage) -> Projection {
    let (w, h) = image.dimensions();
    let n = (w as usize * h as usize).max(1) as f64;

    let mut mean = Vector3::<f64>::zeros();
    for p in image.pixels() {
        mean += color(p);
    }
    mean /= n;

    let mut covariance = Matrix3::<f64>::zeros();
    for p in image.pixels() {
        let d = color(p) - mean;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = SymmetricEigen::new(covariance);
    let (largest, &lambda) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &0.0));
    let mut axis: Vector3<f64> = eigen.eigenvectors.column(largest).into_owned();
    if axis.sum() < 0.0 {
        axis = -axis;
    }

    let trace = covariance.trace();
    let explained_variance_ratio = if trace > 0.0 { (lambda / trace) as f32 } else { 0.0 };

    let mut projected = ChannelImage::from_fn(w, h, |x, y| {
        image::Luma([(color(image.get_pixel(x, y)) - mean).dot(&axis) as f32])
    });

    let flipped = frame_mean(&projected) > global_mean(&projected);
    if flipped {
        axis = -axis;
        for p in projected.pixels_mut() {
            p.0[0] = -p.0[0];
        }
    }

    Projection {
        image: projected,
        axis: [axis.x as f32, axis.y as f32, axis.z as f32],
        explained_variance_ratio,
        flipped,
    }
}

fn color(p: &image::Rgb<u8>) -> Vector3<f64> {
    Vector3::new(f64::from(p.0[0]), f64::from(p.0[1]), f64::from(p.0[2]))
}

#[allow(clippy::cast_precision_loss)]
fn global_mean(image: &ChannelImage) -> f64 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    raw.iter().map(|&v| f64::from(v)).sum::<f64>() / raw.len() as f64
}

/// Mean over pixels on the outermost rows and columns.
fn frame_mean(image: &ChannelImage) -> f64 {
    let (w, h) = image.dimensions();
    let mut sum = 0.0;
    let mut count = 0u32;
    for (x, y, p) in image.enumerate_pixels() {
        if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            sum += f64::from(p.0[0]);
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark frame around a bright reddish disk.
    fn fundus_like() -> RgbImage {
        RgbImage::from_fn(40, 40, |x, y| {
            let dx = f64::from(x) - 19.5;
            let dy = f64::from(y) - 19.5;
            if dx.hypot(dy) < 15.0 {
                image::Rgb([200, 90, 40])
            } else {
                image::Rgb([5, 3, 2])
            }
        })
    }

    #[test]
    fn field_projects_above_surround() {
        let p = project(&fundus_like());
        let inside = p.image.get_pixel(20, 20).0[0];
        let outside = p.image.get_pixel(0, 0).0[0];
        assert!(inside > outside, "inside {inside} outside {outside}");
    }

    #[test]
    fn inverted_image_keeps_surround_low() {
        let mut img = fundus_like();
        for p in img.pixels_mut() {
            p.0 = p.0.map(|c| 255 - c);
        }
        let p = project(&img);
        assert!(p.flipped);
        assert!(p.image.get_pixel(20, 20).0[0] > p.image.get_pixel(0, 0).0[0]);
    }

    #[test]
    fn axis_is_unit_length() {
        let p = project(&fundus_like());
        let norm = p.axis.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn two_color_image_is_fully_explained() {
        let p = project(&fundus_like());
        assert!(p.explained_variance_ratio > 0.99, "{}", p.explained_variance_ratio);
    }

    #[test]
    fn constant_image_projects_to_zero() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([50, 60, 70]));
        let p = project(&img);
        assert!(p.image.pixels().all(|v| v.0[0].abs() < 1e-6));
        assert!(p.explained_variance_ratio.abs() < f32::EPSILON);
    }

    #[test]
    fn projection_is_centered() {
        let p = project(&fundus_like());
        assert!(global_mean(&p.image).abs() < 1e-3);
    }
}
