//! Hessian ridge filter.
//!
//! Second derivatives are taken by applying the 3x3 Sobel operator
//! twice: `xx = Sx(Sx(I))`, `xy = Sy(Sx(I))`, `yy = Sy(Sy(I))`. The Hessian eigenvalues at each pixel are
//!
//! ```text
//! lambda = (xx + yy +/- sqrt((xx - yy)^2 + 4 xy^2)) / 2
//! ```
//!
//! Across a thin dark line on a brighter field, intensity curves
//! upward, so the larger eigenvalue is strongly positive at the line
//! center. A thin bright line gives a strongly negative smaller
//! eigenvalue. [`RidgePolarity`] selects which of the two the filter
//! reports.

use serde::{Deserialize, Serialize};

use crate::gradient::{Direction, sobel};
use crate::types::ChannelImage;

/// Which ridges the filter responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RidgePolarity {
    /// Dark lines on a bright background: `max(lambda_max, 0)`.
    Dark,
    /// Bright lines on a dark background: `max(-lambda_min, 0)`.
    Bright,
    /// Either: `max(|lambda_min|, |lambda_max|)`.
    #[default]
    Both,
}

/// Per-pixel ridge strength of `image`. Output is non-negative.
#[must_use = "returns the ridge response"]
pub fn ridge_filter(image: &ChannelImage, polarity: RidgePolarity) -> ChannelImage {
    let dx = sobel(image, Direction::X);
    let dy = sobel(image, Direction::Y);
    let xx = sobel(&dx, Direction::X);
    let xy = sobel(&dx, Direction::Y);
    let yy = sobel(&dy, Direction::Y);

    let (w, h) = image.dimensions();
    ChannelImage::from_fn(w, h, |x, y| {
        let (lambda_min, lambda_max) = hessian_eigenvalues(
            xx.get_pixel(x, y).0[0],
            xy.get_pixel(x, y).0[0],
            yy.get_pixel(x, y).0[0],
        );
        let response = match polarity {
            RidgePolarity::Dark => lambda_max.max(0.0),
            RidgePolarity::Bright => (-lambda_min).max(0.0),
            RidgePolarity::Both => lambda_min.abs().max(lambda_max.abs()),
        };
        image::Luma([response])
    })
}

/// Eigenvalues `(min, max)` of the symmetric matrix `[[xx, xy], [xy, yy]]`.
#[must_use]
pub fn hessian_eigenvalues(xx: f32, xy: f32, yy: f32) -> (f32, f32) {
    let mean = (xx + yy) / 2.0;
    let root = ((xx - yy) / 2.0).hypot(xy);
    (mean - root, mean + root)
}
