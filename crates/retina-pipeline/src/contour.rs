//! Contour tracing: extract closed pixel borders from a binary mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use.
//!
//! Background extraction only needs the outline of the largest enclosed
//! region, so every contour also reports its polygon [`area`](Contour::area)
//! and [`largest_contour`] picks the winner.

use imageproc::contours::BorderType;
use imageproc::point::Point;

use crate::types::Mask;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (`true` = foreground).
/// Output: every traced border, outer borders and hole borders alike.
pub trait ContourTracer {
    /// Trace contours in the given mask.
    fn trace(&self, mask: &Mask) -> Vec<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &Mask) -> Vec<Contour> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

/// A closed border as a cyclic list of pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Border pixels in tracing order. The last point connects back to
    /// the first.
    pub points: Vec<Point<i32>>,
    /// `true` for the outer border of a foreground region, `false` for
    /// the border of a hole inside one.
    pub is_outer: bool,
    /// Index of the enclosing contour in the traced list, if any.
    pub parent: Option<usize>,
}

impl Contour {
    /// Absolute polygon area by the shoelace formula.
    ///
    /// Contours with fewer than three points, or whose points are all
    /// collinear, have zero area.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let area = twice.unsigned_abs() as f64 / 2.0;
        area
    }
}

/// Trace every border in `mask` with the default tracer.
#[must_use]
pub fn trace_contours(mask: &Mask) -> Vec<Contour> {
    ContourTracerKind::default().trace(mask)
}

/// The contour with the greatest [`area`](Contour::area). The earliest
/// contour wins ties. Returns `None` for an empty slice.
#[must_use]
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    contours.iter().fold(None, |best: Option<(&Contour, f64)>, c| {
        let area = c.area();
        match best {
            Some((_, best_area)) if best_area >= area => best,
            _ => Some((c, area)),
        }
    })
    .map(|(c, _)| c)
}

fn trace_border_following(mask: &Mask) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<i32>> =
        imageproc::contours::find_contours(&mask.to_gray());

    contours
        .into_iter()
        .map(|c| Contour {
            points: c.points,
            is_outer: c.border_type == BorderType::Outer,
            parent: c.parent,
        })
        .collect()
}
