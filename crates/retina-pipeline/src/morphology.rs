//! Binary morphology with rectangular, cross and elliptical elements.
//!
//! Element construction lives here; the operations run through
//! [`imageproc::morphology`] on the 0/255 rendering of the mask. Pixels
//! outside the image are ignored: they neither grow a dilation nor
//! shrink an erosion.

use image::Luma;
use imageproc::morphology::{Mask as Footprint, grayscale_dilate, grayscale_erode};
use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, Mask};

/// Largest element side `imageproc` accepts.
pub const MAX_ELEMENT_SIZE: u32 = 511;

/// Structuring element shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementShape {
    /// Filled ellipse inscribed in the element box.
    #[default]
    Ellipse,
    /// Every cell of the element box.
    Rect,
    /// Center row plus center column.
    Cross,
}

/// A structuring element with its anchor at `(width / 2, height / 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    cells: GrayImage,
    anchor: (u32, u32),
    footprint: Footprint,
}

impl StructuringElement {
    /// Build an element of the given shape. Sides are clamped to
    /// `1..=MAX_ELEMENT_SIZE`.
    #[must_use]
    pub fn new(shape: ElementShape, width: u32, height: u32) -> Self {
        let width = width.clamp(1, MAX_ELEMENT_SIZE);
        let height = height.clamp(1, MAX_ELEMENT_SIZE);
        let anchor = (width / 2, height / 2);

        // A one-cell-thick ellipse is a line.
        let shape = if shape == ElementShape::Ellipse && (width == 1 || height == 1) {
            ElementShape::Rect
        } else {
            shape
        };

        let rows: Vec<Option<(u32, u32)>> = (0..height)
            .map(|row| match shape {
                ElementShape::Rect => Some((0, width)),
                ElementShape::Cross if row == anchor.1 => Some((0, width)),
                ElementShape::Cross => Some((anchor.0, anchor.0 + 1)),
                ElementShape::Ellipse => ellipse_row(row, width, height),
            })
            .collect();
        let cells = GrayImage::from_fn(width, height, |x, y| {
            let active = rows[y as usize].is_some_and(|(start, end)| (start..end).contains(&x));
            Luma([if active { 255 } else { 0 }])
        });

        // Both anchor coordinates are at most MAX_ELEMENT_SIZE / 2.
        let footprint = Footprint::from_image(
            &cells,
            u8::try_from(anchor.0).unwrap_or(u8::MAX),
            u8::try_from(anchor.1).unwrap_or(u8::MAX),
        );

        Self {
            cells,
            anchor,
            footprint,
        }
    }

    /// Square elliptical element of side `size`.
    #[must_use]
    pub fn ellipse(size: u32) -> Self {
        Self::new(ElementShape::Ellipse, size, size)
    }

    /// Square rectangular element of side `size`.
    #[must_use]
    pub fn rect(size: u32) -> Self {
        Self::new(ElementShape::Rect, size, size)
    }

    /// Square cross-shaped element of side `size`.
    #[must_use]
    pub fn cross(size: u32) -> Self {
        Self::new(ElementShape::Cross, size, size)
    }

    /// Element box width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.cells.width()
    }

    /// Element box height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.cells.height()
    }

    /// Anchor cell `(column, row)`.
    #[must_use]
    pub const fn anchor(&self) -> (u32, u32) {
        self.anchor
    }

    /// Whether cell `(column, row)` of the element box is active.
    #[must_use]
    pub fn contains(&self, column: u32, row: u32) -> bool {
        self.cells
            .get_pixel_checked(column, row)
            .is_some_and(|p| p.0[0] != 0)
    }

    /// Number of active cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.as_raw().iter().filter(|&&v| v != 0).count()
    }
}

/// Column run `[start, end)` of one row of an ellipse inscribed in a
/// `width` x `height` box, using the same integer rounding as common
/// vision libraries.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn ellipse_row(row: u32, width: u32, height: u32) -> Option<(u32, u32)> {
    let r = i64::from(height / 2);
    let c = i64::from(width / 2);
    let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
    let dy = i64::from(row) - r;
    if dy.abs() > r {
        return None;
    }
    let dx = ((c as f64) * ((r * r - dy * dy) as f64 * inv_r2).sqrt()).round() as i64;
    let start = (c - dx).max(0);
    let end = (c + dx + 1).min(i64::from(width));
    (start < end).then(|| {
        (
            u32::try_from(start).unwrap_or(0),
            u32::try_from(end).unwrap_or(width),
        )
    })
}

fn apply(mask: &Mask, op: impl Fn(&GrayImage) -> GrayImage) -> Mask {
    if mask.dimensions().is_empty() {
        return mask.clone();
    }
    Mask::from_gray(&op(&mask.to_gray()))
}

/// Set every pixel whose element neighbourhood touches a `true` pixel.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &Mask, element: &StructuringElement) -> Mask {
    apply(mask, |image| grayscale_dilate(image, &element.footprint))
}

/// Keep only pixels whose whole (in-image) element neighbourhood is `true`.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &Mask, element: &StructuringElement) -> Mask {
    apply(mask, |image| grayscale_erode(image, &element.footprint))
}

/// Erosion followed by dilation: removes features smaller than the element.
#[must_use = "returns the opened mask"]
pub fn open(mask: &Mask, element: &StructuringElement) -> Mask {
    dilate(&erode(mask, element), element)
}

/// Dilation followed by erosion: fills gaps smaller than the element.
#[must_use = "returns the closed mask"]
pub fn close(mask: &Mask, element: &StructuringElement) -> Mask {
    erode(&dilate(mask, element), element)
}
