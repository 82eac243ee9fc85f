//! Polygon rasterization: turn a traced contour into a filled mask.
//!
//! Filling goes through [`imageproc::drawing::draw_polygon_mut`], which
//! fills the even-odd interior and then strokes every edge, so the
//! contour pixels themselves are always included.

use image::Luma;
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::types::{Dimensions, GrayImage, Mask};

/// Rasterize the closed polygon `points` into a mask of `dimensions`.
///
/// Points outside the raster are clipped. An empty point list yields an
/// all-`false` mask.
#[must_use]
pub fn fill_polygon(points: &[Point<i32>], dimensions: Dimensions) -> Mask {
    if dimensions.is_empty() {
        return Mask::new(dimensions.width, dimensions.height);
    }
    let mut canvas = GrayImage::new(dimensions.width, dimensions.height);
    match points {
        [] => {}
        // imageproc strokes edges only, and a lone point has none.
        [p] => {
            if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y)) {
                if x < dimensions.width && y < dimensions.height {
                    canvas.put_pixel(x, y, Luma([255]));
                }
            }
        }
        _ => draw_polygon_mut(&mut canvas, points, Luma([255])),
    }
    Mask::from_gray(&canvas)
}
