//! 3x3 Sobel derivatives on floating-point rasters.
//!
//! `imageproc::gradients` only covers 8-bit input, so the float variant
//! runs the same Sobel weights through [`imageproc::filter::filter`].
//! Borders are padded by continuity.

use imageproc::filter::filter;
use imageproc::kernel::Kernel;

use crate::types::ChannelImage;

const SOBEL_X: Kernel<'static, f32> =
    Kernel::new(&[-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0], 3, 3);
const SOBEL_Y: Kernel<'static, f32> =
    Kernel::new(&[-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0], 3, 3);

/// Derivative direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// d/dx: `[-1 0 1]` across, `[1 2 1]` down.
    X,
    /// d/dy: `[1 2 1]` across, `[-1 0 1]` down.
    Y,
}

/// First-order Sobel derivative of `image` along `direction`.
#[must_use]
pub fn sobel(image: &ChannelImage, direction: Direction) -> ChannelImage {
    let kernel = match direction {
        Direction::X => SOBEL_X,
        Direction::Y => SOBEL_Y,
    };
    filter(image, kernel, |v| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_x() -> ChannelImage {
        #[allow(clippy::cast_precision_loss)]
        ChannelImage::from_fn(8, 6, |x, _| image::Luma([x as f32 * 3.0]))
    }

    #[test]
    fn linear_ramp_has_constant_interior_derivative() {
        let gx = sobel(&ramp_x(), Direction::X);
        // Slope 3 per pixel, kernel weight 4, span 2 pixels.
        for y in 0..6 {
            for x in 1..7 {
                assert!((gx.get_pixel(x, y).0[0] - 24.0).abs() < 1e-4);
            }
        }
        let gy = sobel(&ramp_x(), Direction::Y);
        assert!(gy.pixels().all(|p| p.0[0].abs() < 1e-4));
    }

    #[test]
    fn continuity_padding_halves_edge_derivative() {
        let gx = sobel(&ramp_x(), Direction::X);
        assert!((gx.get_pixel(0, 2).0[0] - 12.0).abs() < 1e-4);
        assert!((gx.get_pixel(7, 2).0[0] - 12.0).abs() < 1e-4);
    }

    #[test]
    fn horizontal_step_is_seen_by_y_derivative() {
        let img = ChannelImage::from_fn(5, 6, |_, y| image::Luma([if y < 3 { 0.0 } else { 10.0 }]));
        let gy = sobel(&img, Direction::Y);
        assert!((gy.get_pixel(2, 2).0[0] - 40.0).abs() < 1e-4);
        assert!((gy.get_pixel(2, 3).0[0] - 40.0).abs() < 1e-4);
        assert!(gy.get_pixel(2, 0).0[0].abs() < 1e-4);
    }

    #[test]
    fn matches_imageproc_sobel_on_bytes() {
        let bytes = image::GrayImage::from_fn(9, 7, |x, y| image::Luma([u8::try_from((x * 29 + y * 13) % 256).unwrap_or(0)]));
        let floats = ChannelImage::from_fn(9, 7, |x, y| image::Luma([f32::from(bytes.get_pixel(x, y).0[0])]));
        let gx = sobel(&floats, Direction::X);
        let gy = sobel(&floats, Direction::Y);
        let hx = imageproc::gradients::horizontal_sobel(&bytes);
        let hy = imageproc::gradients::vertical_sobel(&bytes);
        for (x, y, p) in hx.enumerate_pixels() {
            assert!((gx.get_pixel(x, y).0[0] - f32::from(p.0[0])).abs() < 1e-3);
            assert!((gy.get_pixel(x, y).0[0] - f32::from(hy.get_pixel(x, y).0[0])).abs() < 1e-3);
        }
    }
}
