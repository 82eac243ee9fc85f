//! Gaussian blur with an explicit kernel size and sigma.
//!
//! Builds the 1-D kernel here and hands it to
//! [`imageproc::filter::separable_filter_equal`], which pads by
//! continuity. `imageproc::filter::gaussian_blur_f32` derives its own
//! kernel length from sigma, so it cannot honor a configured size.
//!
//! [`gaussian_blur`] operates on a single floating-point channel.
//! [`gaussian_blur_rgb`] applies the same blur independently to each
//! R/G/B channel of a color image and rounds back to 8 bits.

use imageproc::filter::separable_filter_equal;

use crate::types::{ChannelImage, RgbImage};

/// Sigma implied by a kernel size when the caller passes `sigma == 0`.
#[must_use]
pub fn default_sigma(kernel_size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let ks = kernel_size as f32;
    0.3f32.mul_add((ks - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian weights of length `kernel_size`.
///
/// A non-positive `sigma` is replaced by [`default_sigma`]. A kernel
/// size of 0 is treated as 1 (identity).
#[must_use]
pub fn gaussian_kernel(kernel_size: u32, sigma: f32) -> Vec<f32> {
    let ks = kernel_size.max(1);
    let sigma = if sigma > 0.0 { sigma } else { default_sigma(ks) };
    #[allow(clippy::cast_precision_loss)]
    let center = (ks - 1) as f64 / 2.0;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);

    let raw: Vec<f64> = (0..ks)
        .map(|i| {
            let d = f64::from(i) - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();

    #[allow(clippy::cast_possible_truncation)]
    raw.iter().map(|w| (w / sum) as f32).collect()
}

/// Apply a `kernel_size` x `kernel_size` Gaussian blur to one channel.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &ChannelImage, kernel_size: u32, sigma: f32) -> ChannelImage {
    let kernel = gaussian_kernel(kernel_size, sigma);
    if kernel.len() == 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    separable_filter_equal(image, &kernel)
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently, rounding the result to the nearest 8-bit value.
#[must_use = "returns the blurred RGB image"]
pub fn gaussian_blur_rgb(image: &RgbImage, kernel_size: u32, sigma: f32) -> RgbImage {
    let (w, h) = image.dimensions();

    let blurred: [ChannelImage; 3] = std::array::from_fn(|c| {
        let channel = ChannelImage::from_fn(w, h, |x, y| {
            image::Luma([f32::from(image.get_pixel(x, y).0[c])])
        });
        gaussian_blur(&channel, kernel_size, sigma)
    });

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb(std::array::from_fn(|c| {
            saturate_u8(blurred[c].get_pixel(x, y).0[0])
        }))
    })
}

/// Round and clamp a float sample into the 8-bit range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn saturate_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp 0-to-255 boundary at x=5.
    fn sharp_edge_image() -> ChannelImage {
        ChannelImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0.0])
            } else {
                image::Luma([255.0])
            }
        })
    }

    #[test]
    fn default_sigma_matches_kernel_size_rule() {
        assert!((default_sigma(3) - 0.8).abs() < 1e-6);
        assert!((default_sigma(5) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(7, 1.5);
        assert_eq!(k.len(), 7);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
        for i in 0..3 {
            assert!((k[i] - k[6 - i]).abs() < 1e-7);
        }
        assert!(k[3] > k[2]);
    }

    #[test]
    fn huge_sigma_approaches_box_filter() {
        let k = gaussian_kernel(5, 10.0);
        for w in &k {
            assert!((w - 0.2).abs() < 0.01, "weight {w} not near 0.2");
        }
    }

    #[test]
    fn kernel_size_one_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 1, 3.0), img);
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = ChannelImage::new(17, 31);
        let blurred = gaussian_blur(&img, 5, 1.4);
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let img = sharp_edge_image();
        let blurred = gaussian_blur(&img, 5, 2.0);

        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(left_of_edge > 0.0, "got {left_of_edge}");
        assert!(right_of_edge < 255.0, "got {right_of_edge}");
        // Far from the edge nothing changes.
        assert!(blurred.get_pixel(0, 5).0[0].abs() < 1e-3);
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = ChannelImage::from_pixel(10, 10, image::Luma([128.0]));
        let blurred = gaussian_blur(&img, 5, 0.0);
        for pixel in blurred.pixels() {
            assert!((pixel.0[0] - 128.0).abs() < 1e-3, "got {}", pixel.0[0]);
        }
    }

    #[test]
    fn border_is_padded_by_continuity() {
        // Bright first column, dark elsewhere: the samples left of x=0
        // repeat the bright column.
        let img = ChannelImage::from_fn(8, 6, |x, _| image::Luma([if x == 0 { 100.0 } else { 0.0 }]));
        let k = gaussian_kernel(5, 1.0);
        let blurred = gaussian_blur(&img, 5, 1.0);
        let expected = 100.0 * (k[0] + k[1] + k[2]);
        let got = blurred.get_pixel(0, 3).0[0];
        assert!((got - expected).abs() < 1e-3, "got {got}, expected {expected}");
    }

    #[test]
    fn kernel_larger_than_image_does_not_panic() {
        let img = ChannelImage::from_fn(2, 2, |x, y| image::Luma([f32::from(u8::try_from(x + y).unwrap_or(0))]));
        let blurred = gaussian_blur(&img, 9, 0.0);
        assert_eq!(blurred.dimensions(), (2, 2));
    }

    // ─────── gaussian_blur_rgb tests ────────────────────────────

    #[test]
    fn rgb_uniform_unchanged_by_blur() {
        let img = RgbImage::from_pixel(10, 10, image::Rgb([100, 150, 200]));
        let blurred = gaussian_blur_rgb(&img, 5, 1.3);
        assert_eq!(img, blurred);
    }

    #[test]
    fn rgb_blur_smooths_sharp_color_edge() {
        let img = RgbImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 255])
            }
        });
        let blurred = gaussian_blur_rgb(&img, 5, 2.0);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left < 255, "expected red to decrease near boundary, got {left}");
        assert!(right > 0, "expected red to increase near boundary, got {right}");
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn rgb_blur_matches_per_channel_blur() {
        let img = RgbImage::from_fn(10, 10, |x, y| {
            image::Rgb([
                ((x * 25) % 256) as u8,
                ((y * 30) % 256) as u8,
                (((x + y) * 20) % 256) as u8,
            ])
        });
        let rgb_blurred = gaussian_blur_rgb(&img, 5, 1.4);

        let (w, h) = img.dimensions();
        for c in 0..3 {
            let chan = ChannelImage::from_fn(w, h, |x, y| {
                image::Luma([f32::from(img.get_pixel(x, y).0[c])])
            });
            let chan_blurred = gaussian_blur(&chan, 5, 1.4);
            for y in 0..h {
                for x in 0..w {
                    assert_eq!(
                        rgb_blurred.get_pixel(x, y).0[c],
                        saturate_u8(chan_blurred.get_pixel(x, y).0[0]),
                        "mismatch at ({x},{y}) channel {c}",
                    );
                }
            }
        }
    }
}
