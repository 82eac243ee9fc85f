//! Linear intensity rescaling and 8-bit quantization.

use crate::types::{ChannelImage, GrayImage};

/// Linearly map `image` so its minimum becomes `lo` and its maximum `hi`.
///
/// A constant image has no range to stretch; every sample maps to `lo`.
#[must_use = "returns the rescaled image"]
pub fn min_max_scale(image: &ChannelImage, lo: f32, hi: f32) -> ChannelImage {
    let (min, max) = value_range(image).unwrap_or((0.0, 0.0));
    let span = max - min;
    let scale = if span > 0.0 { (hi - lo) / span } else { 0.0 };
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = (p.0[0] - min).mul_add(scale, lo);
    }
    out
}

/// Smallest and largest sample, or `None` for an empty image.
#[must_use]
pub fn value_range(image: &ChannelImage) -> Option<(f32, f32)> {
    image.as_raw().iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Quantize to 8 bits by clamping into `[0, 255]` and truncating the
/// fractional part.
#[must_use]
pub fn to_gray_truncated(image: &ChannelImage) -> GrayImage {
    let (w, h) = image.dimensions();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    GrayImage::from_fn(w, h, |x, y| {
        image::Luma([image.get_pixel(x, y).0[0].clamp(0.0, 255.0) as u8])
    })
}
