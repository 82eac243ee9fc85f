//! sRGB <-> CIE L*a*b* conversion and luma.
//!
//! Lightness is stored as 8 bits (`L * 255 / 100`) so it can go straight
//! through 8-bit histogram equalization. The chroma planes stay in
//! floating point so a lightness-only edit round-trips without
//! quantizing color.

use crate::blur::saturate_u8;
use crate::types::{ChannelImage, GrayImage, RgbImage};

/// D65 reference white.
const D65: [f32; 3] = [0.950_47, 1.0, 1.088_83];

/// Linear sRGB to XYZ (D65).
#[allow(clippy::unreadable_literal)]
const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.119_192, 0.9503041],
];

/// XYZ (D65) to linear sRGB.
#[allow(clippy::unreadable_literal)]
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.969_266, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

const DELTA: f32 = 6.0 / 29.0;

/// An image split into 8-bit lightness and float chroma planes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    /// `L * 255 / 100`, rounded.
    pub lightness: GrayImage,
    /// Green-red axis.
    pub a: ChannelImage,
    /// Blue-yellow axis.
    pub b: ChannelImage,
}

/// Convert an 8-bit sRGB image to [`LabImage`].
#[must_use]
pub fn rgb_to_lab(image: &RgbImage) -> LabImage {
    let (w, h) = image.dimensions();
    let mut lightness = GrayImage::new(w, h);
    let mut a = ChannelImage::new(w, h);
    let mut b = ChannelImage::new(w, h);
    for (x, y, p) in image.enumerate_pixels() {
        let [l, pa, pb] = pixel_to_lab(p.0);
        lightness.put_pixel(x, y, image::Luma([saturate_u8(l * 255.0 / 100.0)]));
        a.put_pixel(x, y, image::Luma([pa]));
        b.put_pixel(x, y, image::Luma([pb]));
    }
    LabImage { lightness, a, b }
}

/// Convert a [`LabImage`] back to 8-bit sRGB.
#[must_use]
pub fn lab_to_rgb(lab: &LabImage) -> RgbImage {
    let (w, h) = lab.lightness.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let l = f32::from(lab.lightness.get_pixel(x, y).0[0]) * 100.0 / 255.0;
        let a = lab.a.get_pixel(x, y).0[0];
        let b = lab.b.get_pixel(x, y).0[0];
        image::Rgb(lab_to_pixel([l, a, b]))
    })
}

/// Perceptual luma `0.299 R + 0.587 G + 0.114 B`, unquantized.
#[must_use]
pub fn luma(image: &RgbImage) -> ChannelImage {
    let (w, h) = image.dimensions();
    ChannelImage::from_fn(w, h, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(f32::from);
        image::Luma([0.114f32.mul_add(b, 0.299f32.mul_add(r, 0.587 * g))])
    })
}

fn pixel_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let linear = rgb.map(|c| srgb_to_linear(f32::from(c) / 255.0));
    let xyz = mat_mul(&SRGB_TO_XYZ, linear);
    let [fx, fy, fz] = [0, 1, 2].map(|i| lab_f(xyz[i] / D65[i]));
    [116.0f32.mul_add(fy, -16.0), 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_to_pixel([l, a, b]: [f32; 3]) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let f = [fy + a / 500.0, fy, fy - b / 200.0];
    let xyz = [0, 1, 2].map(|i| lab_f_inv(f[i]) * D65[i]);
    mat_mul(&XYZ_TO_SRGB, xyz).map(|c| saturate_u8(linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0))
}

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    m.map(|row| row[2].mul_add(v[2], row[1].mul_add(v[1], row[0] * v[0])))
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055f32.mul_add(c.powf(1.0 / 2.4), -0.055)
    }
}

fn lab_f(t: f32) -> f32 {
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    if f > DELTA {
        f * f * f
    } else {
        3.0 * DELTA * DELTA * (f - 4.0 / 29.0)
    }
}
