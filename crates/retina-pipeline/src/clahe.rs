//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is split into a `tiles_x` x `tiles_y` grid. When the grid
//! does not divide the image evenly the image is first extended on the
//! right and bottom by mirroring without repeating the edge sample
//! (`dcb|abcd|cba`). Each tile gets its own
//! clipped, equalized lookup table, and every output pixel bilinearly
//! blends the tables of the four nearest tile centers.
//!
//! Clipping: the per-bin limit is `max(clip_limit * tile_area / 256, 1)`
//! (truncated). Excess counts are spread evenly over all bins, and the
//! remainder one count at a time at a regular stride.

use crate::blur::saturate_u8;
use crate::types::GrayImage;

const BINS: usize = 256;

/// Apply CLAHE to an 8-bit image.
///
/// A non-positive `clip_limit` disables clipping (plain adaptive
/// equalization). Zero grid sizes are treated as 1.
#[must_use = "returns the equalized image"]
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let tiles_x = tiles_x.max(1);
    let tiles_y = tiles_y.max(1);

    // Both axes are extended whenever either one is uneven.
    let uneven = w % tiles_x != 0 || h % tiles_y != 0;
    let (tile_w, tile_h) = if uneven {
        (
            (w + tiles_x - w % tiles_x) / tiles_x,
            (h + tiles_y - h % tiles_y) / tiles_y,
        )
    } else {
        (w / tiles_x, h / tiles_y)
    };
    let tile_area = u64::from(tile_w) * u64::from(tile_h);

    let clip = (clip_limit > 0.0).then(|| {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let limit = (clip_limit * tile_area as f32 / BINS as f32) as u64;
        limit.max(1)
    });

    let luts: Vec<[u8; BINS]> = (0..tiles_y)
        .flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            let mut hist = [0u64; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect101(y, h);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect101(x, w);
                    hist[usize::from(image.get_pixel(sx, sy).0[0])] += 1;
                }
            }
            if let Some(limit) = clip {
                clip_histogram(&mut hist, limit);
            }
            equalization_lut(&hist, tile_area)
        })
        .collect();

    let lut_at = |tx: u32, ty: u32, v: u8| -> f32 {
        f32::from(luts[(ty * tiles_x + tx) as usize][usize::from(v)])
    };
    #[allow(clippy::cast_precision_loss)]
    let (inv_tw, inv_th) = (1.0 / tile_w as f32, 1.0 / tile_h as f32);

    GrayImage::from_fn(w, h, |x, y| {
        let v = image.get_pixel(x, y).0[0];
        #[allow(clippy::cast_precision_loss)]
        let (txf, tyf) = ((x as f32).mul_add(inv_tw, -0.5), (y as f32).mul_add(inv_th, -0.5));
        let (tx1, tx2, xa) = neighbours(txf, tiles_x);
        let (ty1, ty2, ya) = neighbours(tyf, tiles_y);

        let top = lut_at(tx1, ty1, v).mul_add(1.0 - xa, lut_at(tx2, ty1, v) * xa);
        let bottom = lut_at(tx1, ty2, v).mul_add(1.0 - xa, lut_at(tx2, ty2, v) * xa);
        image::Luma([saturate_u8(top.mul_add(1.0 - ya, bottom * ya))])
    })
}

/// The two tiles whose centers bracket tile coordinate `t`, clamped to
/// the grid, and the blend weight of the second one.
#[allow(clippy::cast_possible_truncation)]
fn neighbours(t: f32, tiles: u32) -> (u32, u32, f32) {
    let floor = t.floor();
    let weight = t - floor;
    let lo = floor as i64;
    let last = i64::from(tiles - 1);
    let first = u32::try_from(lo.clamp(0, last)).unwrap_or(0);
    let second = u32::try_from((lo + 1).clamp(0, last)).unwrap_or(0);
    (first, second, weight)
}

/// Fold an index past the end of `0..len` back inside without repeating
/// the edge sample.
fn reflect101(i: u32, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i % period;
    if m < len { m } else { period - m }
}

/// Clip every bin at `limit` and redistribute the excess.
fn clip_histogram(hist: &mut [u64; BINS], limit: u64) {
    let mut excess: u64 = 0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let bins = BINS as u64;
    let batch = excess / bins;
    let residual = excess - batch * bins;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual != 0 {
        let step = (bins / residual).max(1);
        let mut left = residual;
        let mut i = 0usize;
        while i < BINS && left > 0 {
            hist[i] += 1;
            left -= 1;
            i += usize::try_from(step).unwrap_or(1);
        }
    }
}

/// Cumulative histogram scaled so a full tile maps to 255.
fn equalization_lut(hist: &[u64; BINS], tile_area: u64) -> [u8; BINS] {
    #[allow(clippy::cast_precision_loss)]
    let scale = 255.0 / tile_area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u64;
    for (out, &count) in lut.iter_mut().zip(hist) {
        sum += count;
        #[allow(clippy::cast_precision_loss)]
        let value = sum as f32 * scale;
        *out = saturate_u8(value);
    }
    lut
}
