//! Otsu's method on floating-point data.
//!
//! Values are binned into a 256-bin histogram spanning `[min, max]`.
//! The returned level is the center of the bin that maximizes the
//! between-class variance; pixels strictly greater than it belong to the
//! upper class. The first bin wins ties.

use crate::types::{ChannelImage, Dimensions, SegmentError};

/// Number of histogram bins.
pub const BINS: usize = 256;

/// Otsu threshold of every sample in `image`.
///
/// # Errors
///
/// - [`SegmentError::EmptyImage`] if `image` has no pixels.
/// - [`SegmentError::DegenerateThreshold`] if every sample is equal.
pub fn otsu(image: &ChannelImage) -> Result<f32, SegmentError> {
    if image.as_raw().is_empty() {
        return Err(SegmentError::EmptyImage(Dimensions::of(image)));
    }
    otsu_values(image.as_raw())
}

/// Otsu threshold of an arbitrary non-empty sample set.
///
/// # Errors
///
/// - [`SegmentError::EmptyImage`] if `values` is empty.
/// - [`SegmentError::DegenerateThreshold`] if every sample is equal.
pub fn otsu_values(values: &[f32]) -> Result<f32, SegmentError> {
    let Some((min, max)) = range(values) else {
        return Err(SegmentError::EmptyImage(Dimensions::new(0, 0)));
    };
    if min >= max {
        return Err(SegmentError::DegenerateThreshold { value: min });
    }

    let (min, max) = (f64::from(min), f64::from(max));
    #[allow(clippy::cast_precision_loss)]
    let bin_width = (max - min) / BINS as f64;

    let mut counts = [0u64; BINS];
    for &v in values {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bin = (((f64::from(v) - min) / bin_width) as usize).min(BINS - 1);
        counts[bin] += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let centers: Vec<f64> = (0..BINS)
        .map(|i| (i as f64 + 0.5).mul_add(bin_width, min))
        .collect();

    let best = best_split(&counts, &centers);
    #[allow(clippy::cast_possible_truncation)]
    Ok(centers[best] as f32)
}

fn range(values: &[f32]) -> Option<(f32, f32)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Index `i` maximizing `w0(i) * w1(i+1) * (mu0(i) - mu1(i+1))^2`,
/// where class 0 holds bins `0..=i` and class 1 holds bins `i+1..`.
#[allow(clippy::cast_precision_loss)]
fn best_split(counts: &[u64; BINS], centers: &[f64]) -> usize {
    let total_weight: f64 = counts.iter().map(|&c| c as f64).sum();
    let total_mass: f64 = counts
        .iter()
        .zip(centers)
        .map(|(&c, &m)| c as f64 * m)
        .sum();

    let mut best = 0;
    let mut best_variance = f64::NEG_INFINITY;
    let (mut w0, mut mass0) = (0.0, 0.0);
    for i in 0..BINS - 1 {
        w0 += counts[i] as f64;
        mass0 += counts[i] as f64 * centers[i];
        let w1 = total_weight - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }
        let mu0 = mass0 / w0;
        let mu1 = (total_mass - mass0) / w1;
        let variance = w0 * w1 * (mu0 - mu1) * (mu0 - mu1);
        if variance > best_variance {
            best_variance = variance;
            best = i;
        }
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn two_level_data_splits_between_levels() {
        let mut values = vec![10.0f32; 500];
        values.extend(std::iter::repeat_n(200.0f32, 300));
        let t = otsu_values(&values).unwrap();
        assert!(t > 10.0 && t < 200.0, "threshold {t}");
        let above = values.iter().filter(|&&v| v > t).count();
        assert_eq!(above, 300);
    }

    #[test]
    fn two_level_split_is_the_first_bin() {
        // With only the end bins occupied every split is equally good;
        // the first one wins.
        let values = [0.0f32, 0.0, 255.0, 255.0];
        let t = otsu_values(&values).unwrap();
        assert!((t - 255.0 / 512.0).abs() < 1e-4, "threshold {t}");
    }

    #[test]
    fn bimodal_with_noise_lands_in_gap() {
        let mut values = Vec::new();
        for i in 0..100u8 {
            values.push(40.0 + f32::from(i % 10));
            values.push(180.0 + f32::from(i % 10));
        }
        let t = otsu_values(&values).unwrap();
        assert!(t > 45.0 && t < 180.0, "threshold {t}");
    }

    #[test]
    fn constant_data_is_degenerate() {
        let err = otsu_values(&[7.5; 20]).unwrap_err();
        assert_eq!(err, SegmentError::DegenerateThreshold { value: 7.5 });
    }

    #[test]
    fn empty_image_is_rejected() {
        let image = ChannelImage::new(0, 3);
        assert_eq!(otsu(&image).unwrap_err(), SegmentError::EmptyImage(Dimensions::new(0, 3)));
    }

    #[test]
    fn negative_values_are_supported() {
        let mut values = vec![-50.0f32; 40];
        values.extend([30.0f32; 60]);
        let t = otsu_values(&values).unwrap();
        assert!(t > -50.0 && t < 30.0);
    }

    #[test]
    fn image_threshold_matches_value_threshold() {
        let image = ChannelImage::from_fn(8, 8, |x, _| image::Luma([if x < 3 { 1.0 } else { 9.0 }]));
        assert_eq!(otsu(&image).unwrap(), otsu_values(image.as_raw()).unwrap());
    }
}
