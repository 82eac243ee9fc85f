//! Connected-component filtering of binary masks.
//!
//! Labelling is delegated to `imageproc::region_labelling` with
//! 4-connectivity: diagonal neighbours do not join components.

use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::Mask;

/// Per-pixel component labels (0 = background) and the pixel count of
/// every label, indexed by label.
fn label(mask: &Mask) -> (Vec<u32>, Vec<u32>) {
    let labels = connected_components(&mask.to_gray(), Connectivity::Four, image::Luma([0u8]));
    let labels = labels.into_raw();
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut sizes = vec![0u32; max_label + 1];
    for &l in &labels {
        sizes[l as usize] += 1;
    }
    sizes[0] = 0;
    (labels, sizes)
}

/// Number of 4-connected foreground components.
#[must_use]
pub fn count_components(mask: &Mask) -> usize {
    let (_, sizes) = label(mask);
    sizes.iter().filter(|&&s| s > 0).count()
}

/// Drop every 4-connected component with fewer than `min_area` pixels.
///
/// Components of exactly `min_area` pixels are kept. `min_area <= 1`
/// keeps everything.
#[must_use = "returns the filtered mask"]
pub fn remove_small_objects(mask: &Mask, min_area: u32) -> Mask {
    if min_area <= 1 || !mask.any() {
        return mask.clone();
    }
    let (labels, sizes) = label(mask);
    let data = labels
        .iter()
        .map(|&l| l != 0 && sizes[l as usize] >= min_area)
        .collect();
    Mask::from_vec(mask.width(), mask.height(), data).unwrap_or_else(|| mask.clone())
}

/// Keep only the largest 4-connected component. The lowest label wins
/// ties. An empty mask is returned unchanged.
#[must_use = "returns the filtered mask"]
pub fn largest_component(mask: &Mask) -> Mask {
    let (labels, sizes) = label(mask);
    let Some((best, _)) = sizes
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &s)| s > 0)
        .fold(None, |acc: Option<(usize, u32)>, (l, &s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((l, s)),
        })
    else {
        return mask.clone();
    };
    let data = labels.iter().map(|&l| l as usize == best).collect();
    Mask::from_vec(mask.width(), mask.height(), data).unwrap_or_else(|| mask.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three blobs: 1 pixel, 4 pixels (2x2), 9 pixels (3x3).
    fn blobs() -> Mask {
        Mask::from_fn(12, 5, |x, y| {
            (x == 0 && y == 0)
                || ((3..5).contains(&x) && (1..3).contains(&y))
                || ((7..10).contains(&x) && (1..4).contains(&y))
        })
    }

    #[test]
    fn counts_components() {
        assert_eq!(count_components(&blobs()), 3);
        assert_eq!(count_components(&Mask::new(4, 4)), 0);
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mask = Mask::from_fn(2, 2, |x, y| x == y);
        assert_eq!(count_components(&mask), 2);
    }

    #[test]
    fn removes_components_below_min_area() {
        let kept = remove_small_objects(&blobs(), 4);
        assert_eq!(kept.count(), 13);
        assert!(!kept.get(0, 0));
        assert!(kept.get(3, 1));
    }

    #[test]
    fn min_area_one_keeps_everything() {
        assert_eq!(remove_small_objects(&blobs(), 1), blobs());
    }

    #[test]
    fn larger_min_area_never_keeps_more() {
        let mask = blobs();
        let mut previous = mask.count();
        for min_area in [2, 4, 5, 9, 10] {
            let kept = remove_small_objects(&mask, min_area).count();
            assert!(kept <= previous);
            previous = kept;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn largest_component_keeps_biggest_blob() {
        let largest = largest_component(&blobs());
        assert_eq!(largest.count(), 9);
        assert!(largest.get(8, 2));
    }

    #[test]
    fn largest_component_of_empty_mask_is_empty() {
        let empty = Mask::new(3, 3);
        assert_eq!(largest_component(&empty), empty);
    }
}
