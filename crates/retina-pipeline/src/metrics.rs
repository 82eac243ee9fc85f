//! Pixel-wise agreement between a predicted mask and ground truth.

use serde::{Deserialize, Serialize};

use crate::types::{Mask, SegmentError};

/// Counts of the four prediction outcomes over every pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Predicted `true`, actually `true`.
    pub true_positive: u64,
    /// Predicted `true`, actually `false`.
    pub false_positive: u64,
    /// Predicted `false`, actually `true`.
    pub false_negative: u64,
    /// Predicted `false`, actually `false`.
    pub true_negative: u64,
}

impl ConfusionMatrix {
    /// Tally `predicted` against `truth` element by element.
    ///
    /// Only the total element count has to agree: both masks are
    /// compared as flat row-major sequences.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ShapeMismatch`] if the element counts differ.
    pub fn from_masks(predicted: &Mask, truth: &Mask) -> Result<Self, SegmentError> {
        if predicted.len() != truth.len() {
            return Err(SegmentError::ShapeMismatch {
                expected: truth.dimensions(),
                actual: predicted.dimensions(),
            });
        }
        let mut m = Self::default();
        for (&p, &t) in predicted.as_slice().iter().zip(truth.as_slice()) {
            match (p, t) {
                (true, true) => m.true_positive += 1,
                (true, false) => m.false_positive += 1,
                (false, true) => m.false_negative += 1,
                (false, false) => m.true_negative += 1,
            }
        }
        Ok(m)
    }

    /// Total number of pixels tallied.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }

    /// `TP / (TP + FP)`, or 0 when nothing was predicted positive.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// `TP / (TP + FN)`, or 0 when the truth has no positives.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// `TN / (TN + FP)`, or 0 when the truth has no negatives.
    #[must_use]
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    /// `(TP + TN) / total`, or 0 for an empty tally.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// `2 TP / (2 TP + FP + FN)`, or 0 when neither mask has positives.
    #[must_use]
    pub fn f1(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// F1 score of `predicted` against `truth`.
///
/// # Errors
///
/// Returns [`SegmentError::ShapeMismatch`] if the element counts differ.
pub fn f1_score(predicted: &Mask, truth: &Mask) -> Result<f64, SegmentError> {
    Ok(ConfusionMatrix::from_masks(predicted, truth)?.f1())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn mask(bits: &[u8]) -> Mask {
        let w = u32::try_from(bits.len()).unwrap();
        Mask::from_vec(w, 1, bits.iter().map(|&b| b != 0).collect()).unwrap()
    }

    #[test]
    fn tallies_outcomes() {
        let m = ConfusionMatrix::from_masks(&mask(&[1, 1, 0, 0, 1]), &mask(&[1, 0, 1, 0, 1])).unwrap();
        assert_eq!(
            m,
            ConfusionMatrix {
                true_positive: 2,
                false_positive: 1,
                false_negative: 1,
                true_negative: 1,
            }
        );
        assert_eq!(m.total(), 5);
        assert!((m.f1() - 4.0 / 6.0).abs() < 1e-12);
        assert!((m.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.accuracy() - 0.6).abs() < 1e-12);
        assert!((m.specificity() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn identical_masks_score_one() {
        let a = mask(&[0, 1, 1, 0]);
        assert!((f1_score(&a, &a).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disjoint_masks_score_zero() {
        let score = f1_score(&mask(&[1, 1, 0, 0]), &mask(&[0, 0, 1, 1])).unwrap();
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn no_positives_anywhere_scores_zero() {
        let empty = mask(&[0, 0, 0]);
        let m = ConfusionMatrix::from_masks(&empty, &empty).unwrap();
        assert!(m.f1().abs() < f64::EPSILON);
        assert!(m.precision().abs() < f64::EPSILON);
        assert!(m.recall().abs() < f64::EPSILON);
        assert!((m.accuracy() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn same_element_count_in_different_shape_is_accepted() {
        let flat = Mask::filled(6, 1, true);
        let square = Mask::filled(3, 2, true);
        assert!((f1_score(&flat, &square).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn different_element_count_is_rejected() {
        let err = f1_score(&Mask::new(4, 4), &Mask::new(4, 3)).unwrap_err();
        assert_eq!(
            err,
            SegmentError::ShapeMismatch {
                expected: Dimensions::new(4, 3),
                actual: Dimensions::new(4, 4),
            }
        );
    }
}
