//! Softmax over classification logits.

use crate::core::Tensor2D;
use ndarray::Axis;

/// Converts one logit vector into a probability distribution.
///
/// The maximum logit is subtracted before exponentiation so large logits do not
/// overflow. An empty input yields an empty output.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Applies [`softmax`] to every row of a `[batch, classes]` tensor.
pub fn softmax_rows(logits: &Tensor2D) -> Tensor2D {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_softmax_is_shift_invariant_and_stable() {
        let small = softmax(&[1.0, 2.0, 3.0]);
        let large = softmax(&[1001.0, 1002.0, 1003.0]);
        for (a, b) in small.iter().zip(&large) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!(large.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_softmax_uniform_for_equal_logits() {
        let probs = softmax(&[0.5; 4]);
        assert!(probs.iter().all(|&p| (p - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_softmax_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_softmax_rows_matches_slice_version() {
        let logits = array![[1.0, 2.0, 3.0], [0.0, -1.0, 4.0]];
        let probs = softmax_rows(&logits);
        for (row, raw) in probs.outer_iter().zip(logits.outer_iter()) {
            let expected = softmax(&raw.to_vec());
            for (a, b) in row.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }
}
