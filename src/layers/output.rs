use crate::math::matrix::Matrix;

/// Small epsilon added inside log() to prevent log(0) = -inf.
pub const LOG_EPS: f64 = 1e-8;

/// The output layer: row-wise softmax paired with categorical cross-entropy.
///
/// The two halves are deliberately not separable. The backward pass starts
/// from `delta = output - y`, which is the gradient of cross-entropy with
/// respect to the softmax *logits*; it is only correct while both pieces are
/// used together.
pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    /// Numerically stable softmax over each row: the row maximum is
    /// subtracted before exponentiating.
    pub fn activate(logits: &Matrix) -> Matrix {
        let mut out = logits.clone();
        for r in 0..out.rows() {
            let row = out.row_mut(r);
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for x in row.iter_mut() {
                *x = (*x - max).exp();
                sum += *x;
            }
            for x in row.iter_mut() {
                *x /= sum;
            }
        }
        out
    }

    /// Mean over rows of `-sum(y * log(output + eps))`.
    pub fn loss(output: &Matrix, expected: &Matrix) -> f64 {
        let n = output.rows() as f64;
        let total: f64 = output
            .as_slice()
            .iter()
            .zip(expected.as_slice())
            .map(|(p, y)| -y * (p + LOG_EPS).ln())
            .sum();
        total / n
    }

    /// Gradient of the combined loss with respect to the output logits.
    pub fn delta(output: &Matrix, expected: &Matrix) -> Matrix {
        output - expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn softmax_rows_are_distributions() {
        let z = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![-1.0, 0.0, 0.5]]).unwrap();
        let p = SoftmaxCrossEntropy::activate(&z);
        for row in p.iter_rows() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|&x| x > 0.0));
        }
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let z = Matrix::from_rows(vec![vec![1000.0, 1001.0]]).unwrap();
        let p = SoftmaxCrossEntropy::activate(&z);
        assert!(p.as_slice().iter().all(|x| x.is_finite()));
        assert_abs_diff_eq!(p.get(0, 1), 1.0 / (1.0 + (-1.0f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn loss_of_confident_correct_prediction_is_near_zero() {
        let out = Matrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        let y = Matrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        assert_abs_diff_eq!(SoftmaxCrossEntropy::loss(&out, &y), -(1.0 + LOG_EPS).ln(), epsilon = 1e-15);
    }

    #[test]
    fn loss_is_averaged_over_rows() {
        let out = Matrix::from_rows(vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
        let y = Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_abs_diff_eq!(SoftmaxCrossEntropy::loss(&out, &y), -(0.5 + LOG_EPS).ln(), epsilon = 1e-12);
    }

    #[test]
    fn delta_matches_finite_difference_of_loss() {
        let z = Matrix::from_rows(vec![vec![0.3, -0.2, 0.9]]).unwrap();
        let y = Matrix::from_rows(vec![vec![0.0, 1.0, 0.0]]).unwrap();
        let out = SoftmaxCrossEntropy::activate(&z);
        let delta = SoftmaxCrossEntropy::delta(&out, &y);

        let h = 1e-6;
        for j in 0..3 {
            let mut plus = z.to_rows();
            let mut minus = z.to_rows();
            plus[0][j] += h;
            minus[0][j] -= h;
            let lp = SoftmaxCrossEntropy::loss(
                &SoftmaxCrossEntropy::activate(&Matrix::from_rows(plus).unwrap()),
                &y,
            );
            let lm = SoftmaxCrossEntropy::loss(
                &SoftmaxCrossEntropy::activate(&Matrix::from_rows(minus).unwrap()),
                &y,
            );
            assert_abs_diff_eq!(delta.get(0, j), (lp - lm) / (2.0 * h), epsilon = 1e-4);
        }
    }
}
