use rand::Rng;

use crate::error::{NetworkError, Result};
use crate::math::matrix::Matrix;

/// One fully-connected transition: `weights` is (units_in, units_out),
/// `biases` is (1, units_out).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    weights: Matrix,
    biases: Matrix,
}

impl DenseLayer {
    /// Xavier-uniform weights, zero biases.
    pub fn new<R: Rng + ?Sized>(units_in: usize, units_out: usize, rng: &mut R) -> Result<DenseLayer> {
        Ok(DenseLayer {
            weights: Matrix::xavier_uniform(units_in, units_out, rng)?,
            biases: Matrix::zeros(1, units_out),
        })
    }

    /// Builds a layer from existing parameters, checking that the bias row matches
    /// the weight columns.
    pub fn from_parts(weights: Matrix, biases: Matrix) -> Result<DenseLayer> {
        if biases.rows() != 1 {
            return Err(NetworkError::shape("bias rows", 1, biases.rows()));
        }
        if biases.cols() != weights.cols() {
            return Err(NetworkError::shape("bias length", weights.cols(), biases.cols()));
        }
        Ok(DenseLayer { weights, biases })
    }

    pub fn units_in(&self) -> usize {
        self.weights.rows()
    }

    pub fn units_out(&self) -> usize {
        self.weights.cols()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &Matrix {
        &self.biases
    }

    /// `Z = A·W + b`, with the bias broadcast over the batch rows.
    pub fn pre_activation(&self, input: &Matrix) -> Matrix {
        (input * &self.weights).add_row_broadcast(&self.biases)
    }

    /// Weight and bias gradients for this transition, averaged over the batch.
    /// Returns `(dW, db)`.
    pub fn compute_gradients(&self, delta: &Matrix, inputs: &Matrix) -> (Matrix, Matrix) {
        let inv_batch = 1.0 / delta.rows() as f64;
        let weights_grad = (&inputs.transpose() * delta).map(|x| x * inv_batch);
        let biases_grad = delta.column_sum().map(|x| x * inv_batch);
        (weights_grad, biases_grad)
    }

    /// `∂L/∂A_prev = dZ · Wᵀ`, using the current (not yet updated) weights.
    pub fn backpropagate(&self, delta: &Matrix) -> Matrix {
        delta * &self.weights.transpose()
    }

    /// Applies pre-computed gradients scaled by lr, in place.
    pub fn apply_gradients(&mut self, weights_grad: &Matrix, biases_grad: &Matrix, lr: f64) {
        self.weights.sub_scaled_assign(weights_grad, lr);
        self.biases.sub_scaled_assign(biases_grad, lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn new_layer_has_zero_biases() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = DenseLayer::new(3, 5, &mut rng).unwrap();
        assert_eq!(layer.weights().shape(), (3, 5));
        assert_eq!(layer.biases().shape(), (1, 5));
        assert!(layer.biases().as_slice().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn from_parts_checks_bias_length() {
        let w = Matrix::zeros(2, 3);
        let b = Matrix::row_vector(vec![0.0; 2]);
        assert!(matches!(
            DenseLayer::from_parts(w, b),
            Err(NetworkError::ShapeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn gradients_are_batch_averaged() {
        let layer = DenseLayer::from_parts(Matrix::zeros(1, 1), Matrix::zeros(1, 1)).unwrap();
        let inputs = Matrix::from_rows(vec![vec![1.0], vec![3.0]]).unwrap();
        let delta = Matrix::from_rows(vec![vec![2.0], vec![4.0]]).unwrap();
        let (dw, db) = layer.compute_gradients(&delta, &inputs);
        // (1*2 + 3*4) / 2 and (2 + 4) / 2
        assert_eq!(dw.as_slice(), &[7.0]);
        assert_eq!(db.as_slice(), &[3.0]);
    }
}
