use crate::{layers::dense::DenseLayer, math::matrix::Matrix};

/// Plain gradient descent: no momentum, no weight decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one gradient-descent update to a layer given its pre-computed gradients.
    pub fn step(&self, layer: &mut DenseLayer, weights_grad: &Matrix, biases_grad: &Matrix) {
        layer.apply_gradients(weights_grad, biases_grad, self.learning_rate);
    }
}
