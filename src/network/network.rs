use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::activation::activation::Activation;
use crate::error::{NetworkError, Result};
use crate::layers::{dense::DenseLayer, output::SoftmaxCrossEntropy};
use crate::math::matrix::Matrix;
use crate::network::{architecture::Architecture, snapshot::ParameterSnapshot, trace::ForwardTrace};
use crate::optim::sgd::Sgd;
use crate::train::{loop_fn::train_loop, train_config::TrainConfig};

/// A fully-connected classifier: hidden layers share one activation, the
/// output layer is always softmax, and training minimises cross-entropy by
/// plain full-batch gradient descent.
///
/// The network keeps no per-call state. `forward` returns a `ForwardTrace`
/// that `backward` consumes, so inference through `&Network` is safe to
/// share between threads; training needs `&mut`.
#[derive(Debug, Clone)]
pub struct Network {
    architecture: Architecture,
    activation: Activation,
    optimizer: Sgd,
    layers: Vec<DenseLayer>,
}

impl Network {
    /// Builds a network with Xavier-uniform weights drawn from the thread-local RNG.
    pub fn new(layers: &[usize], activation: &str, learning_rate: f64) -> Result<Network> {
        Network::with_rng(layers, activation, learning_rate, &mut rand::thread_rng())
    }

    /// Like `new`, but reproducible: the same seed yields the same initial weights.
    pub fn seeded(layers: &[usize], activation: &str, learning_rate: f64, seed: u64) -> Result<Network> {
        Network::with_rng(layers, activation, learning_rate, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng + ?Sized>(
        layers: &[usize],
        activation: &str,
        learning_rate: f64,
        rng: &mut R,
    ) -> Result<Network> {
        let architecture = Architecture::new(layers.to_vec())?;
        let activation: Activation = activation.parse()?;

        let layers = architecture
            .transition_shapes()
            .map(|(units_in, units_out)| DenseLayer::new(units_in, units_out, rng))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "initialized network: architecture={:?} activation={} learning_rate={}",
            architecture.as_slice(),
            activation,
            learning_rate
        );

        Ok(Network {
            architecture,
            activation,
            optimizer: Sgd::new(learning_rate),
            layers,
        })
    }

    /// Rebuilds a network from an exported snapshot without random initialization.
    pub fn from_snapshot(snapshot: ParameterSnapshot) -> Result<Network> {
        let layers = layers_from_snapshot(&snapshot)?;
        debug!(
            "restored network: architecture={:?} activation={}",
            snapshot.architecture.as_slice(),
            snapshot.activation
        );
        Ok(Network {
            architecture: snapshot.architecture,
            activation: snapshot.activation,
            optimizer: Sgd::new(snapshot.learning_rate),
            layers,
        })
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Forward pass over a batch of shape (batch_size, input_units).
    ///
    /// Returns the softmax output, shape (batch_size, output_units), and the
    /// trace `backward` needs.
    pub fn forward(&self, x: &Matrix) -> Result<(Matrix, ForwardTrace)> {
        let input = if x.rows() == 0 {
            Matrix::zeros(0, self.architecture.input_units())
        } else {
            self.check_columns("X columns", self.architecture.input_units(), x)?;
            x.clone()
        };

        let last = self.layers.len() - 1;
        let mut trace = ForwardTrace::new(input, self.layers.len());

        for layer in &self.layers[..last] {
            let z = layer.pre_activation(trace.last_activation());
            let a = z.map(|v| self.activation.function(v));
            trace.push_hidden(z, a);
        }

        let logits = self.layers[last].pre_activation(trace.last_activation());
        Ok((SoftmaxCrossEntropy::activate(&logits), trace))
    }

    /// Class probabilities for every row, without keeping the trace.
    pub fn probabilities(&self, x: &Matrix) -> Result<Matrix> {
        Ok(self.forward(x)?.0)
    }

    /// One gradient-descent step from a forward pass on the same parameters.
    ///
    /// `y` is the one-hot target and `output` the matrix `forward` returned
    /// together with `trace`.
    pub fn backward(&mut self, trace: &ForwardTrace, y: &Matrix, output: &Matrix) -> Result<()> {
        if trace.depth() != self.layers.len() {
            return Err(NetworkError::shape("trace depth", self.layers.len(), trace.depth()));
        }
        let batch = trace.batch_size();
        if batch == 0 {
            return Err(NetworkError::EmptyBatch);
        }
        let outputs = self.architecture.output_units();
        self.check_columns("output columns", outputs, output)?;
        self.check_columns("y columns", outputs, y)?;
        if output.rows() != batch {
            return Err(NetworkError::shape("output rows", batch, output.rows()));
        }
        if y.rows() != batch {
            return Err(NetworkError::shape("y rows", batch, y.rows()));
        }
        self.check_trace(trace)?;

        let mut delta = SoftmaxCrossEntropy::delta(output, y);

        for i in (0..self.layers.len()).rev() {
            let (w_grad, b_grad) = self.layers[i].compute_gradients(&delta, &trace.activations[i]);

            // Propagate through the weights before they are updated.
            let next_delta = if i > 0 {
                let act_derivative = trace.pre_activations[i - 1].map(|z| self.activation.derivative(z));
                Some(self.layers[i].backpropagate(&delta).hadamard(&act_derivative))
            } else {
                None
            };

            self.optimizer.step(&mut self.layers[i], &w_grad, &b_grad);

            if let Some(d) = next_delta {
                delta = d;
            }
        }

        Ok(())
    }

    /// Full-batch training for `epochs` epochs; returns the loss of every epoch in order.
    pub fn train(&mut self, x: &Matrix, y: &Matrix, epochs: usize) -> Result<Vec<f64>> {
        Ok(train_loop(self, x, y, &TrainConfig::new(epochs))?.losses)
    }

    /// Index of the most probable class for every row.
    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        Ok(self.probabilities(x)?.argmax_rows())
    }

    /// Fraction of rows whose predicted class equals the argmax of `y`.
    /// An empty batch scores 0.
    pub fn evaluate(&self, x: &Matrix, y: &Matrix) -> Result<f64> {
        if x.rows() == 0 && y.rows() == 0 {
            return Ok(0.0);
        }
        self.check_batch(x, y)?;
        Ok(accuracy(&self.probabilities(x)?, y))
    }

    /// Copies the parameters out as plain nested arrays.
    pub fn export(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            weights: self.layers.iter().map(|l| l.weights().to_rows()).collect(),
            biases: self.layers.iter().map(|l| l.biases().as_slice().to_vec()).collect(),
            architecture: self.architecture.clone(),
            activation: self.activation,
            learning_rate: self.optimizer.learning_rate,
        }
    }

    /// Replaces the live parameters and architecture metadata with a snapshot's.
    ///
    /// The snapshot is validated first; on error the network is unchanged.
    pub fn import(&mut self, snapshot: ParameterSnapshot) -> Result<()> {
        *self = Network::from_snapshot(snapshot)?;
        Ok(())
    }

    /// Checks a training/evaluation pair against the architecture.
    pub fn check_batch(&self, x: &Matrix, y: &Matrix) -> Result<()> {
        self.check_columns("X columns", self.architecture.input_units(), x)?;
        self.check_columns("y columns", self.architecture.output_units(), y)?;
        if x.rows() != y.rows() {
            return Err(NetworkError::shape("y rows", x.rows(), y.rows()));
        }
        Ok(())
    }

    /// Every recorded matrix must fit the layer it feeds or came from, so a
    /// trace from a different network is rejected before any update.
    fn check_trace(&self, trace: &ForwardTrace) -> Result<()> {
        let batch = trace.batch_size();
        let hidden = self.layers.len() - 1;
        if trace.pre_activations.len() != hidden {
            return Err(NetworkError::shape("trace pre-activations", hidden, trace.pre_activations.len()));
        }

        let recorded = trace
            .activations
            .iter()
            .zip(&self.layers)
            .map(|(a, layer)| (a, layer.units_in(), "activation"))
            .chain(
                trace
                    .pre_activations
                    .iter()
                    .zip(&self.layers)
                    .map(|(z, layer)| (z, layer.units_out(), "pre-activation")),
            );
        for (m, units, kind) in recorded {
            if m.cols() != units {
                return Err(NetworkError::shape(format!("trace {kind} columns"), units, m.cols()));
            }
            if m.rows() != batch {
                return Err(NetworkError::shape(format!("trace {kind} rows"), batch, m.rows()));
            }
        }
        Ok(())
    }

    fn check_columns(&self, what: &str, expected: usize, m: &Matrix) -> Result<()> {
        if m.cols() != expected {
            return Err(NetworkError::shape(what, expected, m.cols()));
        }
        Ok(())
    }
}

/// Fraction of rows where the argmax of `output` equals the argmax of `y`.
pub(crate) fn accuracy(output: &Matrix, y: &Matrix) -> f64 {
    let n = output.rows();
    if n == 0 {
        return 0.0;
    }
    let correct = output
        .argmax_rows()
        .into_iter()
        .zip(y.argmax_rows())
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / n as f64
}

fn layers_from_snapshot(snapshot: &ParameterSnapshot) -> Result<Vec<DenseLayer>> {
    let arch = &snapshot.architecture;
    if snapshot.weights.len() != arch.transitions() {
        return Err(NetworkError::shape("weight matrices", arch.transitions(), snapshot.weights.len()));
    }
    if snapshot.biases.len() != arch.transitions() {
        return Err(NetworkError::shape("bias vectors", arch.transitions(), snapshot.biases.len()));
    }

    arch.transition_shapes()
        .zip(snapshot.weights.iter().zip(&snapshot.biases))
        .enumerate()
        .map(|(i, ((units_in, units_out), (w, b)))| {
            let weights = Matrix::from_rows(w.clone())?;
            if weights.rows() != units_in {
                return Err(NetworkError::shape(format!("weights[{i}] rows"), units_in, weights.rows()));
            }
            if weights.cols() != units_out {
                return Err(NetworkError::shape(format!("weights[{i}] columns"), units_out, weights.cols()));
            }
            DenseLayer::from_parts(weights, Matrix::row_vector(b.clone()))
        })
        .collect()
}
