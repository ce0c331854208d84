//! Small fully-connected classifiers for tabular data.
//!
//! A [`Network`] is built from a layer-size list, a hidden activation and a
//! learning rate, trained full-batch with plain gradient descent against a
//! softmax + cross-entropy output, and exported as a [`ParameterSnapshot`]
//! of plain nested arrays for storage.

pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{NetworkError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::Activation;
pub use layers::dense::DenseLayer;
pub use layers::output::SoftmaxCrossEntropy;
pub use network::{Architecture, ForwardTrace, Network, ParameterSnapshot};
pub use optim::sgd::Sgd;
pub use train::{train_loop, EpochStats, TrainConfig, TrainingReport};
