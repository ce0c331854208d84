use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// Nonlinearity applied element-wise at every hidden layer.
///
/// The output layer is not configurable: it is always softmax, see
/// `layers::output::SoftmaxCrossEntropy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub const ALL: [Activation; 3] = [Activation::Relu, Activation::Sigmoid, Activation::Tanh];

    pub fn function(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => if x > 0.0 { x } else { 0.0 },
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    ///
    /// ReLU uses 0 as its sub-gradient at 0.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => if x > 0.0 { 1.0 } else { 0.0 },
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }
}

/// Logistic function; the input is clamped to [-500, 500] so `exp` cannot overflow.
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x.clamp(-500.0, 500.0)).exp())
}

impl FromStr for Activation {
    type Err = NetworkError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            _ => Err(NetworkError::InvalidActivation { name: s.to_owned() }),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
