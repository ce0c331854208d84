use thiserror::Error;

/// The result type used across the library.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Everything that can go wrong while building, running, or restoring a network.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Fewer than two layers, or a layer with zero units.
    #[error("invalid architecture {layers:?}: {reason}")]
    InvalidArchitecture { layers: Vec<usize>, reason: String },

    #[error("invalid activation '{name}': expected one of relu, sigmoid, tanh")]
    InvalidActivation { name: String },

    /// `what` names the compared quantity, e.g. "X columns".
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A matrix whose element count cannot be allocated.
    #[error("a {rows}x{cols} matrix is too large to allocate")]
    TooLarge { rows: usize, cols: usize },

    #[error("cannot train on an empty batch")]
    EmptyBatch,

    #[error("model {id} not found")]
    ModelNotFound { id: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        NetworkError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
