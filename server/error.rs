use carnage_nn::NetworkError;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::Network(e) => match e {
                NetworkError::InvalidArchitecture { .. }
                | NetworkError::InvalidActivation { .. }
                | NetworkError::ShapeMismatch { .. }
                | NetworkError::TooLarge { .. }
                | NetworkError::EmptyBatch => 400,
                NetworkError::ModelNotFound { .. } => 404,
                NetworkError::Serialization(_) | NetworkError::Io(_) => 500,
            },
        }
    }

    /// Storage failures are reported without their internal details.
    pub fn body(&self) -> serde_json::Value {
        let message = if self.status() >= 500 {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        json!({ "error": message })
    }
}
