use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

/// Ordered unit counts per layer, input and output layers included.
///
/// Always holds at least two entries, all positive, and its parameter
/// count fits in `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Architecture(Vec<usize>);

impl Architecture {
    pub fn new(layers: Vec<usize>) -> Result<Architecture> {
        if layers.len() < 2 {
            return Err(NetworkError::InvalidArchitecture {
                reason: format!("need at least 2 layers, got {}", layers.len()),
                layers,
            });
        }
        if let Some(i) = layers.iter().position(|&n| n == 0) {
            return Err(NetworkError::InvalidArchitecture {
                reason: format!("layer {i} has no units"),
                layers,
            });
        }
        if count_parameters(&layers).is_none() {
            return Err(NetworkError::InvalidArchitecture {
                reason: "parameter count overflows".into(),
                layers,
            });
        }
        Ok(Architecture(layers))
    }

    /// Total weights and biases over all transitions.
    pub fn parameter_count(&self) -> usize {
        count_parameters(&self.0).unwrap_or(usize::MAX)
    }

    pub fn input_units(&self) -> usize {
        self.0[0]
    }

    pub fn output_units(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Number of weight/bias transitions, `len - 1`.
    pub fn transitions(&self) -> usize {
        self.0.len() - 1
    }

    /// `(units_in, units_out)` for every transition, input side first.
    pub fn transition_shapes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

fn count_parameters(layers: &[usize]) -> Option<usize> {
    layers.windows(2).try_fold(0usize, |total, w| {
        w[0].checked_mul(w[1])?.checked_add(w[1])?.checked_add(total)
    })
}

impl TryFrom<Vec<usize>> for Architecture {
    type Error = NetworkError;

    fn try_from(layers: Vec<usize>) -> Result<Self> {
        Architecture::new(layers)
    }
}

impl From<Architecture> for Vec<usize> {
    fn from(arch: Architecture) -> Self {
        arch.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layer_is_rejected() {
        assert!(matches!(
            Architecture::new(vec![5]),
            Err(NetworkError::InvalidArchitecture { .. })
        ));
        assert!(Architecture::new(vec![]).is_err());
    }

    #[test]
    fn zero_sized_layer_is_rejected() {
        let err = Architecture::new(vec![2, 0, 2]).unwrap_err();
        assert!(err.to_string().contains("layer 1"));
    }

    #[test]
    fn reports_transition_shapes() {
        let arch = Architecture::new(vec![3, 4, 2]).unwrap();
        assert_eq!(arch.input_units(), 3);
        assert_eq!(arch.output_units(), 2);
        assert_eq!(arch.transitions(), 2);
        assert_eq!(arch.transition_shapes().collect::<Vec<_>>(), vec![(3, 4), (4, 2)]);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Architecture>("[2, 3]").is_ok());
        assert!(serde_json::from_str::<Architecture>("[2]").is_err());
    }

    #[test]
    fn counts_parameters_and_rejects_overflow() {
        assert_eq!(Architecture::new(vec![3, 4, 2]).unwrap().parameter_count(), 3 * 4 + 4 + 4 * 2 + 2);
        let err = Architecture::new(vec![2, 1 << 62, 1 << 62]).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
