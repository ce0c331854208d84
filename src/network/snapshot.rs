use serde::{Deserialize, Serialize};

use crate::activation::activation::Activation;
use crate::error::Result;
use crate::network::architecture::Architecture;

/// A network's parameters and architecture as plain nested numbers.
///
/// `weights[i]` is transition `i`'s (units_in, units_out) matrix as rows,
/// `biases[i]` its bias vector. This is the shape that gets stored and sent
/// over the wire; `Network::export` and `Network::import` convert to and
/// from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub weights: Vec<Vec<Vec<f64>>>,
    pub biases: Vec<Vec<f64>>,
    #[serde(alias = "layers")]
    pub architecture: Architecture,
    pub activation: Activation,
    pub learning_rate: f64,
}

impl ParameterSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<ParameterSnapshot> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the snapshot to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a snapshot from a JSON file previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<ParameterSnapshot> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Total number of stored weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.architecture.parameter_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> ParameterSnapshot {
        ParameterSnapshot {
            weights: vec![vec![vec![0.1, -0.2], vec![0.3, 0.4]]],
            biases: vec![vec![0.0, 0.5]],
            architecture: Architecture::new(vec![2, 2]).unwrap(),
            activation: Activation::Tanh,
            learning_rate: 0.05,
        }
    }

    #[test]
    fn json_is_plain_nested_arrays() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(value["weights"][0][1][0], serde_json::json!(0.3));
        assert_eq!(value["biases"][0][1], serde_json::json!(0.5));
        assert_eq!(value["architecture"], serde_json::json!([2, 2]));
        assert_eq!(value["activation"], "tanh");
    }

    #[test]
    fn accepts_layers_as_architecture_key() {
        let json = r#"{"weights":[[[1.0]]],"biases":[[0.0]],"layers":[1,1],
                       "activation":"relu","learning_rate":0.01}"#;
        let snap = ParameterSnapshot::from_json(json).unwrap();
        assert_eq!(snap.architecture.as_slice(), &[1, 1]);
    }

    #[test]
    fn rejects_invalid_architecture_in_json() {
        let json = r#"{"weights":[],"biases":[],"architecture":[3],
                       "activation":"relu","learning_rate":0.01}"#;
        assert!(ParameterSnapshot::from_json(json).is_err());
    }

    #[test]
    fn counts_parameters() {
        assert_eq!(sample().parameter_count(), 6);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.json");
        let path = path.to_str().unwrap();
        sample().save_json(path).unwrap();
        assert_eq!(ParameterSnapshot::load_json(path).unwrap(), sample());
    }
}
