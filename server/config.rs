use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "CARNAGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Service settings. Request limits live here because the engine itself
/// never bounds how long a training run takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Root of the JSON storage (`models/` and `users.json`).
    pub data_dir: PathBuf,
    pub max_epochs: usize,
    /// Largest accepted X/y row count for training.
    pub max_batch_rows: usize,
    /// Widest accepted layer in a training request.
    pub max_layer_units: usize,
    /// Largest accepted weight + bias count for one model.
    pub max_parameters: usize,
    pub min_learning_rate: f64,
    pub max_learning_rate: f64,
    /// Store a history checkpoint every this many epochs.
    pub checkpoint_every: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8000".into(),
            data_dir: PathBuf::from("carnage_data"),
            max_epochs: 10_000,
            max_batch_rows: 10_000,
            max_layer_units: 4_096,
            max_parameters: 10_000_000,
            min_learning_rate: 0.0001,
            max_learning_rate: 1.0,
            checkpoint_every: 10,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the file named by `CARNAGE_CONFIG` (if set), then
    /// `CARNAGE_*` environment overrides.
    pub fn load() -> Result<ServerConfig, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => ServerConfig::load_json(&path)?,
            Err(_) => ServerConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CARNAGE_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("CARNAGE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CARNAGE_MAX_EPOCHS") {
            self.max_epochs = parse_usize("CARNAGE_MAX_EPOCHS", v)?;
        }
        if let Some(v) = lookup("CARNAGE_MAX_BATCH_ROWS") {
            self.max_batch_rows = parse_usize("CARNAGE_MAX_BATCH_ROWS", v)?;
        }
        if let Some(v) = lookup("CARNAGE_MAX_LAYER_UNITS") {
            self.max_layer_units = parse_usize("CARNAGE_MAX_LAYER_UNITS", v)?;
        }
        if let Some(v) = lookup("CARNAGE_MAX_PARAMETERS") {
            self.max_parameters = parse_usize("CARNAGE_MAX_PARAMETERS", v)?;
        }
        if let Some(v) = lookup("CARNAGE_CHECKPOINT_EVERY") {
            self.checkpoint_every = parse_usize("CARNAGE_CHECKPOINT_EVERY", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_epochs == 0 {
            return Err(ConfigError::Invalid("max_epochs must be at least 1".into()));
        }
        if self.max_batch_rows == 0 {
            return Err(ConfigError::Invalid("max_batch_rows must be at least 1".into()));
        }
        if self.max_layer_units == 0 || self.max_parameters == 0 {
            return Err(ConfigError::Invalid("model size limits must be at least 1".into()));
        }
        if !(self.min_learning_rate > 0.0 && self.min_learning_rate <= self.max_learning_rate) {
            return Err(ConfigError::Invalid(format!(
                "learning rate bounds [{}, {}] are not a positive range",
                self.min_learning_rate, self.max_learning_rate
            )));
        }
        Ok(())
    }
}

fn parse_usize(key: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_epochs, 10_000);
        assert_eq!(config.checkpoint_every, 10);
    }

    #[test]
    fn env_overrides_replace_fields() {
        let vars: HashMap<&str, &str> = [
            ("CARNAGE_BIND_ADDR", "0.0.0.0:9000"),
            ("CARNAGE_MAX_EPOCHS", "50"),
            ("CARNAGE_DATA_DIR", "/tmp/carnage"),
            ("CARNAGE_MAX_LAYER_UNITS", "64"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_epochs, 50);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/carnage"));
        assert_eq!(config.max_batch_rows, 10_000);
        assert_eq!(config.max_layer_units, 64);
        assert_eq!(config.max_parameters, 10_000_000);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(|k| (k == "CARNAGE_MAX_BATCH_ROWS").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CARNAGE_MAX_BATCH_ROWS", .. }));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"max_epochs": 200}"#).unwrap();
        assert_eq!(config.max_epochs, 200);
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn inverted_learning_rate_bounds_fail_validation() {
        let config = ServerConfig {
            min_learning_rate: 0.5,
            max_learning_rate: 0.1,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
