use std::sync::Arc;

use crate::config::ServerConfig;
use crate::store::{models::ModelStore, users::UserDirectory};

/// Everything a request handler can reach. Each store guards itself, so the
/// state is shared without an outer lock.
pub struct AppState {
    pub config: ServerConfig,
    pub models: ModelStore,
    pub users: UserDirectory,
}

impl AppState {
    /// Opens (creating if needed) the stores under `config.data_dir`.
    pub fn open(config: ServerConfig) -> carnage_nn::Result<AppState> {
        let models = ModelStore::open(config.data_dir.join("models"))?;
        let users = UserDirectory::open(config.data_dir.join("users.json"))?;
        Ok(AppState { config, models, users })
    }
}

/// Shared state: an `Arc<AppState>` passed to every request thread.
pub type SharedState = Arc<AppState>;

#[cfg(test)]
pub mod testing {
    use tempfile::TempDir;

    use super::AppState;
    use crate::config::ServerConfig;

    /// App state over a fresh data directory with small request limits.
    pub fn state(tmp: &TempDir) -> AppState {
        let config = ServerConfig {
            data_dir: tmp.path().to_path_buf(),
            max_epochs: 2_000,
            max_batch_rows: 100,
            max_layer_units: 64,
            max_parameters: 10_000,
            checkpoint_every: 10,
            ..ServerConfig::default()
        };
        AppState::open(config).unwrap()
    }
}
