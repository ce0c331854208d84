use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use carnage_nn::{EpochStats, NetworkError, ParameterSnapshot, Result};

use super::{lock, write_json_atomic};

/// A trained model as persisted: the exported parameters plus what the
/// training run reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub id: u64,
    pub owner: u64,
    pub name: String,
    pub epochs: usize,
    pub parameters: ParameterSnapshot,
    pub accuracy: f64,
    pub loss: f64,
    pub history: Vec<EpochStats>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to create a `StoredModel`; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub owner: u64,
    pub name: String,
    pub epochs: usize,
    pub parameters: ParameterSnapshot,
    pub accuracy: f64,
    pub loss: f64,
    pub history: Vec<EpochStats>,
}

struct ModelIndex {
    next_id: u64,
    models: BTreeMap<u64, StoredModel>,
}

/// File-backed model storage: one `<id>.json` per model under `dir`, all
/// of them mirrored in memory.
///
/// Lookups are scoped by owner; a model belonging to someone else is
/// reported exactly like a missing one.
pub struct ModelStore {
    dir: PathBuf,
    index: Mutex<ModelIndex>,
}

impl ModelStore {
    /// Opens (creating if needed) the model directory and loads every model in it.
    /// Files that do not parse are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>) -> Result<ModelStore> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut models = BTreeMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_model(&path) {
                Ok(model) => {
                    models.insert(model.id, model);
                }
                Err(e) => warn!("skipping unreadable model file {}: {e}", path.display()),
            }
        }

        let next_id = models.keys().next_back().map_or(1, |id| id + 1);
        info!("loaded {} models from {}", models.len(), dir.display());

        Ok(ModelStore {
            dir,
            index: Mutex::new(ModelIndex { next_id, models }),
        })
    }

    pub fn insert(&self, new: NewModel) -> Result<StoredModel> {
        let mut index = lock(&self.index);
        let now = Utc::now();
        let model = StoredModel {
            id: index.next_id,
            owner: new.owner,
            name: new.name,
            epochs: new.epochs,
            parameters: new.parameters,
            accuracy: new.accuracy,
            loss: new.loss,
            history: new.history,
            created_at: now,
            updated_at: now,
        };
        write_json_atomic(&self.path_for(model.id), &model)?;
        index.next_id += 1;
        index.models.insert(model.id, model.clone());
        Ok(model)
    }

    pub fn get(&self, owner: u64, id: u64) -> Result<StoredModel> {
        let index = lock(&self.index);
        index
            .models
            .get(&id)
            .filter(|m| m.owner == owner)
            .cloned()
            .ok_or(NetworkError::ModelNotFound { id })
    }

    /// The owner's models, newest first.
    pub fn list(&self, owner: u64) -> Vec<StoredModel> {
        let index = lock(&self.index);
        let mut models: Vec<StoredModel> = index
            .models
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect();
        models.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        models
    }

    pub fn rename(&self, owner: u64, id: u64, name: String) -> Result<StoredModel> {
        let mut index = lock(&self.index);
        let mut model = index
            .models
            .get(&id)
            .filter(|m| m.owner == owner)
            .cloned()
            .ok_or(NetworkError::ModelNotFound { id })?;
        model.name = name;
        model.updated_at = Utc::now();
        write_json_atomic(&self.path_for(id), &model)?;
        index.models.insert(id, model.clone());
        Ok(model)
    }

    /// Removes the model and returns it.
    pub fn delete(&self, owner: u64, id: u64) -> Result<StoredModel> {
        let mut index = lock(&self.index);
        if !index.models.get(&id).is_some_and(|m| m.owner == owner) {
            return Err(NetworkError::ModelNotFound { id });
        }
        std::fs::remove_file(self.path_for(id))?;
        index.models.remove(&id).ok_or(NetworkError::ModelNotFound { id })
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn read_model(path: &Path) -> Result<StoredModel> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
