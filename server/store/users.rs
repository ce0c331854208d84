use chrono::{DateTime, Utc};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::ApiError;

use super::{lock, write_json_atomic};

/// Stored hashes carry their algorithm and round count.
const HASH_ALGORITHM: &str = "pbkdf2_sha256";
const PBKDF2_ROUNDS: u32 = if cfg!(test) { 1_000 } else { 600_000 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
    Enterprise,
}

/// Per-account bookkeeping shown on the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub subscription_tier: SubscriptionTier,
    pub models_trained: u64,
    /// Size of the stored parameter snapshots, in megabytes.
    pub storage_used_mb: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub email: Option<String>,
    password_salt: String,
    password_hash: String,
    pub profile: Profile,
}

#[derive(Default, Serialize, Deserialize)]
struct UserFile {
    next_id: u64,
    users: BTreeMap<u64, UserRecord>,
}

struct UserIndex {
    file: UserFile,
    /// Bearer token -> user id, at most one token per user. Not persisted;
    /// a restart logs everyone out.
    tokens: HashMap<String, u64>,
}

/// Accounts, credentials and profiles, persisted to a single JSON file.
pub struct UserDirectory {
    path: PathBuf,
    index: Mutex<UserIndex>,
}

impl UserDirectory {
    pub fn open(path: impl Into<PathBuf>) -> carnage_nn::Result<UserDirectory> {
        let path = path.into();
        let mut file: UserFile = if path.exists() {
            let reader = std::io::BufReader::new(std::fs::File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            UserFile::default()
        };
        file.next_id = file.next_id.max(file.users.keys().next_back().map_or(1, |id| id + 1));
        info!("loaded {} accounts from {}", file.users.len(), path.display());

        Ok(UserDirectory {
            path,
            index: Mutex::new(UserIndex {
                file,
                tokens: HashMap::new(),
            }),
        })
    }

    /// Creates an account with a fresh free-tier profile.
    pub fn register(&self, username: &str, password: &str, email: Option<String>) -> Result<UserRecord, ApiError> {
        let mut index = lock(&self.index);
        if index.file.users.values().any(|u| u.username == username) {
            return Err(ApiError::Conflict(format!("username '{username}' is already taken")));
        }

        let salt = random_hex(16);
        let user = UserRecord {
            id: index.file.next_id,
            username: username.to_owned(),
            email,
            password_hash: hash_password(&salt, password, PBKDF2_ROUNDS),
            password_salt: salt,
            profile: Profile {
                subscription_tier: SubscriptionTier::Free,
                models_trained: 0,
                storage_used_mb: 0.0,
                created_at: Utc::now(),
            },
        };

        index.file.next_id += 1;
        index.file.users.insert(user.id, user.clone());
        if let Err(e) = write_json_atomic(&self.path, &index.file) {
            index.file.users.remove(&user.id);
            return Err(e.into());
        }
        Ok(user)
    }

    /// Checks credentials and issues a new bearer token, revoking the
    /// user's previous one.
    pub fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let (id, salt, stored) = {
            let index = lock(&self.index);
            let user = index
                .file
                .users
                .values()
                .find(|u| u.username == username)
                .ok_or(ApiError::Unauthorized)?;
            (user.id, user.password_salt.clone(), user.password_hash.clone())
        };
        // Key derivation is slow; it runs without holding the lock.
        if !verify_password(&salt, password, &stored) {
            return Err(ApiError::Unauthorized);
        }

        let token = random_hex(32);
        let mut index = lock(&self.index);
        index.tokens.retain(|_, owner| *owner != id);
        index.tokens.insert(token.clone(), id);
        Ok(token)
    }

    /// Resolves a bearer token to its user id.
    pub fn authenticate(&self, token: &str) -> Option<u64> {
        lock(&self.index).tokens.get(token).copied()
    }

    pub fn get(&self, id: u64) -> Option<UserRecord> {
        lock(&self.index).file.users.get(&id).cloned()
    }

    /// Counts a newly trained model and its storage against the user's profile.
    pub fn record_model(&self, id: u64, bytes: usize) -> Result<(), ApiError> {
        self.update_profile(id, |p| {
            p.models_trained += 1;
            p.storage_used_mb += bytes_to_mb(bytes);
        })
    }

    /// Returns storage after a model is deleted. `models_trained` is a running
    /// total and does not decrease.
    pub fn release_storage(&self, id: u64, bytes: usize) -> Result<(), ApiError> {
        self.update_profile(id, |p| {
            p.storage_used_mb = (p.storage_used_mb - bytes_to_mb(bytes)).max(0.0);
        })
    }

    /// Undoes `record_model` when the model itself could not be stored.
    pub fn forget_model(&self, id: u64, bytes: usize) -> Result<(), ApiError> {
        self.update_profile(id, |p| {
            p.models_trained = p.models_trained.saturating_sub(1);
            p.storage_used_mb = (p.storage_used_mb - bytes_to_mb(bytes)).max(0.0);
        })
    }

    fn update_profile<F>(&self, id: u64, f: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Profile),
    {
        let mut index = lock(&self.index);
        let user = index.file.users.get_mut(&id).ok_or(ApiError::Unauthorized)?;
        f(&mut user.profile);
        write_json_atomic(&self.path, &index.file)?;
        Ok(())
    }
}

fn bytes_to_mb(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn hash_password(salt: &str, password: &str, rounds: u32) -> String {
    let key = derive_key(salt, password, rounds);
    format!("{}${}${}", HASH_ALGORITHM, rounds, hex::encode(key))
}

fn derive_key(salt: &str, password: &str, rounds: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut key);
    key
}

/// Recomputes the key with the stored round count and compares in constant time.
fn verify_password(salt: &str, password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(HASH_ALGORITHM), Some(rounds), Some(expected)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let (Ok(rounds), Ok(expected)) = (rounds.parse::<u32>(), hex::decode(expected)) else {
        return false;
    };
    let key = derive_key(salt, password, rounds);
    key[..].ct_eq(&expected[..]).into()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}
