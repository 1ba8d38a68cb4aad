//! Synchronous key-value storage used for session and directory records.
//!
//! Values are opaque strings; [`load_json`] and [`save_json`] layer the JSON
//! encoding on top and report unparsable records as [`StoreError::Corrupt`]
//! so callers can decide how to recover.

mod memory;
mod record;
mod redb;

use std::path::PathBuf;

use thiserror::Error;

pub use memory::MemoryStore;
pub use record::{load_json, save_json};
pub use redb::RedbStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("stored record {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value storage with synchronous get/set/remove by string key.
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Environment-driven location of the durable store.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    env_key: String,
    fallback: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::new("CRM_STORE_PATH", "crm-access.redb")
    }
}

impl StoreSettings {
    pub fn new(env_key: impl Into<String>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            env_key: env_key.into(),
            fallback: fallback.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        std::env::var_os(&self.env_key)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn open(&self) -> StoreResult<RedbStore> {
        RedbStore::open(&self.path())
    }
}
