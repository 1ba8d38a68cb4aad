use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{KvStore, StoreError, StoreResult};

/// Read and decode a JSON record. A value that fails to decode is reported as
/// [`StoreError::Corrupt`], never silently dropped.
pub fn load_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StoreError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        })
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> StoreResult<()> {
    let raw =
        serde_json::to_string(value).map_err(|err| StoreError::Serialization(err.to_string()))?;
    store.set(key, &raw)
}
