//! Persistent key/value storage.
//!
//! The core only talks to `KeyValueStore`, so the host decides where data
//! lives. Two adapters ship with the crate:
//! - `FileStore`: one JSON file per key under the data directory
//! - `MemoryStore`: process-local map, used by tests and ephemeral hosts
//!
//! Values are `serde_json::Value`. A JSON `null` is treated as "absent", which
//! is how cleared records are written.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Read-transform-write step passed to `KeyValueStore::update`.
/// Receives the current value (if any) and returns the value to store.
pub type Mutator = Box<dyn FnOnce(Option<Value>) -> Result<Value> + Send>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Apply `mutator` to the current value and store the result, as one
    /// atomic step with respect to other writers of this store. Nothing is
    /// written when the mutator fails.
    async fn update(&self, key: &str, mutator: Mutator) -> Result<Value>;
}

/// Key of the session record for a local identity.
pub fn auth_key(local_user_id: &str) -> String {
    format!("auth/{}", local_user_id)
}

/// Key of the submission list for a local identity.
pub fn submissions_key(local_user_id: &str) -> String {
    format!("submissions/{}", local_user_id)
}

/// Load and deserialize `key`. Missing keys and `null` both yield `None`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let parsed = serde_json::from_value(value)
                .with_context(|| format!("Failed to parse stored record: {}", key))?;
            Ok(Some(parsed))
        }
    }
}

pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)
        .with_context(|| format!("Failed to serialize record: {}", key))?;
    store.set(key, value).await
}

/// Replace an identity-scoped record through `update`, or clear it with
/// `None`.
pub async fn replace_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: Option<&T>,
) -> Result<()> {
    let next = match value {
        Some(value) => serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize record: {}", key))?,
        None => Value::Null,
    };
    store.update(key, Box::new(move |_| Ok(next))).await?;
    Ok(())
}
