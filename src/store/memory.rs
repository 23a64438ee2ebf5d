use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{KeyValueStore, Mutator};

/// In-process store. Counts writes so callers can assert that an operation
/// did not persist anything.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `set`/`update` writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current raw value of `key`, without going through the async API.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, key: &str, mutator: Mutator) -> Result<Value> {
        // The guard is held across read, transform and write; no await inside.
        let mut values = self.values();
        let next = mutator(values.get(key).cloned())?;
        values.insert(key.to_string(), next.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }
}
