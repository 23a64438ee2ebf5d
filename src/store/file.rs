use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, Mutator};

/// Durable store keeping one pretty-printed JSON file per key.
pub struct FileStore {
    dir: PathBuf,
    /// Serializes writers so `update` is atomic with respect to `set`.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a key onto a file name. The key is hex-encoded so distinct keys
    /// always land in distinct files, whatever characters they contain.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key.as_bytes())))
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read store file: {}", key));
            }
        };
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse store file: {}", key))?;
        Ok(Some(value))
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, contents)
            .await
            .with_context(|| format!("Failed to write store file: {}", key))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace store file: {}", key))?;
        debug!(key, "Store record written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.read(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(key, &value).await
    }

    async fn update(&self, key: &str, mutator: Mutator) -> Result<Value> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(key).await?;
        let next = mutator(current)?;
        self.write(key, &next).await?;
        Ok(next)
    }
}
