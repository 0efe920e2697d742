//! JSON file state store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{StateStore, StoreError, WatcherState};

/// Keeps every watcher's state in a single JSON object keyed by watcher id
///
/// Writes replace the file through a temporary sibling and a rename, so a
/// reader never observes a partially written file.
pub struct JsonFileStateStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, WatcherState>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Corrupted(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, states: &BTreeMap<String, WatcherState>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(states)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn get_watcher_state(&self, id: &str) -> Result<Option<WatcherState>, StoreError> {
        let states = self.load().await?;
        Ok(states.get(id).copied())
    }

    async fn set_watcher_state(&self, id: &str, state: WatcherState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut states = self.load().await?;
        states.insert(id.to_string(), state);
        self.save(&states).await?;

        tracing::debug!(watcher_id = %id, path = %self.path.display(), "Watcher state saved");
        Ok(())
    }
}
