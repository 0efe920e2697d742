//! In-process state store

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{StateStore, StoreError, WatcherState};

/// Volatile state store, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: DashMap<String, WatcherState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_watcher_state(&self, id: &str) -> Result<Option<WatcherState>, StoreError> {
        Ok(self.states.get(id).map(|entry| *entry.value()))
    }

    async fn set_watcher_state(&self, id: &str, state: WatcherState) -> Result<(), StoreError> {
        self.states.insert(id.to_string(), state);
        Ok(())
    }
}
