//! DashMap Snapshot Store
//!
//! Implements SnapshotStore in memory using DashMap.

use crate::domain::ports::SnapshotStore;
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory snapshot store.
///
/// Survives engine `destroy()`/`initialize()` cycles within one process,
/// which is enough for tests and the simulated peers.
pub struct DashMapSnapshotStore {
    entries: DashMap<String, String>,
}

impl DashMapSnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DashMapSnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for DashMapSnapshotStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
