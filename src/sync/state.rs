//! State Store
//!
//! Holds an engine's `SyncState` and persists it, together with the
//! operation log, through the injected snapshot store.
//!
//! Mutations are applied to a copy and committed in one step, so a failed
//! mutation never leaves a half-updated state behind. Persistence is
//! best-effort: failures are logged and swallowed.

use crate::domain::ports::SnapshotStore;
use crate::sync::error::SyncError;
use crate::sync::types::{SyncOperation, SyncState};
use parking_lot::RwLock;
use std::sync::Arc;

/// Owner of one engine's `SyncState`.
pub struct StateStore {
    snapshots: Arc<dyn SnapshotStore>,
    key_prefix: String,
    namespace: RwLock<Option<String>>,
    state: RwLock<SyncState>,
}

impl StateStore {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            snapshots,
            key_prefix: key_prefix.into(),
            namespace: RwLock::new(None),
            state: RwLock::new(SyncState::default()),
        }
    }

    /// Scope snapshot keys to a node.
    pub fn bind(&self, node_id: &str) {
        *self.namespace.write() = Some(format!("{}:{}", self.key_prefix, node_id));
    }

    pub fn unbind(&self) {
        *self.namespace.write() = None;
    }

    pub fn state_key(&self) -> Option<String> {
        self.namespace.read().as_ref().map(|ns| format!("{}:state", ns))
    }

    pub fn operations_key(&self) -> Option<String> {
        self.namespace.read().as_ref().map(|ns| format!("{}:operations", ns))
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SyncState {
        self.state.read().clone()
    }

    /// Read-only access without cloning.
    pub fn read<R>(&self, f: impl FnOnce(&SyncState) -> R) -> R {
        f(&self.state.read())
    }

    /// Apply `f` to a copy of the state and commit the copy only if `f`
    /// succeeds. Returns the committed state.
    pub fn try_commit<E>(
        &self,
        f: impl FnOnce(&mut SyncState) -> Result<(), E>,
    ) -> Result<SyncState, E> {
        let mut state = self.state.write();
        let mut next = state.clone();
        f(&mut next)?;
        *state = next.clone();
        Ok(next)
    }

    /// Infallible form of [`try_commit`](Self::try_commit).
    pub fn commit(&self, f: impl FnOnce(&mut SyncState)) -> SyncState {
        let mut state = self.state.write();
        f(&mut state);
        state.clone()
    }

    /// Replace the whole state.
    pub fn replace(&self, next: SyncState) {
        *self.state.write() = next;
    }

    /// Load the persisted state and operation log for the bound node.
    ///
    /// Missing snapshots load as `None`. Read or decode failures are
    /// reported as `PersistenceFailure` for the caller to log.
    pub async fn load(&self) -> Result<(Option<SyncState>, Vec<SyncOperation>), SyncError> {
        let (Some(state_key), Some(ops_key)) = (self.state_key(), self.operations_key()) else {
            return Ok((None, Vec::new()));
        };

        let state = match self.read_key(&state_key).await? {
            Some(raw) => Some(
                serde_json::from_str::<SyncState>(&raw)
                    .map_err(|e| SyncError::PersistenceFailure(format!("decode {}: {}", state_key, e)))?,
            ),
            None => None,
        };

        let ops = match self.read_key(&ops_key).await? {
            Some(raw) => serde_json::from_str::<Vec<SyncOperation>>(&raw)
                .map_err(|e| SyncError::PersistenceFailure(format!("decode {}: {}", ops_key, e)))?,
            None => Vec::new(),
        };

        Ok((state, ops))
    }

    async fn read_key(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.snapshots
            .get(key)
            .await
            .map_err(|e| SyncError::PersistenceFailure(format!("read {}: {:#}", key, e)))
    }

    /// Persist the current state. Failures are logged, never returned.
    pub async fn persist(&self) {
        let Some(key) = self.state_key() else {
            return;
        };
        let encoded = serde_json::to_string(&*self.state.read());
        match encoded {
            Ok(json) => self.write_key(&key, json).await,
            Err(e) => tracing::warn!("failed to encode sync state: {}", e),
        }
    }

    /// Persist the operation log. Failures are logged, never returned.
    pub async fn persist_operations(&self, ops: &[SyncOperation]) {
        let Some(key) = self.operations_key() else {
            return;
        };
        match serde_json::to_string(ops) {
            Ok(json) => self.write_key(&key, json).await,
            Err(e) => tracing::warn!("failed to encode operation log: {}", e),
        }
    }

    async fn write_key(&self, key: &str, value: String) {
        if let Err(e) = self.snapshots.set(key, value).await {
            let err = SyncError::PersistenceFailure(format!("write {}: {:#}", key, e));
            tracing::warn!("{}; continuing without durable snapshot", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapSnapshotStore;
    use crate::sync::types::SyncStatus;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct BrokenStore;

    #[async_trait]
    impl SnapshotStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }

        async fn set(&self, _key: &str, _value: String) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
    }

    fn memory_store() -> (Arc<DashMapSnapshotStore>, StateStore) {
        let snapshots = Arc::new(DashMapSnapshotStore::new());
        let store = StateStore::new(snapshots.clone(), "test");
        store.bind("node-a");
        (snapshots, store)
    }

    #[test]
    fn test_keys_are_namespaced_by_node() {
        let (_snapshots, store) = memory_store();
        assert_eq!(store.state_key().as_deref(), Some("test:node-a:state"));
        assert_eq!(store.operations_key().as_deref(), Some("test:node-a:operations"));

        store.unbind();
        assert!(store.state_key().is_none());
    }

    #[test]
    fn test_failed_commit_leaves_state_unchanged() {
        let (_snapshots, store) = memory_store();
        store.commit(|s| s.status = SyncStatus::Synced);

        let result: Result<SyncState, &str> = store.try_commit(|s| {
            s.status = SyncStatus::Error;
            s.pending_operations = 9;
            Err("boom")
        });

        assert!(result.is_err());
        let state = store.snapshot();
        assert_eq!(state.status, SyncStatus::Synced);
        assert_eq!(state.pending_operations, 0);
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let (snapshots, store) = memory_store();
        store.commit(|s| {
            s.status = SyncStatus::Offline;
            s.last_sync = Some(42);
        });
        store.persist().await;
        store.persist_operations(&[]).await;
        assert_eq!(snapshots.len(), 2);

        let fresh = StateStore::new(snapshots, "test");
        fresh.bind("node-a");
        let (state, ops) = fresh.load().await.unwrap();
        let state = state.unwrap();
        assert_eq!(state.status, SyncStatus::Offline);
        assert_eq!(state.last_sync, Some(42));
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_snapshot() {
        let (_snapshots, store) = memory_store();
        let (state, ops) = store.load().await.unwrap();
        assert!(state.is_none());
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_snapshot_reports_persistence_failure() {
        let (snapshots, store) = memory_store();
        snapshots.set("test:node-a:state", "not json".to_string()).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SyncError::PersistenceFailure(_)));
    }

    #[tokio::test]
    async fn test_unbound_store_does_not_persist() {
        let snapshots = Arc::new(DashMapSnapshotStore::new());
        let store = StateStore::new(snapshots.clone(), "test");
        store.persist().await;
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_write_failure_is_logged_not_returned() {
        let store = StateStore::new(Arc::new(BrokenStore), "test");
        store.bind("node-a");
        store.commit(|s| s.status = SyncStatus::Synced);

        store.persist().await;

        assert!(logs_contain("persistence failure"));
        assert_eq!(store.snapshot().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_read_failure_reported() {
        let store = StateStore::new(Arc::new(BrokenStore), "test");
        store.bind("node-a");
        assert!(matches!(store.load().await, Err(SyncError::PersistenceFailure(_))));
    }
}
