//! Snapshot Store Port
//!
//! Key-value persistence for engine snapshots.

use async_trait::async_trait;

/// Best-effort key-value store holding serialized engine snapshots.
///
/// The engine keeps one key for its sync state and one for its operation
/// log. Errors are returned to the caller, which logs and swallows them.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
}
