//! Sync Errors

use crate::sync::config::ConfigError;

/// A table that could not be fetched from the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub table: String,
    pub reason: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.table, self.reason)
    }
}

/// Errors reported by the sync engine and adapter.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync engine is not initialized")]
    NotInitialized,

    #[error("node id must not be empty")]
    InvalidNodeId,

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    /// Snapshot read/write failure. Logged by the state store, never returned
    /// from public engine operations.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("partial fetch failure for group {group_id}: {}", format_failures(.failed))]
    PartialFetchFailure {
        group_id: String,
        failed: Vec<FetchFailure>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_failures(failed: &[FetchFailure]) -> String {
    failed
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
