//! Peer Sync Module
//!
//! Offline-first synchronization for the expense app: every device runs a
//! `SyncEngine` that versions local changes, logs them as operations, and
//! reconciles with peers through explicit push/pull.
//!
//! ## Architecture
//!
//! - **Versions**: every value carries `{version, timestamp, node_id, checksum}`
//! - **Conflicts**: same-version edits with different content inside a 1s window
//! - **Resolution**: last-write-wins, reject-remote, or merge
//! - **Operation log**: append-only, pulled by timestamp
//! - **State**: persisted through an injected `SnapshotStore`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use split_sync::sync::{SyncEngineBuilder, ResolutionStrategy};
//!
//! let engine = SyncEngineBuilder::new().build()?;
//! engine.initialize("phone-1", Some("trip-2024".to_string())).await?;
//!
//! let local = engine.create_version(expense)?;
//! if let Some(conflict) = engine.detect_conflicts(&local, &remote).await? {
//!     engine.resolve_conflict(&conflict, ResolutionStrategy::Merge).await?;
//! }
//! ```

mod config;
mod detector;
mod engine;
mod error;
mod events;
mod oplog;
mod peers;
mod resolver;
mod state;
mod types;
mod version;

pub use config::{ConfigError, SyncConfig};
pub use detector::{detect_conflict, CONFLICT_WINDOW_MS};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{FetchFailure, SyncError};
pub use events::{EventBus, EventKind, Listener, ListenerId, SyncEvent};
pub use oplog::OperationLog;
pub use peers::{LinkState, PeerRegistry};
pub use resolver::resolve_conflict;
pub use state::StateStore;
pub use types::{
    checksum_of, ConflictData, ConflictType, NodeId, OperationKind, PeerConnection, PeerStatus,
    ResolutionStrategy, SyncOperation, SyncState, SyncStatus, VersionMetadata, Versioned,
};
pub use version::VersionFactory;
