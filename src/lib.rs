//! split-sync Library
//!
//! Peer synchronization and conflict resolution for an offline-first expense
//! app. Exposes the sync engine, its ports and adapters for use in
//! integration tests and as a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod sync;

// Re-export commonly used types
pub use application::{GroupSyncReport, SyncAdapter};
pub use config::load_config;
pub use domain::entities::{Expense, Group, GroupMember, PotActivity, User};
pub use domain::ports::{Clock, RecordStore, SnapshotStore};
pub use domain::value_objects::Table;
pub use sync::{
    ConflictData, ResolutionStrategy, SyncConfig, SyncEngine, SyncEngineBuilder, SyncError,
    SyncEvent, SyncState, SyncStatus, Versioned,
};
