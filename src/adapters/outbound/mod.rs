mod clocks;
mod dashmap_record_store;
mod dashmap_snapshot_store;
mod sqlite_snapshot_store;

pub use clocks::{ManualClock, SystemClock};
pub use dashmap_record_store::DashMapRecordStore;
pub use dashmap_snapshot_store::DashMapSnapshotStore;
pub use sqlite_snapshot_store::SqliteSnapshotStore;
