mod clock;
mod record_store;
mod snapshot_store;

pub use clock::Clock;
pub use record_store::RecordStore;
pub use snapshot_store::SnapshotStore;
