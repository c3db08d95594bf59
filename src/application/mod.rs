mod sync_adapter;

pub use sync_adapter::{GroupSyncReport, SyncAdapter};
