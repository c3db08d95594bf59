//! Integration tests for snapshot persistence
//!
//! Restarts engines on top of a SQLite snapshot file and checks what
//! survives the restart.

use serde_json::json;
use split_sync::adapters::outbound::{ManualClock, SqliteSnapshotStore};
use split_sync::sync::{PeerStatus, ResolutionStrategy, SyncEngine, SyncEngineBuilder, SyncStatus};
use split_sync::SnapshotStore;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn engine_on(path: &str, now: u64) -> SyncEngine {
    let snapshots = Arc::new(SqliteSnapshotStore::open(path).unwrap());
    SyncEngineBuilder::new()
        .snapshot_store(snapshots)
        .clock(Arc::new(ManualClock::new(now)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_restart_rehydrates_state_and_log() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let engine = engine_on(&path, 1_000);
    engine.initialize("phone", Some("trip".to_string())).await.unwrap();
    engine.connect_to_peer("tablet").await.unwrap();
    let meta = engine.create_version(json!(null)).unwrap().metadata;
    engine
        .sync_data("expenses", vec![json!({"id": "e1"}), json!({"id": "e2"})], meta)
        .await
        .unwrap();
    let before = engine.pull_changes(None).await.unwrap();
    drop(engine);

    let restarted = engine_on(&path, 9_000);
    restarted.initialize("phone", None).await.unwrap();

    let state = restarted.get_sync_state();
    assert_eq!(state.status, SyncStatus::Synced);
    assert_eq!(state.group_id.as_deref(), Some("trip"));
    assert!(state.last_sync.is_some());
    assert_eq!(state.peers.len(), 1);
    assert_eq!(state.peers[0].status, PeerStatus::Offline);
    assert_eq!(restarted.pull_changes(None).await.unwrap(), before);
}

#[tokio::test]
async fn test_open_conflicts_survive_restart() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let engine = engine_on(&path, 1_000);
    engine.initialize("phone", None).await.unwrap();
    let local = engine.create_version(json!({"name": "x"})).unwrap();
    let remote = engine.create_version(json!({"name": "y"})).unwrap();
    let conflict = engine.detect_conflicts(&local, &remote).await.unwrap().unwrap();
    drop(engine);

    let restarted = engine_on(&path, 2_000);
    restarted.initialize("phone", None).await.unwrap();
    assert_eq!(restarted.get_sync_state().status, SyncStatus::Conflict);
    assert_eq!(restarted.get_conflicts().len(), 1);

    // The restored conflict can be resolved by id
    let restored = restarted.get_conflicts().remove(0);
    assert_eq!(restored.id, conflict.id);
    restarted
        .resolve_conflict(&restored, ResolutionStrategy::RejectRemote)
        .await
        .unwrap();
    assert_eq!(restarted.get_sync_state().status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_nodes_sharing_a_file_stay_separate() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let phone = engine_on(&path, 1_000);
    let laptop = engine_on(&path, 1_000);
    phone.initialize("phone", Some("g-phone".to_string())).await.unwrap();
    laptop.initialize("laptop", Some("g-laptop".to_string())).await.unwrap();

    let store = SqliteSnapshotStore::open(path.as_str()).unwrap();
    assert!(store.get("splitsync:phone:state").await.unwrap().is_some());
    assert!(store.get("splitsync:laptop:state").await.unwrap().is_some());

    let again = engine_on(&path, 5_000);
    again.initialize("laptop", None).await.unwrap();
    assert_eq!(again.group_id().as_deref(), Some("g-laptop"));
}

#[tokio::test]
async fn test_destroy_keeps_snapshot_for_next_initialize() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let engine = engine_on(&path, 1_000);
    engine.initialize("phone", Some("trip".to_string())).await.unwrap();
    engine.destroy().await;
    assert!(engine.group_id().is_none());

    engine.initialize("phone", None).await.unwrap();
    assert_eq!(engine.group_id().as_deref(), Some("trip"));
}
