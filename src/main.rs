//! split-sync - Peer sync demo node
//!
//! This is the composition root: it wires a record store, a snapshot store
//! and two sync engines together, then walks through a group sync, peer
//! replication and a concurrent-edit conflict.

use serde_json::json;
use split_sync::adapters::outbound::{DashMapRecordStore, DashMapSnapshotStore, SqliteSnapshotStore};
use split_sync::domain::entities::{Expense, Group, GroupMember, MemberRole};
use split_sync::sync::EventKind;
use split_sync::{
    load_config, RecordStore, ResolutionStrategy, SnapshotStore, SyncAdapter, SyncEngineBuilder,
    SyncEvent, Table,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    tracing::info!(
        "starting split-sync node_id={} group={:?} seed_peers={:?}",
        cfg.node_id,
        cfg.group_id,
        cfg.seed_peers
    );

    // ===== COMPOSITION ROOT =====

    // 1. Snapshot store (SQLite when a path is configured, memory otherwise)
    let snapshots: Arc<dyn SnapshotStore> = match &cfg.snapshot_path {
        Some(path) => {
            tracing::info!("persisting snapshots to {}", path);
            Arc::new(SqliteSnapshotStore::open(path)?)
        }
        None => Arc::new(DashMapSnapshotStore::new()),
    };

    // 2. Record store seeded with one group
    let group_id = cfg.group_id.clone().unwrap_or_else(|| "demo-group".to_string());
    let store = Arc::new(DashMapRecordStore::new());
    seed_group(store.as_ref(), &group_id).await?;

    // 3. Local engine + adapter
    let local = Arc::new(
        SyncEngineBuilder::new()
            .config(cfg.sync_config())
            .snapshot_store(snapshots.clone())
            .build()?,
    );
    local.on(EventKind::ConflictDetected, |event| {
        if let SyncEvent::ConflictDetected { conflicts } = event {
            tracing::warn!("{} open conflict(s)", conflicts.len());
        }
    });
    local.initialize(cfg.node_id.clone(), Some(group_id.clone())).await?;
    let adapter = SyncAdapter::new(local.clone(), store.clone());

    // 4. A second node with its own, empty record store
    let peer_id = format!("{}-peer", cfg.node_id);
    let peer = Arc::new(
        SyncEngineBuilder::new()
            .config(cfg.sync_config())
            .snapshot_store(snapshots)
            .build()?,
    );
    peer.initialize(peer_id.clone(), Some(group_id.clone())).await?;
    let peer_store = Arc::new(DashMapRecordStore::new());
    let peer_adapter = SyncAdapter::new(peer.clone(), peer_store.clone());

    local.connect_to_peer(&peer_id).await?;
    peer.connect_to_peer(&cfg.node_id).await?;

    // 5. Group sync on the local node, then replicate to the peer
    let report = adapter.sync_group_data(&group_id).await?;
    tracing::info!("local sync: {:?}", report.tables);

    let replicated = peer_adapter.replicate_from(&local, None).await?;
    tracing::info!(
        "peer replicated {} operations, holds {} expenses",
        replicated,
        peer_store.count(Table::Expenses)
    );

    // 6. Both nodes edit the same expense at once
    let base = json!({"id": "exp-1", "description": "Dinner", "amount_cents": 4800});
    let mut local_edit = base.clone();
    local_edit["amount_cents"] = json!(5200);
    let mut peer_edit = base;
    peer_edit["description"] = json!("Dinner + tip");

    let ours = local.create_version(local_edit)?;
    let theirs = peer.create_version(peer_edit)?;

    if let Some(conflict) = local.detect_conflicts(&ours, &theirs).await? {
        tracing::info!("conflicting fields: {:?}", conflict.conflict_fields);
        let merged = local.resolve_conflict(&conflict, ResolutionStrategy::Merge).await?;
        tracing::info!(
            "resolved to version {} by {}: {}",
            merged.version(),
            merged.node_id(),
            merged.data
        );
    }

    local.start_sync().await?;
    local.sync_group_data(&group_id).await?;

    let state = local.get_sync_state();
    tracing::info!(
        "final state status={} peers={} conflicts={} last_sync={:?}",
        state.status,
        state.peers.len(),
        state.conflicts.len(),
        state.last_sync
    );

    local.stop_sync().await?;
    peer.stop_sync().await?;
    Ok(())
}

async fn seed_group(store: &dyn RecordStore, group_id: &str) -> anyhow::Result<()> {
    let group = Group {
        id: group_id.to_string(),
        name: "Weekend trip".to_string(),
        currency: "EUR".to_string(),
        created_by: "u-ana".to_string(),
    };
    store.create(Table::Groups, serde_json::to_value(&group)?).await?;

    for (n, user) in ["u-ana", "u-ben"].iter().enumerate() {
        let member = GroupMember {
            id: format!("m-{}", n + 1),
            group_id: group_id.to_string(),
            user_id: user.to_string(),
            role: if n == 0 { MemberRole::Admin } else { MemberRole::Member },
        };
        store.create(Table::GroupMembers, serde_json::to_value(&member)?).await?;
    }

    let expense = Expense {
        id: "exp-1".to_string(),
        group_id: group_id.to_string(),
        description: "Dinner".to_string(),
        amount_cents: 4800,
        paid_by: "u-ana".to_string(),
        split_between: vec!["u-ana".to_string(), "u-ben".to_string()],
    };
    store.create(Table::Expenses, serde_json::to_value(&expense)?).await?;

    Ok(())
}
