//! Integration tests for the Sync Adapter
//!
//! Drives group syncs against an in-memory record store, including one that
//! fails some of its fetches, and replicates between two adapters.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use split_sync::adapters::outbound::{DashMapRecordStore, ManualClock};
use split_sync::domain::entities::{Expense, Group, PotActivity, PotActivityKind};
use split_sync::sync::{EventKind, SyncEvent, SyncStatus};
use split_sync::{RecordStore, SyncAdapter, SyncEngine, SyncEngineBuilder, SyncError, Table};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Record store whose queries fail for selected tables.
struct FlakyStore {
    inner: DashMapRecordStore,
    failing: HashSet<Table>,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get(&self, table: Table, id: &str) -> anyhow::Result<Option<Value>> {
        if self.failing.contains(&table) {
            anyhow::bail!("{} unavailable", table);
        }
        self.inner.get(table, id).await
    }

    async fn query(&self, table: Table, field: &str, value: &str) -> anyhow::Result<Vec<Value>> {
        if self.failing.contains(&table) {
            anyhow::bail!("{} unavailable", table);
        }
        self.inner.query(table, field, value).await
    }

    async fn create(&self, table: Table, record: Value) -> anyhow::Result<String> {
        self.inner.create(table, record).await
    }

    async fn update(&self, table: Table, id: &str, record: Value) -> anyhow::Result<()> {
        self.inner.update(table, id, record).await
    }

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<bool> {
        self.inner.delete(table, id).await
    }
}

/// Record store whose first write to one table fails.
struct FailFirstWrite {
    inner: DashMapRecordStore,
    table: Table,
    tripped: AtomicBool,
}

#[async_trait]
impl RecordStore for FailFirstWrite {
    async fn get(&self, table: Table, id: &str) -> anyhow::Result<Option<Value>> {
        self.inner.get(table, id).await
    }

    async fn query(&self, table: Table, field: &str, value: &str) -> anyhow::Result<Vec<Value>> {
        self.inner.query(table, field, value).await
    }

    async fn create(&self, table: Table, record: Value) -> anyhow::Result<String> {
        if table == self.table && !self.tripped.swap(true, Ordering::SeqCst) {
            anyhow::bail!("{} write rejected", table);
        }
        self.inner.create(table, record).await
    }

    async fn update(&self, table: Table, id: &str, record: Value) -> anyhow::Result<()> {
        self.inner.update(table, id, record).await
    }

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<bool> {
        self.inner.delete(table, id).await
    }
}

async fn engine(node_id: &str) -> Arc<SyncEngine> {
    let engine = SyncEngineBuilder::new()
        .clock(Arc::new(ManualClock::new(50_000)))
        .build()
        .unwrap();
    engine.initialize(node_id, None).await.unwrap();
    Arc::new(engine)
}

async fn seed(store: &dyn RecordStore) {
    let group = Group {
        id: "g1".to_string(),
        name: "Flat".to_string(),
        currency: "EUR".to_string(),
        created_by: "u1".to_string(),
    };
    store.create(Table::Groups, serde_json::to_value(&group).unwrap()).await.unwrap();
    store
        .create(Table::GroupMembers, json!({"id": "m1", "group_id": "g1", "user_id": "u1"}))
        .await
        .unwrap();
    for (id, amount) in [("e1", 1200), ("e2", 3400)] {
        let expense = Expense {
            id: id.to_string(),
            group_id: "g1".to_string(),
            description: "Groceries".to_string(),
            amount_cents: amount,
            paid_by: "u1".to_string(),
            split_between: vec!["u1".to_string()],
        };
        store.create(Table::Expenses, serde_json::to_value(&expense).unwrap()).await.unwrap();
    }
    let pot = PotActivity {
        id: "p1".to_string(),
        group_id: "g1".to_string(),
        user_id: "u1".to_string(),
        kind: PotActivityKind::Contribution,
        amount_cents: 5000,
    };
    store.create(Table::PotActivities, serde_json::to_value(&pot).unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_group_sync_versions_each_table() {
    let engine = engine("phone").await;
    let store = Arc::new(DashMapRecordStore::new());
    seed(store.as_ref()).await;
    let adapter = SyncAdapter::new(engine.clone(), store);

    let tables = Arc::new(Mutex::new(Vec::new()));
    let t = tables.clone();
    engine.on(EventKind::DataUpdated, move |event| {
        if let SyncEvent::DataUpdated { table: Some(table), metadata, .. } = event {
            t.lock().push((table.clone(), metadata.version));
        }
    });

    let report = adapter.sync_group_data("g1").await.unwrap();

    assert_eq!(report.total(), 5);
    assert_eq!(
        *tables.lock(),
        vec![
            ("groups".to_string(), 1),
            ("group_members".to_string(), 1),
            ("expenses".to_string(), 1),
            ("pot_activities".to_string(), 1),
        ]
    );
    assert_eq!(engine.pull_changes(None).await.unwrap().len(), 5);
    assert_eq!(engine.get_sync_state().status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_partial_fetch_failure_names_failed_tables() {
    let engine = engine("phone").await;
    let inner = DashMapRecordStore::new();
    seed(&inner).await;
    let store = Arc::new(FlakyStore {
        inner,
        failing: [Table::Expenses, Table::PotActivities].into_iter().collect(),
    });
    let adapter = SyncAdapter::new(engine.clone(), store);

    let err = adapter.sync_group_data("g1").await.unwrap_err();

    let SyncError::PartialFetchFailure { group_id, failed } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(group_id, "g1");
    let tables: Vec<&str> = failed.iter().map(|f| f.table.as_str()).collect();
    assert_eq!(tables, vec!["expenses", "pot_activities"]);
    assert!(failed[0].reason.contains("unavailable"));
    assert!(err.to_string().contains("expenses"));

    // Group and members made it through before the engine settled on error
    let ops = engine.pull_changes(None).await.unwrap();
    let synced: HashSet<&str> = ops.iter().map(|op| op.table.as_str()).collect();
    assert_eq!(synced, ["groups", "group_members"].into_iter().collect());
    assert_eq!(engine.get_sync_state().status, SyncStatus::Error);

    // A later sync recovers
    engine.start_sync().await.unwrap();
    assert_eq!(engine.get_sync_state().status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_adapter_requires_initialized_engine() {
    let engine = Arc::new(SyncEngineBuilder::new().build().unwrap());
    let adapter = SyncAdapter::new(engine, Arc::new(DashMapRecordStore::new()));

    assert!(matches!(
        adapter.sync_group_data("g1").await,
        Err(SyncError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_replicate_between_adapters() {
    let phone = engine("phone").await;
    let laptop = engine("laptop").await;
    let phone_store = Arc::new(DashMapRecordStore::new());
    let laptop_store = Arc::new(DashMapRecordStore::new());
    seed(phone_store.as_ref()).await;

    let phone_adapter = SyncAdapter::new(phone.clone(), phone_store);
    let laptop_adapter = SyncAdapter::new(laptop.clone(), laptop_store.clone());

    phone_adapter.sync_group_data("g1").await.unwrap();

    let applied = laptop_adapter.replicate_from(&phone, None).await.unwrap();
    assert_eq!(applied, 5);
    assert_eq!(laptop_store.count(Table::Expenses), 2);
    assert_eq!(laptop_store.count(Table::Groups), 1);
    let expense = laptop_store.get(Table::Expenses, "e2").await.unwrap().unwrap();
    assert_eq!(expense["amount_cents"], 3400);

    // Replaying is a no-op
    assert_eq!(laptop_adapter.replicate_from(&phone, None).await.unwrap(), 0);

    // The phone does not take its own operations back
    assert_eq!(phone_adapter.replicate_from(&laptop, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_apply_is_retried_on_next_replication() {
    let phone = engine("phone").await;
    let laptop = engine("laptop").await;
    let phone_store = Arc::new(DashMapRecordStore::new());
    seed(phone_store.as_ref()).await;
    let laptop_store = Arc::new(FailFirstWrite {
        inner: DashMapRecordStore::new(),
        table: Table::Expenses,
        tripped: AtomicBool::new(false),
    });

    let phone_adapter = SyncAdapter::new(phone.clone(), phone_store);
    let laptop_adapter = SyncAdapter::new(laptop.clone(), laptop_store.clone());
    phone_adapter.sync_group_data("g1").await.unwrap();

    let err = laptop_adapter.replicate_from(&phone, None).await.unwrap_err();
    assert!(format!("{err:#}").contains("write rejected"));

    // Only the operations that reached the store were logged
    let logged = laptop.pull_changes(None).await.unwrap();
    let tables: Vec<&str> = logged.iter().map(|op| op.table.as_str()).collect();
    assert_eq!(tables, vec!["groups", "group_members"]);
    assert_eq!(laptop_store.inner.count(Table::Expenses), 0);

    let applied = laptop_adapter.replicate_from(&phone, None).await.unwrap();
    assert_eq!(applied, 3);
    assert_eq!(laptop_store.inner.count(Table::Groups), 1);
    assert_eq!(laptop_store.inner.count(Table::Expenses), 2);
    assert_eq!(laptop_store.inner.count(Table::PotActivities), 1);
    assert_eq!(laptop.pull_changes(None).await.unwrap().len(), 5);
}
