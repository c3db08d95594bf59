//! Sync Adapter - Bridges the record store and the sync engine
//!
//! Pulls a group's data out of the record store, versions it, and feeds it to
//! the engine. In the other direction it replays operations received from
//! peers into the local record store.

use crate::domain::ports::RecordStore;
use crate::domain::value_objects::Table;
use crate::sync::{FetchFailure, OperationKind, SyncEngine, SyncError, SyncOperation};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of a successful group sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSyncReport {
    pub group_id: String,
    /// Records synced per table, in sync order
    pub tables: Vec<(Table, usize)>,
}

impl GroupSyncReport {
    /// Total number of records synced.
    pub fn total(&self) -> usize {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

/// Sync adapter - application use case wrapping one engine and one record store.
pub struct SyncAdapter {
    engine: Arc<SyncEngine>,
    store: Arc<dyn RecordStore>,
}

impl SyncAdapter {
    /// Create a new adapter.
    pub fn new(engine: Arc<SyncEngine>, store: Arc<dyn RecordStore>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Sync everything the record store holds for one group.
    ///
    /// This:
    /// 1. Fetches the group, its members, expenses and pot activities concurrently
    /// 2. Wraps each fetched collection in a fresh version
    /// 3. Calls `sync_data` once per table that fetched successfully
    ///
    /// If any fetch failed, the successful tables are still synced, the engine
    /// is marked `error` and `PartialFetchFailure` names every failed table.
    pub async fn sync_group_data(&self, group_id: &str) -> Result<GroupSyncReport, SyncError> {
        if !self.engine.is_initialized() {
            return Err(SyncError::NotInitialized);
        }
        if self.engine.group_id().as_deref() != Some(group_id) {
            self.engine.join_group(group_id).await?;
        }

        let (group, members, expenses, pot_activities) = tokio::join!(
            self.store.get(Table::Groups, group_id),
            self.store.query(Table::GroupMembers, "group_id", group_id),
            self.store.query(Table::Expenses, "group_id", group_id),
            self.store.query(Table::PotActivities, "group_id", group_id),
        );

        let mut fetched: Vec<(Table, Vec<Value>)> = Vec::with_capacity(4);
        let mut failed: Vec<FetchFailure> = Vec::new();

        match group {
            Ok(Some(record)) => fetched.push((Table::Groups, vec![record])),
            Ok(None) => failed.push(FetchFailure {
                table: Table::Groups.to_string(),
                reason: format!("group {} not found", group_id),
            }),
            Err(e) => failed.push(FetchFailure {
                table: Table::Groups.to_string(),
                reason: format!("{:#}", e),
            }),
        }
        for (table, result) in [
            (Table::GroupMembers, members),
            (Table::Expenses, expenses),
            (Table::PotActivities, pot_activities),
        ] {
            match result {
                Ok(records) => fetched.push((table, records)),
                Err(e) => failed.push(FetchFailure {
                    table: table.to_string(),
                    reason: format!("{:#}", e),
                }),
            }
        }

        let mut tables = Vec::with_capacity(fetched.len());
        for (table, records) in fetched {
            let metadata = self.engine.create_version(&records)?.metadata;
            let synced = self.engine.sync_data(table.as_str(), records, metadata).await?;
            tables.push((table, synced));
        }

        if !failed.is_empty() {
            let err = SyncError::PartialFetchFailure {
                group_id: group_id.to_string(),
                failed,
            };
            tracing::warn!("{}", err);
            self.engine.mark_error(&err.to_string()).await?;
            return Err(err);
        }

        let report = GroupSyncReport {
            group_id: group_id.to_string(),
            tables,
        };
        tracing::info!("group {} synced {} records", group_id, report.total());
        Ok(report)
    }

    /// Apply replicated operations to the record store, in order.
    ///
    /// Creates and updates upsert; deleting a missing record is ignored.
    /// Operations for unknown tables are skipped. Returns the number applied.
    pub async fn apply_operations(&self, ops: &[SyncOperation]) -> anyhow::Result<usize> {
        let mut applied = 0;
        for op in ops {
            let table: Table = match op.table.parse() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping operation {}: {}", op.id, e);
                    continue;
                }
            };

            match op.kind {
                OperationKind::Create | OperationKind::Update => {
                    let record = with_record_id(op.data.clone(), &op.record_id);
                    if self.store.get(table, &op.record_id).await?.is_some() {
                        self.store.update(table, &op.record_id, record).await?;
                    } else {
                        self.store.create(table, record).await?;
                    }
                }
                OperationKind::Delete => {
                    if !self.store.delete(table, &op.record_id).await? {
                        tracing::debug!("delete of missing {} record {}", table, op.record_id);
                    }
                }
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Replicate from a peer engine: pull its operations since `since`,
    /// drop the ones this node authored or already has, apply the rest to
    /// the local record store and log them in the local engine.
    ///
    /// An operation enters the local log only once it applied. On a failed
    /// apply the operations before it are kept and the error is returned, so
    /// a retry picks up from the failed one.
    pub async fn replicate_from(&self, peer: &SyncEngine, since: Option<u64>) -> anyhow::Result<usize> {
        let local_node = self.engine.node_id().ok_or(SyncError::NotInitialized)?;

        let known: HashSet<String> = self
            .engine
            .pull_changes(None)
            .await?
            .into_iter()
            .map(|op| op.id)
            .collect();
        let incoming: Vec<SyncOperation> = peer
            .pull_changes(since)
            .await?
            .into_iter()
            .filter(|op| op.user_id() != &local_node && !known.contains(&op.id))
            .collect();

        if incoming.is_empty() {
            return Ok(0);
        }

        let total = incoming.len();
        let mut accepted = Vec::with_capacity(total);
        let mut applied = 0;
        for op in incoming {
            match self.apply_operations(std::slice::from_ref(&op)).await {
                Ok(n) => applied += n,
                Err(e) => {
                    tracing::warn!(
                        "replication stopped at operation {} after {}/{}: {:#}",
                        op.id,
                        accepted.len(),
                        total,
                        e
                    );
                    self.engine.push_changes(accepted).await?;
                    return Err(e.context(format!("apply operation {}", op.id)));
                }
            }
            accepted.push(op);
        }
        self.engine.push_changes(accepted).await?;

        tracing::info!(
            "replicated {} operations into {} (peer={:?})",
            applied,
            local_node,
            peer.node_id()
        );
        Ok(applied)
    }
}

/// Ensure an object payload carries its record id.
fn with_record_id(mut record: Value, record_id: &str) -> Value {
    if let Some(obj) = record.as_object_mut() {
        obj.entry("id")
            .or_insert_with(|| Value::String(record_id.to_string()));
    }
    record
}
