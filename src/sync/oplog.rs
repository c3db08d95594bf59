//! Operation Log
//!
//! Append-only record of create/update/delete operations. Peers pull from it
//! to replay changes they missed.

use crate::sync::types::SyncOperation;
use parking_lot::RwLock;
use std::collections::HashSet;

/// In-memory operation log, in push order.
#[derive(Debug, Default)]
pub struct OperationLog {
    inner: RwLock<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    ops: Vec<SyncOperation>,
    seen: HashSet<String>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append operations in order. Operations whose id is already in the log
    /// are skipped, so replaying a batch does not duplicate it.
    /// Returns the operations that were actually appended.
    pub fn append(&self, ops: Vec<SyncOperation>) -> Vec<SyncOperation> {
        let mut inner = self.inner.write();
        let mut appended = Vec::with_capacity(ops.len());
        for op in ops {
            if !inner.seen.insert(op.id.clone()) {
                tracing::debug!("skipping already-logged operation id={}", op.id);
                continue;
            }
            inner.ops.push(op.clone());
            appended.push(op);
        }
        appended
    }

    /// Operations with `timestamp > since`, or all of them when `since` is `None`.
    pub fn since(&self, since: Option<u64>) -> Vec<SyncOperation> {
        let inner = self.inner.read();
        match since {
            Some(t) => inner.ops.iter().filter(|op| op.timestamp() > t).cloned().collect(),
            None => inner.ops.clone(),
        }
    }

    /// Replace the log contents with a persisted snapshot.
    pub fn restore(&self, ops: Vec<SyncOperation>) {
        {
            let mut inner = self.inner.write();
            inner.ops.clear();
            inner.seen.clear();
        }
        self.append(ops);
    }

    /// Copy of the whole log, for persistence.
    pub fn snapshot(&self) -> Vec<SyncOperation> {
        self.inner.read().ops.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.ops.clear();
        inner.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::{NodeId, OperationKind, VersionMetadata};
    use serde_json::json;

    fn op(record: &str, timestamp: u64) -> SyncOperation {
        SyncOperation::new(
            OperationKind::Update,
            "expenses",
            record,
            json!({"id": record}),
            VersionMetadata {
                version: 1,
                timestamp,
                node_id: NodeId::new("a"),
                checksum: "0".to_string(),
            },
        )
    }

    #[test]
    fn test_pull_all_when_no_since() {
        let log = OperationLog::new();
        log.append(vec![op("e1", 10), op("e2", 20)]);
        assert_eq!(log.since(None).len(), 2);
    }

    #[test]
    fn test_since_is_strict_and_keeps_push_order() {
        let log = OperationLog::new();
        log.append(vec![op("e1", 30), op("e2", 10), op("e3", 20), op("e4", 40)]);

        let pulled: Vec<_> = log.since(Some(20)).into_iter().map(|o| o.record_id).collect();
        assert_eq!(pulled, vec!["e1", "e4"]);
    }

    #[test]
    fn test_boundary_operation_excluded() {
        let log = OperationLog::new();
        log.append(vec![op("e1", 100)]);
        assert!(log.since(Some(100)).is_empty());
        assert_eq!(log.since(Some(99)).len(), 1);
    }

    #[test]
    fn test_duplicate_ids_skipped() {
        let log = OperationLog::new();
        let first = op("e1", 10);
        assert_eq!(log.append(vec![first.clone()]).len(), 1);
        let appended = log.append(vec![first, op("e2", 11)]);
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].record_id, "e2");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_restore_replaces_contents() {
        let log = OperationLog::new();
        log.append(vec![op("old", 1)]);
        log.restore(vec![op("n1", 2), op("n2", 3)]);

        let ids: Vec<_> = log.snapshot().into_iter().map(|o| o.record_id).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
    }

    #[test]
    fn test_clear() {
        let log = OperationLog::new();
        let o = op("e1", 1);
        log.append(vec![o.clone()]);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.append(vec![o]).len(), 1);
    }
}
