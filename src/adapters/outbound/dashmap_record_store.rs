//! DashMap Record Store
//!
//! Implements RecordStore in memory, standing in for the hosted backend.

use crate::domain::ports::RecordStore;
use crate::domain::value_objects::Table;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// In-memory record store keyed by (table, id).
pub struct DashMapRecordStore {
    records: DashMap<(Table, String), Value>,
}

impl DashMapRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records in a table.
    pub fn count(&self, table: Table) -> usize {
        self.records.iter().filter(|e| e.key().0 == table).count()
    }

    fn record_id(record: &Value) -> anyhow::Result<String> {
        record
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("record has no string id field"))
    }
}

impl Default for DashMapRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for DashMapRecordStore {
    async fn get(&self, table: Table, id: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .records
            .get(&(table, id.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn query(&self, table: Table, field: &str, value: &str) -> anyhow::Result<Vec<Value>> {
        let mut matches: Vec<(String, Value)> = self
            .records
            .iter()
            .filter(|e| e.key().0 == table)
            .filter(|e| e.value().get(field).and_then(|v| v.as_str()) == Some(value))
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        // DashMap iteration order is arbitrary
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches.into_iter().map(|(_, v)| v).collect())
    }

    async fn create(&self, table: Table, record: Value) -> anyhow::Result<String> {
        let id = Self::record_id(&record)?;
        let key = (table, id.clone());
        if self.records.contains_key(&key) {
            anyhow::bail!("{} record {} already exists", table, id);
        }
        self.records.insert(key, record);
        Ok(id)
    }

    async fn update(&self, table: Table, id: &str, record: Value) -> anyhow::Result<()> {
        match self.records.get_mut(&(table, id.to_string())) {
            Some(mut entry) => {
                *entry = record;
                Ok(())
            }
            None => anyhow::bail!("{} record {} not found", table, id),
        }
    }

    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<bool> {
        Ok(self.records.remove(&(table, id.to_string())).is_some())
    }
}
