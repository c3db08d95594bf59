//! Record Store Port
//!
//! Defines the interface for the hosted backend that owns group data.

use crate::domain::value_objects::Table;
use async_trait::async_trait;
use serde_json::Value;

/// Store for users, groups, memberships, expenses and pot activities.
///
/// This is an outbound port: the adapter reads domain truth through it and
/// writes replicated operations back into it. Records are JSON objects
/// carrying a string `id` field.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a single record by ID.
    async fn get(&self, table: Table, id: &str) -> anyhow::Result<Option<Value>>;

    /// Get all records whose string `field` equals `value`.
    async fn query(&self, table: Table, field: &str, value: &str) -> anyhow::Result<Vec<Value>>;

    /// Insert a new record, returning its ID.
    async fn create(&self, table: Table, record: Value) -> anyhow::Result<String>;

    /// Replace an existing record.
    async fn update(&self, table: Table, id: &str, record: Value) -> anyhow::Result<()>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, table: Table, id: &str) -> anyhow::Result<bool>;
}
