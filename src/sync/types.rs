//! Sync Types
//!
//! Core types for the sync engine: version metadata, versioned values,
//! conflicts, peers, operations and the engine's observable state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a node (a device or session) in the sync topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version block attached to every synchronized value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Monotonic version in this node's view of the record
    pub version: u64,
    /// Milliseconds since UNIX epoch, node-local clock
    pub timestamp: u64,
    /// Node that produced this version
    pub node_id: NodeId,
    /// Content fingerprint of the data
    pub checksum: String,
}

/// A domain value together with its version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub data: T,
    pub metadata: VersionMetadata,
}

impl<T> Versioned<T> {
    pub fn new(data: T, metadata: VersionMetadata) -> Self {
        Self { data, metadata }
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    pub fn timestamp(&self) -> u64 {
        self.metadata.timestamp
    }

    pub fn node_id(&self) -> &NodeId {
        &self.metadata.node_id
    }

    pub fn checksum(&self) -> &str {
        &self.metadata.checksum
    }
}

impl<T: Serialize> Versioned<T> {
    /// Erase the payload type into JSON.
    pub fn to_value(&self) -> Result<Versioned<Value>, serde_json::Error> {
        Ok(Versioned {
            data: serde_json::to_value(&self.data)?,
            metadata: self.metadata.clone(),
        })
    }
}

/// Compute the content fingerprint for a payload.
///
/// CRC32 over the JSON encoding, as 8 lowercase hex digits. Values go through
/// `serde_json::Value` first so object keys are hashed in sorted order.
pub fn checksum_of<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_value(data)?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(format!("{:08x}", crc32fast::hash(&bytes)))
}

/// Classification of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides changed the same base version at nearly the same time
    ConcurrentEdit,
    /// Reserved; not produced by the detector
    VersionMismatch,
    /// Reserved; not produced by the detector
    DeletionConflict,
}

/// Strategy used to settle a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep whichever side has the later timestamp
    LastWriteWins,
    /// Keep the local side unconditionally
    #[serde(alias = "reject_local")]
    RejectRemote,
    /// Take the remote payload under a new, higher version owned by this node
    Merge,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastWriteWins => "last_write_wins",
            Self::RejectRemote => "reject_remote",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_write_wins" => Ok(Self::LastWriteWins),
            "reject_remote" | "reject_local" => Ok(Self::RejectRemote),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown resolution strategy: {}", other)),
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected conflict between a local and a remote version of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictData<T> {
    pub id: String,
    pub local_version: Versioned<T>,
    pub remote_version: Versioned<T>,
    pub conflict_type: ConflictType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStrategy>,
}

impl<T: Serialize> ConflictData<T> {
    /// Erase the payload type into JSON so the conflict can live in `SyncState`.
    pub fn to_value(&self) -> Result<ConflictData<Value>, serde_json::Error> {
        Ok(ConflictData {
            id: self.id.clone(),
            local_version: self.local_version.to_value()?,
            remote_version: self.remote_version.to_value()?,
            conflict_type: self.conflict_type,
            conflict_fields: self.conflict_fields.clone(),
            resolution: self.resolution,
        })
    }
}

/// Overall status of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Conflict,
    Error,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Externally visible peer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Online,
    Offline,
    Connecting,
}

/// Snapshot of one known peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConnection {
    pub id: String,
    pub status: PeerStatus,
    pub last_seen: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_progress: Option<u8>,
}

/// Kind of logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// A single immutable entry in the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Unique ID for this operation (for deduplication)
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Table the record belongs to
    pub table: String,
    /// Primary key of the affected record
    pub record_id: String,
    /// Record payload
    pub data: Value,
    pub metadata: VersionMetadata,
}

impl SyncOperation {
    /// Create a new operation with a fresh id.
    pub fn new(
        kind: OperationKind,
        table: impl Into<String>,
        record_id: impl Into<String>,
        data: Value,
        metadata: VersionMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            table: table.into(),
            record_id: record_id.into(),
            data,
            metadata,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.metadata.timestamp
    }

    /// Node that authored the operation.
    pub fn user_id(&self) -> &NodeId {
        &self.metadata.node_id
    }
}

/// Process-wide state of one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    pub last_sync: Option<u64>,
    pub conflicts: Vec<ConflictData<Value>>,
    pub peers: Vec<PeerConnection>,
    pub pending_operations: u32,
    /// Group scope the engine currently synchronizes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl SyncState {
    pub fn has_conflict(&self, id: &str) -> bool {
        self.conflicts.iter().any(|c| c.id == id)
    }

    /// Status to settle on after an exchange finishes.
    pub fn settled_status(&self) -> SyncStatus {
        if self.conflicts.is_empty() {
            SyncStatus::Synced
        } else {
            SyncStatus::Conflict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(version: u64, timestamp: u64) -> VersionMetadata {
        VersionMetadata {
            version,
            timestamp,
            node_id: NodeId::new("node-1"),
            checksum: "00000000".to_string(),
        }
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new("phone-1");
        assert_eq!(id.as_str(), "phone-1");
        assert_eq!(format!("{}", id), "phone-1");
    }

    #[test]
    fn test_node_id_serializes_as_plain_string() {
        let id = NodeId::new("laptop");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"laptop\"");
    }

    #[test]
    fn test_checksum_is_stable_across_key_order() {
        let a = json!({"name": "dinner", "amount": 42});
        let b: Value = serde_json::from_str(r#"{"amount":42,"name":"dinner"}"#).unwrap();
        assert_eq!(checksum_of(&a).unwrap(), checksum_of(&b).unwrap());
    }

    #[test]
    fn test_checksum_differs_for_different_content() {
        let a = checksum_of(&json!({"name": "x"})).unwrap();
        let b = checksum_of(&json!({"name": "y"})).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_strategy_parsing_accepts_reject_local_alias() {
        assert_eq!("reject_local".parse::<ResolutionStrategy>().unwrap(), ResolutionStrategy::RejectRemote);
        assert_eq!("merge".parse::<ResolutionStrategy>().unwrap(), ResolutionStrategy::Merge);
        assert!("overwrite".parse::<ResolutionStrategy>().is_err());

        let parsed: ResolutionStrategy = serde_json::from_str("\"reject_local\"").unwrap();
        assert_eq!(parsed, ResolutionStrategy::RejectRemote);
    }

    #[test]
    fn test_operation_accessors_derive_from_metadata() {
        let op = SyncOperation::new(OperationKind::Create, "expenses", "e1", json!({}), meta(1, 1234));
        assert_eq!(op.timestamp(), 1234);
        assert_eq!(op.user_id().as_str(), "node-1");
        assert!(!op.id.is_empty());
    }

    #[test]
    fn test_operation_serializes_kind_as_type() {
        let op = SyncOperation::new(OperationKind::Delete, "expenses", "e1", json!(null), meta(1, 1));
        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(encoded["type"], "delete");
    }

    #[test]
    fn test_settled_status() {
        let mut state = SyncState::default();
        assert_eq!(state.status, SyncStatus::Idle);
        assert_eq!(state.settled_status(), SyncStatus::Synced);

        state.conflicts.push(ConflictData {
            id: "c1".to_string(),
            local_version: Versioned::new(json!({}), meta(1, 1)),
            remote_version: Versioned::new(json!({}), meta(1, 2)),
            conflict_type: ConflictType::ConcurrentEdit,
            conflict_fields: None,
            resolution: None,
        });
        assert!(state.has_conflict("c1"));
        assert_eq!(state.settled_status(), SyncStatus::Conflict);
    }

    #[test]
    fn test_sync_status_display() {
        assert_eq!(SyncStatus::Offline.to_string(), "offline");
        assert_eq!(SyncStatus::Conflict.to_string(), "conflict");
    }
}
