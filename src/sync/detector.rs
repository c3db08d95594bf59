//! Conflict Detector
//!
//! Flags concurrent edits between a local and a remote version of the same
//! logical record.
//!
//! A conflict is raised only when both sides carry the same version number,
//! their content differs, and their timestamps are within
//! [`CONFLICT_WINDOW_MS`] of each other. Everything else is left to the
//! caller, who takes the higher version. This is a two-replica heuristic,
//! not causal history tracking.

use crate::sync::types::{ConflictData, ConflictType, Versioned};
use serde::Serialize;
use uuid::Uuid;

/// Two same-version edits closer than this are treated as a race.
pub const CONFLICT_WINDOW_MS: u64 = 1000;

/// Compare two versions and return a `concurrent_edit` conflict if they raced.
pub fn detect_conflict<T: Serialize + Clone>(
    local: &Versioned<T>,
    remote: &Versioned<T>,
) -> Option<ConflictData<T>> {
    if local.version() != remote.version() {
        return None;
    }
    if local.checksum() == remote.checksum() {
        return None;
    }
    if local.timestamp().abs_diff(remote.timestamp()) >= CONFLICT_WINDOW_MS {
        return None;
    }

    Some(ConflictData {
        id: conflict_id(local, remote),
        local_version: local.clone(),
        remote_version: remote.clone(),
        conflict_type: ConflictType::ConcurrentEdit,
        conflict_fields: differing_fields(&local.data, &remote.data),
        resolution: None,
    })
}

/// Stable id for a local/remote pair, so re-detecting the same race finds
/// the already-open conflict.
fn conflict_id<T>(local: &Versioned<T>, remote: &Versioned<T>) -> String {
    let key = format!(
        "{}:{}:{}:{}|{}:{}:{}:{}",
        local.node_id(),
        local.version(),
        local.timestamp(),
        local.checksum(),
        remote.node_id(),
        remote.version(),
        remote.timestamp(),
        remote.checksum()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Top-level fields whose values differ, when both payloads are JSON objects.
fn differing_fields<T: Serialize>(local: &T, remote: &T) -> Option<Vec<String>> {
    let local = serde_json::to_value(local).ok()?;
    let remote = serde_json::to_value(remote).ok()?;
    let (local, remote) = (local.as_object()?, remote.as_object()?);

    let mut fields: Vec<String> = local
        .keys()
        .chain(remote.keys())
        .filter(|k| local.get(*k) != remote.get(*k))
        .cloned()
        .collect();
    fields.sort();
    fields.dedup();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}
