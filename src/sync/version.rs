//! Version Factory
//!
//! Stamps version metadata onto domain data and merges two histories
//! into a new version owned by this node.

use crate::domain::ports::Clock;
use crate::sync::types::{checksum_of, NodeId, VersionMetadata, Versioned};
use serde::Serialize;
use std::sync::Arc;

/// Creates and merges versions on behalf of one node.
#[derive(Clone)]
pub struct VersionFactory {
    node_id: NodeId,
    clock: Arc<dyn Clock>,
}

impl VersionFactory {
    pub fn new(node_id: NodeId, clock: Arc<dyn Clock>) -> Self {
        Self { node_id, clock }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Introduce a value. Always starts a fresh lineage at version 1.
    pub fn create<T: Serialize>(&self, data: T) -> Result<Versioned<T>, serde_json::Error> {
        let checksum = checksum_of(&data)?;
        Ok(Versioned::new(
            data,
            VersionMetadata {
                version: 1,
                timestamp: self.clock.now_millis(),
                node_id: self.node_id.clone(),
                checksum,
            },
        ))
    }

    /// Reconcile two histories: remote's payload under version
    /// `max(local, remote) + 1`, attributed to this node.
    ///
    /// The timestamp is strictly later than both inputs even if the local
    /// clock lags behind the remote one.
    pub fn merge<T: Serialize + Clone>(
        &self,
        local: &Versioned<T>,
        remote: &Versioned<T>,
    ) -> Result<Versioned<T>, serde_json::Error> {
        let data = remote.data.clone();
        let checksum = checksum_of(&data)?;
        let newest = local.timestamp().max(remote.timestamp());
        let timestamp = self.clock.now_millis().max(newest.saturating_add(1));

        Ok(Versioned::new(
            data,
            VersionMetadata {
                version: local.version().max(remote.version()) + 1,
                timestamp,
                node_id: self.node_id.clone(),
                checksum,
            },
        ))
    }
}
