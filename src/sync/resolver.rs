//! Conflict Resolver
//!
//! Picks the winning value for a conflict. Removing the conflict from the
//! engine state is the engine's job; this module only decides.

use crate::sync::types::{ConflictData, ResolutionStrategy, Versioned};
use crate::sync::version::VersionFactory;
use serde::Serialize;

/// Select the winner of `conflict` under `strategy`.
///
/// - `LastWriteWins`: the later timestamp wins; a tie keeps local.
/// - `RejectRemote`: local, always.
/// - `Merge`: remote payload re-versioned by `factory`'s node.
pub fn resolve_conflict<T: Serialize + Clone>(
    conflict: &ConflictData<T>,
    strategy: ResolutionStrategy,
    factory: &VersionFactory,
) -> Result<Versioned<T>, serde_json::Error> {
    let local = &conflict.local_version;
    let remote = &conflict.remote_version;

    match strategy {
        ResolutionStrategy::LastWriteWins => {
            if remote.timestamp() > local.timestamp() {
                Ok(remote.clone())
            } else {
                Ok(local.clone())
            }
        }
        ResolutionStrategy::RejectRemote => Ok(local.clone()),
        ResolutionStrategy::Merge => factory.merge(local, remote),
    }
}
