//! Sync Engine
//!
//! Orchestrates the version factory, conflict detection and resolution, the
//! peer registry, the operation log and the state store behind one
//! per-node interface.
//!
//! Public operations are serialized per engine by an internal gate, so they
//! never interleave within one instance. Engines share nothing with each
//! other; peers exchange data only through `pull_changes`/`push_changes`.

use crate::adapters::outbound::{DashMapSnapshotStore, SystemClock};
use crate::domain::ports::{Clock, SnapshotStore};
use crate::sync::config::SyncConfig;
use crate::sync::detector::detect_conflict;
use crate::sync::error::SyncError;
use crate::sync::events::{EventBus, EventKind, ListenerId, SyncEvent};
use crate::sync::oplog::OperationLog;
use crate::sync::peers::{LinkState, PeerRegistry};
use crate::sync::resolver;
use crate::sync::state::StateStore;
use crate::sync::types::{
    ConflictData, NodeId, OperationKind, PeerConnection, PeerStatus, ResolutionStrategy, SyncOperation,
    SyncState, SyncStatus, VersionMetadata, Versioned,
};
use crate::sync::version::VersionFactory;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Peer synchronization and conflict-resolution engine for one node.
pub struct SyncEngine {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    factory: RwLock<Option<VersionFactory>>,
    events: EventBus,
    state: StateStore,
    peers: PeerRegistry,
    oplog: OperationLog,
    gate: Mutex<()>,
}

impl SyncEngine {
    /// Create an engine. It stays `idle` and rejects operations until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(
        config: SyncConfig,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let state = StateStore::new(snapshots, config.key_prefix.clone());

        Ok(Self {
            config,
            clock,
            factory: RwLock::new(None),
            events: EventBus::new(),
            state,
            peers: PeerRegistry::new(),
            oplog: OperationLog::new(),
            gate: Mutex::new(()),
        })
    }

    /// Node identity, once initialized.
    pub fn node_id(&self) -> Option<NodeId> {
        self.factory.read().as_ref().map(|f| f.node_id().clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.factory.read().is_some()
    }

    /// Group scope, if any.
    pub fn group_id(&self) -> Option<String> {
        self.state.read(|s| s.group_id.clone())
    }

    /// The engine's event dispatcher.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn version_factory(&self) -> Result<VersionFactory, SyncError> {
        self.factory.read().clone().ok_or(SyncError::NotInitialized)
    }

    // ===== Lifecycle =====

    /// Bind the engine to a node, rehydrate persisted state, seed peers and
    /// settle into `synced` (or `conflict` if persisted conflicts remain).
    ///
    /// Calling this on an initialized engine is a no-op.
    pub async fn initialize(
        &self,
        node_id: impl Into<String>,
        group_id: Option<String>,
    ) -> Result<(), SyncError> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(SyncError::InvalidNodeId);
        }

        let _gate = self.gate.lock().await;
        if let Some(existing) = self.node_id() {
            tracing::warn!("sync engine already initialized as {}, ignoring", existing);
            return Ok(());
        }

        self.state.bind(&node_id);
        let (persisted, ops) = match self.state.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("{}; starting from empty state", e);
                (None, Vec::new())
            }
        };

        let restored = persisted.is_some();
        let mut state = persisted.unwrap_or_default();
        if group_id.is_some() {
            state.group_id = group_id;
        }
        self.peers.restore(&state.peers);
        state.peers = self.peers.snapshot();
        self.oplog.restore(ops);
        self.state.replace(state);

        *self.factory.write() = Some(VersionFactory::new(NodeId::new(&node_id), self.clock.clone()));

        for peer_id in &self.config.seed_peers {
            self.connect_peer(peer_id).await;
        }

        let state = self.state.commit(|s| s.status = s.settled_status());
        self.state.persist().await;
        self.events.emit(SyncEvent::StatusChanged { status: state.status });

        tracing::info!(
            "sync engine initialized node_id={} group={:?} restored={} peers={} operations={}",
            node_id,
            state.group_id,
            restored,
            state.peers.len(),
            self.oplog.len()
        );
        Ok(())
    }

    /// Run a sync exchange: `syncing`, simulated latency, then `synced`
    /// (or `conflict` while conflicts are open). Clears the offline backlog.
    ///
    /// Dropping the future before it settles leaves the engine in `error`.
    pub async fn start_sync(&self) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let exchange = ExchangeGuard::new(self);
        self.set_status(SyncStatus::Syncing).await;
        self.clock.sleep(self.config.sync_latency).await;
        self.settle().await;
        exchange.disarm();

        tracing::info!("sync exchange complete, operations={}", self.oplog.len());
        Ok(())
    }

    /// Go `offline`. Waits for any in-flight operation to finish first.
    pub async fn stop_sync(&self) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        self.clock.sleep(self.config.stop_latency).await;
        self.set_status(SyncStatus::Offline).await;

        tracing::info!("sync stopped");
        Ok(())
    }

    /// Settle into `error` after an unrecoverable failure in an outer layer.
    pub async fn mark_error(&self, reason: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        tracing::warn!("sync engine entering error state: {}", reason);
        self.set_status(SyncStatus::Error).await;
        Ok(())
    }

    /// Drop listeners, in-memory state, peers and the log, and return to the
    /// uninitialized state. The persisted snapshot is left in place.
    pub async fn destroy(&self) {
        let _gate = self.gate.lock().await;

        self.events.clear();
        self.oplog.clear();
        self.peers.clear();
        self.state.replace(SyncState::default());
        self.state.unbind();
        *self.factory.write() = None;

        tracing::info!("sync engine destroyed");
    }

    // ===== Data exchange =====

    /// Record a synced batch for `table` under `metadata`.
    ///
    /// Each record becomes an `update` operation keyed by its `id` field.
    /// While offline the operations are queued and counted in
    /// `pending_operations` without leaving `offline`.
    pub async fn sync_data(
        &self,
        table: &str,
        data: Vec<Value>,
        metadata: VersionMetadata,
    ) -> Result<usize, SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let offline = self.state.read(|s| s.status) == SyncStatus::Offline;
        let exchange = ExchangeGuard::new(self);
        if !offline {
            self.set_status(SyncStatus::Syncing).await;
        }

        let ops: Vec<SyncOperation> = data
            .iter()
            .map(|record| {
                SyncOperation::new(
                    OperationKind::Update,
                    table,
                    record_id_of(record),
                    record.clone(),
                    metadata.clone(),
                )
            })
            .collect();
        let appended = self.oplog.append(ops).len();
        self.state.persist_operations(&self.oplog.snapshot()).await;

        self.events.emit(SyncEvent::DataUpdated {
            table: Some(table.to_string()),
            data: Value::Array(data),
            metadata,
        });

        if offline {
            self.state.commit(|s| s.pending_operations = add_pending(s.pending_operations, appended));
            self.state.persist().await;
            tracing::debug!("queued {} {} operations while offline", appended, table);
        } else {
            self.settle().await;
            tracing::debug!("synced {} {} records", appended, table);
        }
        exchange.disarm();

        Ok(appended)
    }

    /// Operations with `timestamp > since`, or all of them, in push order.
    pub async fn pull_changes(&self, since: Option<u64>) -> Result<Vec<SyncOperation>, SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;
        Ok(self.oplog.since(since))
    }

    /// Append operations received from a peer. Already-known operation ids
    /// are skipped. Returns the number appended.
    pub async fn push_changes(&self, ops: Vec<SyncOperation>) -> Result<usize, SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let appended = self.oplog.append(ops);
        if appended.is_empty() {
            return Ok(0);
        }
        self.state.persist_operations(&self.oplog.snapshot()).await;

        let offline = self.state.read(|s| s.status) == SyncStatus::Offline;
        if offline {
            self.state
                .commit(|s| s.pending_operations = add_pending(s.pending_operations, appended.len()));
            self.state.persist().await;
        }

        for op in &appended {
            self.events.emit(SyncEvent::DataUpdated {
                table: Some(op.table.clone()),
                data: op.data.clone(),
                metadata: op.metadata.clone(),
            });
        }

        tracing::debug!("accepted {} operations from peers", appended.len());
        Ok(appended.len())
    }

    // ===== Versions and conflicts =====

    /// Stamp version 1 metadata onto `data`.
    pub fn create_version<T: Serialize>(&self, data: T) -> Result<Versioned<T>, SyncError> {
        Ok(self.version_factory()?.create(data)?)
    }

    /// Merge two versions into a new one owned by this node.
    pub fn merge_versions<T: Serialize + Clone>(
        &self,
        local: &Versioned<T>,
        remote: &Versioned<T>,
    ) -> Result<Versioned<T>, SyncError> {
        Ok(self.version_factory()?.merge(local, remote)?)
    }

    /// Compare two versions; a detected conflict is recorded, moves the
    /// engine to `conflict` and is announced with all open conflicts.
    pub async fn detect_conflicts<T: Serialize + Clone>(
        &self,
        local: &Versioned<T>,
        remote: &Versioned<T>,
    ) -> Result<Option<ConflictData<T>>, SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let Some(conflict) = detect_conflict(local, remote) else {
            return Ok(None);
        };
        let stored = conflict.to_value()?;

        if self.state.read(|s| s.has_conflict(&stored.id)) {
            tracing::debug!("conflict {} already open", conflict.id);
            return Ok(Some(conflict));
        }

        let previous = self.state.read(|s| s.status);
        let state = self.state.commit(|s| {
            s.conflicts.push(stored);
            s.status = SyncStatus::Conflict;
        });
        self.state.persist().await;

        if previous != SyncStatus::Conflict {
            self.events.emit(SyncEvent::StatusChanged { status: SyncStatus::Conflict });
        }
        self.events.emit(SyncEvent::ConflictDetected {
            conflicts: state.conflicts.clone(),
        });

        tracing::info!(
            "conflict detected id={} local={}@v{} remote={}@v{} open={}",
            conflict.id,
            local.node_id(),
            local.version(),
            remote.node_id(),
            remote.version(),
            state.conflicts.len()
        );
        Ok(Some(conflict))
    }

    /// Resolve an open conflict and retire it. Unknown ids fail with
    /// `ConflictNotFound` and leave the state untouched.
    pub async fn resolve_conflict<T: Serialize + Clone>(
        &self,
        conflict: &ConflictData<T>,
        strategy: ResolutionStrategy,
    ) -> Result<Versioned<T>, SyncError> {
        let _gate = self.gate.lock().await;
        let factory = self.version_factory()?;

        if !self.state.read(|s| s.has_conflict(&conflict.id)) {
            return Err(SyncError::ConflictNotFound(conflict.id.clone()));
        }

        let winner = resolver::resolve_conflict(conflict, strategy, &factory)?;
        let announced = winner.to_value()?;

        let previous = self.state.read(|s| s.status);
        let state = self.state.try_commit(|s| {
            let pos = s
                .conflicts
                .iter()
                .position(|c| c.id == conflict.id)
                .ok_or_else(|| SyncError::ConflictNotFound(conflict.id.clone()))?;
            let mut retired = s.conflicts.remove(pos);
            retired.resolution = Some(strategy);
            tracing::debug!("retired conflict id={} resolution={:?}", retired.id, retired.resolution);

            if s.conflicts.is_empty() && s.status == SyncStatus::Conflict {
                s.status = SyncStatus::Synced;
            }
            Ok::<(), SyncError>(())
        })?;
        self.state.persist().await;

        if state.status != previous {
            self.events.emit(SyncEvent::StatusChanged { status: state.status });
        }
        self.events.emit(SyncEvent::DataUpdated {
            table: None,
            data: announced.data,
            metadata: announced.metadata,
        });

        tracing::info!(
            "conflict resolved id={} strategy={} winner={}@v{} open={}",
            conflict.id,
            strategy,
            winner.node_id(),
            winner.version(),
            state.conflicts.len()
        );
        Ok(winner)
    }

    /// Open conflicts, oldest first.
    pub fn get_conflicts(&self) -> Vec<ConflictData<Value>> {
        self.state.read(|s| s.conflicts.clone())
    }

    /// Copy of the current state. Always available, even before initialization.
    pub fn get_sync_state(&self) -> SyncState {
        self.state.snapshot()
    }

    // ===== Peers =====

    /// Copy of all known peers.
    pub fn get_peers(&self) -> Vec<PeerConnection> {
        self.peers.snapshot()
    }

    /// Connect to a peer. Reconnecting refreshes `last_seen` without creating
    /// a second entry.
    pub async fn connect_to_peer(&self, peer_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;
        self.connect_peer(peer_id).await;
        Ok(())
    }

    /// Mark a peer offline. Unknown peers are not registered, but the
    /// disconnect is still announced.
    pub async fn disconnect_from_peer(&self, peer_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let known = self.peers.disconnect(peer_id, self.clock.now_millis());
        if known {
            self.sync_peers_into_state();
            self.state.persist().await;
        }
        self.events.emit(SyncEvent::PeerDisconnected {
            peer_id: peer_id.to_string(),
        });

        tracing::info!("peer disconnected id={} known={}", peer_id, known);
        Ok(())
    }

    async fn connect_peer(&self, peer_id: &str) {
        if self.peers.link(peer_id) != Some(LinkState::Connected) {
            self.peers.set_link(peer_id, LinkState::Connecting, self.clock.now_millis());
            self.sync_peers_into_state();
            self.clock.sleep(self.config.peer_latency).await;
        }

        self.peers.set_link(peer_id, LinkState::Connected, self.clock.now_millis());
        self.sync_peers_into_state();
        self.state.persist().await;
        self.events.emit(SyncEvent::PeerConnected {
            peer_id: peer_id.to_string(),
        });

        tracing::info!("peer connected id={}", peer_id);
    }

    fn sync_peers_into_state(&self) {
        let peers = self.peers.snapshot();
        self.state.commit(|s| s.peers = peers);
    }

    // ===== Groups =====

    /// Scope the engine to a group.
    pub async fn join_group(&self, group_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;
        self.join(group_id).await;
        Ok(())
    }

    /// Leave a group. No-op if the engine is scoped to a different one.
    pub async fn leave_group(&self, group_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        let left = self.state.read(|s| s.group_id.as_deref() == Some(group_id));
        if left {
            self.state.commit(|s| s.group_id = None);
            self.state.persist().await;
            tracing::info!("left group {}", group_id);
        }
        Ok(())
    }

    /// Join `group_id` if needed, then run a group sync.
    pub async fn sync_group(&self, group_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;

        if self.state.read(|s| s.group_id.as_deref() != Some(group_id)) {
            self.join(group_id).await;
        }
        self.run_group_sync(group_id).await;
        Ok(())
    }

    /// Run a group sync: `syncing` with a `pending_operations` countdown,
    /// one step delay per operation, then settle.
    pub async fn sync_group_data(&self, group_id: &str) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.version_factory()?;
        self.run_group_sync(group_id).await;
        Ok(())
    }

    async fn join(&self, group_id: &str) {
        self.state.commit(|s| s.group_id = Some(group_id.to_string()));
        self.state.persist().await;
        tracing::info!("joined group {}", group_id);
    }

    async fn run_group_sync(&self, group_id: &str) {
        let steps = self.config.group_sync_steps;
        let online: Vec<String> = self
            .peers
            .snapshot()
            .into_iter()
            .filter(|p| p.status == PeerStatus::Online)
            .map(|p| p.id)
            .collect();

        let exchange = ExchangeGuard::new(self);
        let previous = self.state.read(|s| s.status);
        self.state.commit(|s| {
            s.status = SyncStatus::Syncing;
            s.pending_operations = steps;
        });
        self.state.persist().await;
        if previous != SyncStatus::Syncing {
            self.events.emit(SyncEvent::StatusChanged { status: SyncStatus::Syncing });
        }

        for remaining in (0..steps).rev() {
            self.clock.sleep(self.config.group_step_delay).await;

            let progress = progress_percent(steps - remaining, steps);
            for peer in &online {
                self.peers.set_sync_progress(peer, progress);
            }
            let peers = self.peers.snapshot();
            self.state.commit(|s| {
                s.pending_operations = remaining;
                s.peers = peers;
            });
            self.state.persist().await;
            tracing::debug!("group {} sync progress {}%", group_id, progress);
        }

        self.settle().await;
        exchange.disarm();
        tracing::info!("group {} synced", group_id);
    }

    // ===== Events =====

    /// Subscribe to an event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback)
    }

    /// Unsubscribe. No further invocations once this returns.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.events.off(kind, id)
    }

    // ===== Internal transitions =====

    async fn set_status(&self, status: SyncStatus) {
        let previous = self.state.read(|s| s.status);
        self.state.commit(|s| s.status = status);
        self.state.persist().await;
        if previous != status {
            self.events.emit(SyncEvent::StatusChanged { status });
        }
    }

    /// Finish an exchange: settled status, `last_sync = now`, backlog cleared.
    async fn settle(&self) {
        let now = self.clock.now_millis();
        let previous = self.state.read(|s| s.status);
        let state = self.state.commit(|s| {
            s.status = s.settled_status();
            s.last_sync = Some(now);
            s.pending_operations = 0;
        });
        self.state.persist().await;

        if state.status != previous {
            self.events.emit(SyncEvent::StatusChanged { status: state.status });
        }
        self.events.emit(SyncEvent::SyncComplete);
    }
}

/// Record key for the operation log: the `id` field, or a fresh id.
fn record_id_of(record: &Value) -> String {
    record
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Grow the offline backlog, saturating at `u32::MAX`.
fn add_pending(pending: u32, added: usize) -> u32 {
    pending.saturating_add(u32::try_from(added).unwrap_or(u32::MAX))
}

fn progress_percent(done: u32, steps: u32) -> u8 {
    if steps == 0 {
        return 100;
    }
    (u64::from(done) * 100 / u64::from(steps)).min(100) as u8
}

/// Moves an exchange that never settled from `syncing` to `error`.
///
/// Armed for the lifetime of an exchange; an exchange future dropped
/// mid-flight runs this on the way out. The snapshot catches up on the next
/// persist.
struct ExchangeGuard<'a> {
    engine: &'a SyncEngine,
    armed: bool,
}

impl<'a> ExchangeGuard<'a> {
    fn new(engine: &'a SyncEngine) -> Self {
        Self { engine, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut interrupted = false;
        self.engine.state.commit(|s| {
            if s.status == SyncStatus::Syncing {
                s.status = SyncStatus::Error;
                interrupted = true;
            }
        });
        if interrupted {
            tracing::warn!("sync exchange dropped before settling, entering error state");
            self.engine
                .events
                .emit(SyncEvent::StatusChanged { status: SyncStatus::Error });
        }
    }
}

/// Builder for SyncEngine with fluent API.
pub struct SyncEngineBuilder {
    config: SyncConfig,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SyncEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            snapshots: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed_peers(mut self, peers: Vec<String>) -> Self {
        self.config = self.config.seed_peers(peers);
        self
    }

    pub fn snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine. Defaults to an in-memory snapshot store and the
    /// system clock.
    pub fn build(self) -> Result<SyncEngine, SyncError> {
        let snapshots = self
            .snapshots
            .unwrap_or_else(|| Arc::new(DashMapSnapshotStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        SyncEngine::new(self.config, snapshots, clock)
    }
}

impl Default for SyncEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
