//! Event Bus
//!
//! Per-engine dispatcher for sync notifications. Delivery is synchronous:
//! listeners run on the emitting task, in registration order.

use crate::sync::types::{ConflictData, SyncStatus, VersionMetadata};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataUpdated,
    ConflictDetected,
    SyncComplete,
    PeerConnected,
    PeerDisconnected,
    StatusChanged,
}

/// Events emitted by the sync engine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Data was synced, pulled from a peer, or produced by a resolution
    DataUpdated {
        table: Option<String>,
        data: Value,
        metadata: VersionMetadata,
    },
    /// The set of open conflicts grew; carries all open conflicts
    ConflictDetected { conflicts: Vec<ConflictData<Value>> },
    /// An exchange settled
    SyncComplete,
    PeerConnected { peer_id: String },
    PeerDisconnected { peer_id: String },
    StatusChanged { status: SyncStatus },
}

impl SyncEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::DataUpdated { .. } => EventKind::DataUpdated,
            SyncEvent::ConflictDetected { .. } => EventKind::ConflictDetected,
            SyncEvent::SyncComplete => EventKind::SyncComplete,
            SyncEvent::PeerConnected { .. } => EventKind::PeerConnected,
            SyncEvent::PeerDisconnected { .. } => EventKind::PeerDisconnected,
            SyncEvent::StatusChanged { .. } => EventKind::StatusChanged,
        }
    }
}

/// Callback invoked for each matching event.
pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    active: Arc<AtomicBool>,
    callback: Listener,
}

/// Event dispatcher owned by one engine.
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().entry(kind).or_default().push(Registration {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback: Arc::new(callback),
        });
        id
    }

    /// Unregister a listener. Returns whether it was registered.
    ///
    /// Once this returns, the listener is never invoked again, including by
    /// an `emit` that is already iterating.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        match list.iter().position(|r| r.id == id) {
            Some(pos) => {
                let reg = list.remove(pos);
                reg.active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to its listeners, in registration order.
    pub fn emit(&self, event: SyncEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while we iterate.
        let targets: Vec<(Arc<AtomicBool>, Listener)> = match self.listeners.read().get(&event.kind()) {
            Some(list) => list
                .iter()
                .map(|r| (r.active.clone(), r.callback.clone()))
                .collect(),
            None => return,
        };

        for (active, callback) in targets {
            if active.load(Ordering::SeqCst) {
                callback(&event);
            }
        }
    }

    /// Number of listeners registered for a kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Drop every listener.
    pub fn clear(&self) {
        let mut listeners = self.listeners.write();
        for reg in listeners.values().flatten() {
            reg.active.store(false, Ordering::SeqCst);
        }
        listeners.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
