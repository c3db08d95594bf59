//! Peer Registry
//!
//! Tracks every peer this node has ever connected to. Entries are never
//! removed; a departed peer stays visible as offline.

use crate::sync::types::{PeerConnection, PeerStatus};
use parking_lot::RwLock;

/// Internal link state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
    Connecting,
}

impl From<LinkState> for PeerStatus {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Connected => PeerStatus::Online,
            LinkState::Disconnected => PeerStatus::Offline,
            LinkState::Connecting => PeerStatus::Connecting,
        }
    }
}

impl From<PeerStatus> for LinkState {
    fn from(status: PeerStatus) -> Self {
        match status {
            PeerStatus::Online => LinkState::Connected,
            PeerStatus::Offline => LinkState::Disconnected,
            PeerStatus::Connecting => LinkState::Connecting,
        }
    }
}

#[derive(Debug, Clone)]
struct PeerEntry {
    id: String,
    link: LinkState,
    last_seen: u64,
    sync_progress: Option<u8>,
}

impl PeerEntry {
    fn snapshot(&self) -> PeerConnection {
        PeerConnection {
            id: self.id.clone(),
            status: self.link.into(),
            last_seen: self.last_seen,
            sync_progress: self.sync_progress,
        }
    }
}

/// Registry of known peers, in first-seen order.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<Vec<PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a peer's link state, creating the entry if needed.
    /// Returns `true` if the peer was not known before.
    pub fn set_link(&self, id: &str, link: LinkState, now: u64) -> bool {
        let mut peers = self.peers.write();
        match peers.iter_mut().find(|p| p.id == id) {
            Some(entry) => {
                entry.link = link;
                entry.last_seen = now;
                false
            }
            None => {
                peers.push(PeerEntry {
                    id: id.to_string(),
                    link,
                    last_seen: now,
                    sync_progress: None,
                });
                true
            }
        }
    }

    /// Mark a known peer offline. Unknown peers are left unregistered.
    /// Returns whether the peer was known.
    pub fn disconnect(&self, id: &str, now: u64) -> bool {
        let mut peers = self.peers.write();
        match peers.iter_mut().find(|p| p.id == id) {
            Some(entry) => {
                entry.link = LinkState::Disconnected;
                entry.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Record sync progress (clamped to 100) for a known peer.
    pub fn set_sync_progress(&self, id: &str, progress: u8) -> bool {
        let mut peers = self.peers.write();
        match peers.iter_mut().find(|p| p.id == id) {
            Some(entry) => {
                entry.sync_progress = Some(progress.min(100));
                true
            }
            None => false,
        }
    }

    /// Link state of a peer, if known.
    pub fn link(&self, id: &str) -> Option<LinkState> {
        self.peers.read().iter().find(|p| p.id == id).map(|p| p.link)
    }

    /// Copy of all peers.
    pub fn snapshot(&self) -> Vec<PeerConnection> {
        self.peers.read().iter().map(PeerEntry::snapshot).collect()
    }

    /// Rebuild the registry from persisted peers. Restored peers start offline:
    /// nothing is connected right after a restart.
    pub fn restore(&self, peers: &[PeerConnection]) {
        let mut entries = self.peers.write();
        entries.clear();
        for peer in peers {
            if entries.iter().any(|p| p.id == peer.id) {
                continue;
            }
            entries.push(PeerEntry {
                id: peer.id.clone(),
                link: LinkState::Disconnected,
                last_seen: peer.last_seen,
                sync_progress: peer.sync_progress,
            });
        }
    }

    pub fn clear(&self) {
        self.peers.write().clear();
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
