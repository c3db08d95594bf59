//! Sync Configuration
//!
//! Configuration for a sync engine instance.

use std::time::Duration;

/// Configuration for a sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Prefix for persisted snapshot keys (default: "splitsync")
    pub key_prefix: String,

    /// Peers connected during initialization (default: none)
    pub seed_peers: Vec<String>,

    /// Simulated latency of a full sync exchange (default: 100ms)
    pub sync_latency: Duration,

    /// Simulated peer handshake latency (default: 50ms)
    pub peer_latency: Duration,

    /// Simulated latency of stopping sync (default: 50ms)
    pub stop_latency: Duration,

    /// Number of progress steps in a group sync (default: 3)
    pub group_sync_steps: u32,

    /// Delay per group sync step (default: 200ms)
    pub group_step_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_prefix: "splitsync".to_string(),
            seed_peers: Vec::new(),
            sync_latency: Duration::from_millis(100),
            peer_latency: Duration::from_millis(50),
            stop_latency: Duration::from_millis(50),
            group_sync_steps: 3,
            group_step_delay: Duration::from_millis(200),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the peers seeded on initialization.
    pub fn seed_peers(mut self, peers: Vec<String>) -> Self {
        self.seed_peers = peers;
        self
    }

    /// Set the sync exchange latency.
    pub fn sync_latency(mut self, latency: Duration) -> Self {
        self.sync_latency = latency;
        self
    }

    /// Set the peer handshake latency.
    pub fn peer_latency(mut self, latency: Duration) -> Self {
        self.peer_latency = latency;
        self
    }

    /// Set the stop latency.
    pub fn stop_latency(mut self, latency: Duration) -> Self {
        self.stop_latency = latency;
        self
    }

    /// Set the group sync countdown.
    pub fn group_sync(mut self, steps: u32, step_delay: Duration) -> Self {
        self.group_sync_steps = steps;
        self.group_step_delay = step_delay;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::MissingKeyPrefix);
        }
        if self.group_sync_steps == 0 {
            return Err(ConfigError::ZeroGroupSyncSteps);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("key_prefix is required")]
    MissingKeyPrefix,
    #[error("group_sync_steps must be at least 1")]
    ZeroGroupSyncSteps,
}
