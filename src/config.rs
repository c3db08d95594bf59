use crate::sync::SyncConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Node identity
    pub node_id: String,
    pub group_id: Option<String>,
    pub debug: bool,

    // Snapshot persistence
    pub snapshot_path: Option<String>,
    pub key_prefix: String,

    // Peer sync settings
    pub seed_peers: Vec<String>,
    pub sync_latency_ms: u64,
    pub peer_latency_ms: u64,
    pub group_sync_steps: u32,
    pub group_step_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "local".to_string(),
            group_id: None,
            debug: false,
            snapshot_path: None,
            key_prefix: "splitsync".to_string(),
            seed_peers: Vec::new(),
            sync_latency_ms: 100,
            peer_latency_ms: 50,
            group_sync_steps: 3,
            group_step_ms: 200,
        }
    }
}

impl Config {
    /// Engine settings derived from this config.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .key_prefix(self.key_prefix.clone())
            .seed_peers(self.seed_peers.clone())
            .sync_latency(Duration::from_millis(self.sync_latency_ms))
            .peer_latency(Duration::from_millis(self.peer_latency_ms))
            .group_sync(self.group_sync_steps, Duration::from_millis(self.group_step_ms))
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let node_id = std::env::var("SPLITSYNC_NODE_ID")
        .unwrap_or_else(|_| "local".to_string());

    let group_id = std::env::var("SPLITSYNC_GROUP_ID").ok();

    let debug = std::env::var("DEBUG").is_ok();

    let snapshot_path = std::env::var("SPLITSYNC_SNAPSHOT_PATH").ok();

    let key_prefix = std::env::var("SPLITSYNC_KEY_PREFIX")
        .unwrap_or_else(|_| "splitsync".to_string());

    let seed_peers = std::env::var("SPLITSYNC_SEED_PEERS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let sync_latency_ms = std::env::var("SPLITSYNC_SYNC_LATENCY_MS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);

    let peer_latency_ms = std::env::var("SPLITSYNC_PEER_LATENCY_MS")
        .unwrap_or_else(|_| "50".to_string())
        .parse()
        .unwrap_or(50);

    let group_sync_steps = std::env::var("SPLITSYNC_GROUP_SYNC_STEPS")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3);

    let group_step_ms = std::env::var("SPLITSYNC_GROUP_STEP_MS")
        .unwrap_or_else(|_| "200".to_string())
        .parse()
        .unwrap_or(200);

    let cfg = Config {
        node_id,
        group_id,
        debug,
        snapshot_path,
        key_prefix,
        seed_peers,
        sync_latency_ms,
        peer_latency_ms,
        group_sync_steps,
        group_step_ms,
    };
    cfg.sync_config().validate()?;
    Ok(cfg)
}
