//! Clock Port
//!
//! Source of time and simulated latency for the engine.

use async_trait::async_trait;
use std::time::Duration;

/// Time source and scheduler.
///
/// All version timestamps and all simulated delays go through this trait,
/// so tests can drive the engine on virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since UNIX epoch.
    fn now_millis(&self) -> u64;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}
