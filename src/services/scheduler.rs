use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::models::SyncStatus;
use crate::services::sync_engine::SyncEngine;

/// Periodic refresh trigger.
/// Runs a sync cycle every `interval`, forever.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval_secs: u64) -> Self {
        Self {
            engine,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Loops until the task is aborted. A failed cycle is logged and the
    /// loop carries on.
    pub async fn start(self) {
        info!("Starting auto-sync scheduler (interval: {:?})", self.interval);

        loop {
            // Wait first; the session start already runs one refresh.
            tokio::time::sleep(self.interval).await;

            match self.engine.refresh().await {
                SyncStatus::Success => {
                    info!("Auto-sync completed");
                }
                other => {
                    warn!("Auto-sync ended in {}", other);
                }
            }
        }
    }
}
