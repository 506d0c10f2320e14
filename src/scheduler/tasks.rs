use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::tempfiles::sweep_stale;

pub async fn heartbeat() {
    info!("Heartbeat: bot is alive");
}

/// Remove orphaned run files, logging the result.
pub async fn sweep_temp_dir(dir: PathBuf, max_age: Duration) {
    match sweep_stale(&dir, max_age).await {
        Ok(0) => {}
        Ok(n) => info!("Removed {} stale temp file(s) from {}", n, dir.display()),
        Err(e) => warn!("Temp directory sweep failed: {:#}", e),
    }
}
