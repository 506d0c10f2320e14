pub mod tasks;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Hourly "still alive" log line.
const HEARTBEAT_CRON: &str = "0 0 * * * *";

/// Orphaned temp files are looked for every 15 minutes.
const SWEEP_CRON: &str = "0 */15 * * * *";

/// Background housekeeping for the bot: heartbeat and temp-dir sweeps.
pub struct Housekeeper {
    jobs: JobScheduler,
}

impl Housekeeper {
    /// Register the housekeeping jobs for `temp_dir` and start running them.
    pub async fn start(temp_dir: PathBuf, stale_after: Duration) -> Result<Self> {
        let jobs = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        let heartbeat = Job::new_async(HEARTBEAT_CRON, |_uuid, _lock| Box::pin(tasks::heartbeat()))
            .context("Failed to create heartbeat job")?;
        jobs.add(heartbeat)
            .await
            .context("Failed to add heartbeat job")?;

        let sweep_dir = temp_dir.clone();
        let sweep = Job::new_async(SWEEP_CRON, move |_uuid, _lock| {
            Box::pin(tasks::sweep_temp_dir(sweep_dir.clone(), stale_after))
        })
        .context("Failed to create temp sweep job")?;
        jobs.add(sweep)
            .await
            .context("Failed to add temp sweep job")?;

        jobs.start()
            .await
            .context("Failed to start housekeeping scheduler")?;
        info!(
            "Housekeeping started: sweeping {} for files older than {}s",
            temp_dir.display(),
            stale_after.as_secs()
        );

        Ok(Self { jobs })
    }

    pub async fn stop(mut self) -> Result<()> {
        self.jobs
            .shutdown()
            .await
            .context("Failed to stop housekeeping scheduler")?;
        info!("Housekeeping stopped");
        Ok(())
    }
}
