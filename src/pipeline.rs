use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::config::NotifyMode;
use crate::fetch::Fetcher;
use crate::platform::notify::notify;
use crate::platform::publish::{display_name, publish};
use crate::platform::{ChatApi, InboundEvent};
use crate::transcode::Transcoder;

/// Steps of a single run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Notifying,
    Downloading,
    Converting,
    Uploading,
    Done,
}

/// Why a run ended in the failed state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("conversion failed: {0:#}")]
    Convert(anyhow::Error),
    #[error("upload failed: {0:#}")]
    Upload(anyhow::Error),
}

impl RunError {
    /// The step that failed.
    pub fn stage(&self) -> RunStage {
        match self {
            RunError::Download(_) => RunStage::Downloading,
            RunError::Convert(_) => RunStage::Converting,
            RunError::Upload(_) => RunStage::Uploading,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Done,
    Failed(RunError),
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, RunOutcome::Done)
    }

    pub fn error(&self) -> Option<&RunError> {
        match self {
            RunOutcome::Done => None,
            RunOutcome::Failed(e) => Some(e),
        }
    }
}

/// Everything a run needs. Shared read-only between concurrent runs.
pub struct Pipeline {
    chat: Arc<dyn ChatApi>,
    fetcher: Fetcher,
    transcoder: Transcoder,
    notify_mode: NotifyMode,
    upload_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        fetcher: Fetcher,
        transcoder: Transcoder,
        notify_mode: NotifyMode,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            fetcher,
            transcoder,
            notify_mode,
            upload_timeout,
        }
    }

    /// Notify, download, convert and upload one URL found in `event`.
    ///
    /// Never panics on I/O failures and never propagates them: the outcome is
    /// logged and returned. Temp files of the run are gone when this returns.
    pub async fn run(&self, url: &str, event: &InboundEvent) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, %url, chat_id = %event.chat_id);

        async {
            match self.execute(url, event).await {
                Ok(()) => {
                    info!("Posted converted file");
                    RunOutcome::Done
                }
                Err(e) => {
                    error!(stage = ?e.stage(), "Run failed: {}", e);
                    RunOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, url: &str, event: &InboundEvent) -> Result<(), RunError> {
        debug!(stage = ?RunStage::Notifying);
        notify(self.chat.as_ref(), event, url, self.notify_mode).await;

        debug!(stage = ?RunStage::Downloading);
        let source = self.fetcher.fetch(url).await.map_err(RunError::Download)?;

        debug!(stage = ?RunStage::Converting, source = %source.path().display());
        let converted = self.transcoder.convert(source.path()).await;
        source.remove().await;
        let output = converted.map_err(RunError::Convert)?;

        let name = display_name(url);
        debug!(stage = ?RunStage::Uploading, output = %output.path().display(), %name);
        let uploaded = tokio::time::timeout(
            self.upload_timeout,
            publish(self.chat.as_ref(), output.path(), &event.chat_id, &name),
        )
        .await
        .unwrap_or_else(|_| {
            Err(anyhow::anyhow!(
                "Upload timed out after {}s",
                self.upload_timeout.as_secs()
            ))
        });
        output.remove().await;
        uploaded.map_err(RunError::Upload)?;

        debug!(stage = ?RunStage::Done);
        Ok(())
    }
}
