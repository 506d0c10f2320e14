use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::tempfiles::TempFile;

/// Extension of downloaded source files; the real container is sniffed by ffmpeg.
pub const SOURCE_EXTENSION: &str = "src";

/// Streams remote files into the temp directory.
pub struct Fetcher {
    client: reqwest::Client,
    temp_dir: PathBuf,
}

impl Fetcher {
    /// `timeout` bounds the whole request, body included.
    pub fn new(temp_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, temp_dir })
    }

    /// Download `url` into a fresh `<uuid>.src` file.
    ///
    /// No retries and no content checks: whatever the server sends is written
    /// out as-is. On error the partially written file is removed before
    /// returning, since the guard is dropped with it.
    pub async fn fetch(&self, url: &str) -> Result<TempFile> {
        let dest = TempFile::allocate(&self.temp_dir, SOURCE_EXTENSION);

        let mut file = tokio::fs::File::create(dest.path())
            .await
            .with_context(|| format!("Failed to create temp file: {}", dest.path().display()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Download of {} failed with status {}", url, status);
        }

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed to read body of {}", url))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.path().display()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", dest.path().display()))?;

        debug!("Downloaded {} bytes from {} into {}", written, url, dest.path().display());
        Ok(dest)
    }
}
