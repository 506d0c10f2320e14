use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

use crate::tempfiles::TempFile;

/// Extension of converted files.
pub const TARGET_EXTENSION: &str = "mp4";

/// How much of ffmpeg's stderr ends up in an error message.
const STDERR_TAIL: usize = 600;

/// A conversion backend that runs jobs in the background.
///
/// `start` returns immediately; the receiver yields exactly once, when the job
/// has finished, carrying the job's own success or failure. Dropping the
/// receiver abandons the job.
pub trait TranscodeEngine: Send + Sync {
    fn start(&self, source: &Path, output: &Path) -> oneshot::Receiver<Result<()>>;
}

/// Runs the `ffmpeg` CLI, producing H.264/AAC in an MP4 container.
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn command(&self, source: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(source)
            .args([
                "-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-movflags", "+faststart", "-f", "mp4",
            ])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

async fn run_ffmpeg(mut command: Command) -> Result<()> {
    let output = command.output().await.context("Failed to spawn ffmpeg")?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let mut start = stderr.len().saturating_sub(STDERR_TAIL);
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    anyhow::bail!("ffmpeg exited with {}: {}", output.status, &stderr[start..])
}

impl TranscodeEngine for FfmpegEngine {
    fn start(&self, source: &Path, output: &Path) -> oneshot::Receiver<Result<()>> {
        let (mut tx, rx) = oneshot::channel();
        let command = self.command(source, output);

        tokio::spawn(async move {
            // Stop listening (and kill ffmpeg) once nobody waits for the result
            let result = tokio::select! {
                result = run_ffmpeg(command) => Some(result),
                _ = tx.closed() => None,
            };
            match result {
                Some(result) => {
                    let _ = tx.send(result);
                }
                None => debug!("Conversion abandoned, ffmpeg stopped"),
            }
        });

        rx
    }
}

/// Turns a source file into a sibling `.mp4` by way of a [`TranscodeEngine`].
pub struct Transcoder {
    engine: Arc<dyn TranscodeEngine>,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(engine: Arc<dyn TranscodeEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Same directory and stem as `source`, with the target extension.
    pub fn output_path(source: &Path) -> PathBuf {
        source.with_extension(TARGET_EXTENSION)
    }

    /// Convert `source` and wait for the engine's completion signal.
    ///
    /// The engine's own verdict is authoritative: a reported failure, a dropped
    /// signal, a timeout, or a missing/empty output file all fail the call, and
    /// any partial output is removed.
    pub async fn convert(&self, source: &Path) -> Result<TempFile> {
        let output = TempFile::adopt(Self::output_path(source));
        debug!("Converting {} into {}", source.display(), output.path().display());

        let done = self.engine.start(source, output.path());

        let signal = tokio::time::timeout(self.timeout, done)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Conversion of {} timed out after {}s",
                    source.display(),
                    self.timeout.as_secs()
                )
            })?;

        signal
            .context("Transcoding engine dropped its completion signal")?
            .with_context(|| format!("Failed to convert {}", source.display()))?;

        let metadata = tokio::fs::metadata(output.path()).await.with_context(|| {
            format!("Conversion produced no file at {}", output.path().display())
        })?;
        if metadata.len() == 0 {
            anyhow::bail!("Conversion produced an empty file at {}", output.path().display());
        }

        Ok(output)
    }
}
