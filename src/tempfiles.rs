use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fetch::SOURCE_EXTENSION;
use crate::transcode::TARGET_EXTENSION;

/// A temporary file owned by a single pipeline run.
///
/// The file is removed exactly once: either explicitly through [`TempFile::remove`]
/// or, if the owner bails out early, when the guard is dropped. A path that was
/// never created is not an error.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    /// Allocate a collision-free path `<dir>/<uuid>.<extension>`. Nothing is created on disk.
    pub fn allocate(dir: &Path, extension: &str) -> Self {
        let name = format!("{}.{}", Uuid::new_v4(), extension);
        Self::adopt(dir.join(name))
    }

    /// Take ownership of an existing (or soon to exist) path.
    pub fn adopt(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, logging anything other than "already gone".
    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Whether `path` looks like a file this bot creates: `<uuid>.src` or `<uuid>.mp4`.
fn is_run_file(path: &Path) -> bool {
    let extension_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == SOURCE_EXTENSION || e == TARGET_EXTENSION);
    let stem_is_uuid = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| Uuid::parse_str(s).is_ok());
    extension_matches && stem_is_uuid
}

/// Delete run files in `dir` whose last modification is at least `max_age` ago.
///
/// These are leftovers of a process that died mid-run; live runs always clean
/// up after themselves. Returns the number of files removed.
pub async fn sweep_stale(dir: &Path, max_age: Duration) -> Result<usize> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read temp directory: {}", dir.display()))?;

    let mut removed = 0;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !is_run_file(&path) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        // mtime in the future (clock skew) counts as fresh
        let stale = metadata
            .modified()
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age >= max_age);
        if !stale {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Swept stale temp file {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
