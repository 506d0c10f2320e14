use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::platform::ChatApi;
use crate::transcode::TARGET_EXTENSION;

/// Name shown in the chat for the converted file: the URL's last path segment
/// with its extension swapped, e.g. `https://x.test/v/cat.webm` -> `cat.mp4`.
pub fn display_name(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    let stem = segment
        .rsplit_once('.')
        .map_or(segment, |(stem, _)| stem);
    let stem = if stem.is_empty() { "video" } else { stem };
    format!("{}.{}", stem, TARGET_EXTENSION)
}

/// Upload the file at `path` into `chat_id` as `display_name`. No retries.
pub async fn publish(chat: &dyn ChatApi, path: &Path, chat_id: &str, display_name: &str) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    debug!("Uploading {} to chat {} as {}", path.display(), chat_id, display_name);
    chat.upload_file(chat_id, file, display_name)
        .await
        .with_context(|| format!("Failed to upload {}", display_name))
}
