use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

/// Replaces the operator-facing copy of the latest raster. The temp file + rename
/// keeps readers from ever seeing a half-written image.
pub async fn persist_latest_image(path: &Path, encoded: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, encoded)
        .await
        .with_context(|| format!("Failed writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).await.with_context(|| {
        format!(
            "Failed renaming {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}
