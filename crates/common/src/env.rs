//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before any request is served.

use std::path::Path;

use tracing::{info, warn};

/// Make sure the directory holding a data file exists.
pub async fn ensure_data_dir(file: &Path) -> anyhow::Result<()> {
    let Some(dir) = file.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    warn!(dir = %dir.display(), "data directory not found; creating it");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    info!(dir = %dir.display(), "data directory created");
    Ok(())
}
