//! JSON run report.
//!
//! The report is the serialized [`RunSummary`] of one run. Parent directories
//! are created as needed; an existing file at the path is replaced.

use std::error::Error;
use std::path::Path;

use tokio::fs;
use tracing::{error, info, instrument};

use crate::ingest::RunSummary;

/// Write a [`RunSummary`] as pretty-printed JSON to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create summary dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote run summary");
    Ok(())
}
