//! JSON state file writes.
//!
//! The topic bank, the schedule and the research feed are all JSON files that
//! other processes (the website build, the admin handlers) read at any time.
//! Every write goes through [`write_json_atomic`] so a reader sees either the
//! old file or the new one, never a partial write.

use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Serialize `value` as pretty JSON and replace `path` with it.
///
/// The data is written to a sibling temp file first and renamed over the
/// target. Missing parent directories are created.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    debug!(bytes = json.len(), "Wrote JSON file");
    Ok(())
}
