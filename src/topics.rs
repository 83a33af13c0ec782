//! Topic bank loading and lookup.
//!
//! The bank is a JSON array of [`TopicRecord`] sorted by day, produced by the
//! `combine` command and read-only everywhere else.

use crate::error::PipelineError;
use crate::models::TopicRecord;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Load the topic bank from `path`.
///
/// A missing or empty bank is a [`PipelineError`]; there is nothing sensible
/// to schedule without one.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_topic_bank(path: &Path) -> Result<Vec<TopicRecord>, Box<dyn Error>> {
    if !fs::try_exists(path).await? {
        return Err(PipelineError::TopicBankMissing(path.to_path_buf()).into());
    }
    let raw = fs::read_to_string(path).await?;
    let topics: Vec<TopicRecord> = serde_json::from_str(&raw)?;
    if topics.is_empty() {
        return Err(PipelineError::TopicBankEmpty(path.to_path_buf()).into());
    }
    info!(count = topics.len(), "Loaded topic bank");
    Ok(topics)
}

pub fn topic_for_day(topics: &[TopicRecord], day: u32) -> Option<&TopicRecord> {
    topics.iter().find(|t| t.day == day)
}
