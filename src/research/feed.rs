//! Reading the research feed and matching its items to a topic.
//!
//! The feed is a cache: anything wrong with it (missing, unparsable, older
//! than the freshness window) means "no research this run", never an error.

use crate::models::{ResearchFeed, ResearchItem, TopicRecord};
use crate::outputs::json::write_json_atomic;
use chrono::{DateTime, Duration, Utc};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Feeds generated longer ago than this are ignored.
pub const FRESHNESS_WINDOW_HOURS: i64 = 48;
/// Items scoring below this are never offered to the writer.
pub const MIN_RELEVANCE: f64 = 0.5;
/// At most this many items are attached to a brief.
pub const MAX_MATCHES: usize = 3;

pub fn is_fresh(feed: &ResearchFeed, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(feed.generated_at) <= Duration::hours(FRESHNESS_WINDOW_HOURS)
}

/// Load the feed at `path` if it exists, parses, and is fresh as of `now`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_feed(path: &Path, now: DateTime<Utc>) -> Option<ResearchFeed> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            info!(error = %e, "No research feed available");
            return None;
        }
    };
    let feed: ResearchFeed = match serde_json::from_str(&raw) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(error = %e, "Research feed is malformed; ignoring");
            return None;
        }
    };
    if !is_fresh(&feed, now) {
        let age_hours = now.signed_duration_since(feed.generated_at).num_hours();
        info!(age_hours, "Research feed is stale; ignoring");
        return None;
    }
    debug!(items = feed.items.len(), "Loaded research feed");
    Some(feed)
}

/// Up to three feed items relevant to `topic`, in feed order.
///
/// The feed producer sorts by score then date, so this only filters and
/// truncates.
pub fn match_research(topic: &TopicRecord, feed: Option<&ResearchFeed>) -> Vec<ResearchItem> {
    let Some(feed) = feed else {
        return Vec::new();
    };
    feed.items
        .iter()
        .filter(|item| item.relevance_score >= MIN_RELEVANCE)
        .filter(|item| is_relevant(topic, item))
        .take(MAX_MATCHES)
        .cloned()
        .collect()
}

/// An item is relevant if it is tagged with the topic's pillar (or a pillar
/// sharing its first segment) or mentions a word of the target keyword.
fn is_relevant(topic: &TopicRecord, item: &ResearchItem) -> bool {
    let pillar = topic.pillar.to_lowercase();
    let prefix = pillar.split('-').next().unwrap_or_default();
    let pillar_hit = item.relevance_pillars.iter().any(|tag| {
        let tag = tag.to_lowercase();
        tag == pillar || (!prefix.is_empty() && tag.contains(prefix))
    });
    if pillar_hit {
        return true;
    }

    let title = item.title.to_lowercase();
    let summary = item.summary.to_lowercase();
    topic
        .target_keyword
        .to_lowercase()
        .split_whitespace()
        .any(|token| title.contains(token) || summary.contains(token))
}

#[instrument(level = "info", skip_all, fields(path = %path.display(), items = feed.items.len()))]
pub async fn write_feed(path: &Path, feed: &ResearchFeed) -> Result<(), Box<dyn Error>> {
    write_json_atomic(path, feed).await?;
    info!("Wrote research feed");
    Ok(())
}
