//! The research feed: producing it and consuming it.
//!
//! # Submodules
//!
//! - [`sources`]: Fetch, parse, clean and deduplicate RSS/Atom sources
//! - [`analyze`]: Score items against the content pillars
//! - [`feed`]: Load the feed with its freshness window and match items to a topic
//!
//! The producer ([`refresh_feed`]) runs on its own schedule, independent of
//! post generation. The generator only ever reads the file it leaves behind.

pub mod analyze;
pub mod feed;
pub mod sources;

use crate::api::AskAsync;
use crate::models::ResearchFeed;
use chrono::{DateTime, Duration, Utc};
use std::error::Error;
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::{info, instrument};

pub use feed::{load_feed, match_research};

/// Settings for one research refresh.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub fetch_timeout: StdDuration,
    /// Items older than this are dropped before analysis.
    pub max_age: Duration,
    pub max_retries: usize,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: StdDuration::from_secs(15),
            max_age: Duration::days(7),
            max_retries: 2,
        }
    }
}

/// Fetch all sources, score the items and write the feed to `out_path`.
///
/// With no oracle the run is a dry run: items are scored heuristically and
/// the feed is marked `dryRun`.
#[instrument(level = "info", skip_all, fields(sources_path = %sources_path.display(), dry_run = oracle.is_none()))]
pub async fn refresh_feed<O>(
    oracle: Option<&O>,
    sources_path: &Path,
    out_path: &Path,
    options: &ResearchOptions,
    now: DateTime<Utc>,
) -> Result<ResearchFeed, Box<dyn Error>>
where
    O: AskAsync<Response = String>,
{
    let sources = sources::load_sources(sources_path).await?;
    let (raw, succeeded) =
        sources::fetch_all(&sources, options.fetch_timeout, options.max_age, now).await?;

    let mut items = match oracle {
        Some(oracle) => analyze::analyze_items(oracle, raw, options.max_retries).await,
        None => raw.iter().map(analyze::heuristic_item).collect(),
    };
    analyze::sort_items(&mut items);

    let feed = ResearchFeed {
        generated_at: now,
        dry_run: oracle.is_none(),
        sources: succeeded,
        total_items: items.len(),
        high_relevance_count: analyze::high_relevance_count(&items),
        items,
    };
    feed::write_feed(out_path, &feed).await?;
    info!(
        total = feed.total_items,
        high_relevance = feed.high_relevance_count,
        "Research feed refreshed"
    );
    Ok(feed)
}
