//! News source fetching for the research feed.
//!
//! Sources are RSS 2.0 or Atom feeds listed in a YAML registry. Each run:
//!
//! 1. **Fetching**: every enabled source is requested concurrently with a
//!    per-request timeout; a source that fails is logged and dropped
//! 2. **Parsing**: RSS `<item>` / Atom `<entry>` elements become [`RawItem`]s
//! 3. **Cleaning**: markup is stripped from titles and summaries
//! 4. **Deduplication**: by URL and by normalised title fingerprint
//!
//! # Registry format
//!
//! ```yaml
//! sources:
//!   - id: osha-news
//!     name: OSHA News Releases
//!     url: https://www.osha.gov/news/newsreleases.xml
//!   - id: enr-safety
//!     name: ENR Safety
//!     url: https://www.enr.com/rss/topics/safety
//!     enabled: false
//! ```

use crate::utils::{collapse_whitespace, title_fingerprint, truncate_with_ellipsis};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use scraper::Html;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::time::Duration as StdDuration;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Newest items kept per source.
const MAX_ITEMS_PER_SOURCE: usize = 20;
/// Summaries are cut to this many characters before analysis.
const MAX_SUMMARY_CHARS: usize = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// A cleaned news item before analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
}

/// Load the enabled sources from a YAML registry.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_sources(path: &Path) -> Result<Vec<SourceConfig>, Box<dyn Error>> {
    let raw = fs::read_to_string(path).await?;
    let registry: SourceRegistry = serde_yaml::from_str(&raw)?;
    let enabled: Vec<SourceConfig> = registry.sources.into_iter().filter(|s| s.enabled).collect();
    info!(count = enabled.len(), "Loaded research sources");
    Ok(enabled)
}

/// Fetch every source concurrently.
///
/// Returns the deduplicated items published within `max_age` of `now`
/// (undated items are kept) and the ids of the sources that succeeded.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn fetch_all(
    sources: &[SourceConfig],
    timeout: StdDuration,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<(Vec<RawItem>, Vec<String>), Box<dyn Error>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let results = join_all(sources.iter().map(|source| {
        let client = &client;
        async move { (source, fetch_source(client, source).await) }
    }))
    .await;

    let mut items = Vec::new();
    let mut succeeded = Vec::new();
    for (source, result) in results {
        match result {
            Ok(found) => {
                info!(source = %source.id, count = found.len(), "Fetched source");
                succeeded.push(source.id.clone());
                items.extend(found);
            }
            Err(e) => {
                error!(source = %source.id, url = %source.url, error = %e, "Source fetch failed; dropping");
            }
        }
    }

    let cutoff = now - max_age;
    items.retain(|item| item.published.is_none_or(|p| p >= cutoff));
    let items = dedupe(items);
    info!(count = items.len(), succeeded = succeeded.len(), "Collected research items");
    Ok((items, succeeded))
}

#[instrument(level = "info", skip_all, fields(source = %source.id))]
async fn fetch_source(client: &reqwest::Client, source: &SourceConfig) -> Result<Vec<RawItem>, Box<dyn Error>> {
    let body = client
        .get(&source.url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!(bytes = body.len(), "Downloaded feed");

    let base = Url::parse(&source.url)?;
    let mut items = parse_feed(&source.id, &base, &body)?;
    items.sort_by(|a, b| b.published.cmp(&a.published));
    items.truncate(MAX_ITEMS_PER_SOURCE);
    Ok(items)
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

/// Parse an RSS 2.0 or Atom document into cleaned items.
///
/// Items without a title or link are skipped; relative links are resolved
/// against `base`.
pub fn parse_feed(source_id: &str, base: &Url, xml: &str) -> Result<Vec<RawItem>, Box<dyn Error>> {
    let is_atom = xml.contains("<feed") && !xml.contains("<rss");
    let mut items = Vec::new();

    if is_atom {
        let feed: AtomFeed = quick_xml::de::from_str(xml)?;
        for entry in feed.entries {
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
                .map(|l| l.href.clone());
            let summary = entry.summary.or(entry.content).map(|t| t.value);
            let date = entry.published.or(entry.updated);
            if let Some(item) = build_item(source_id, base, entry.title.map(|t| t.value), link, summary, date) {
                items.push(item);
            }
        }
    } else {
        let rss: Rss = quick_xml::de::from_str(xml)?;
        for item in rss.channel.items {
            if let Some(item) = build_item(source_id, base, item.title, item.link, item.description, item.pub_date) {
                items.push(item);
            }
        }
    }

    debug!(source = source_id, count = items.len(), atom = is_atom, "Parsed feed");
    Ok(items)
}

fn build_item(
    source_id: &str,
    base: &Url,
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
    date: Option<String>,
) -> Option<RawItem> {
    let title = clean_markup(&title?);
    let link = link?;
    let url = match base.join(link.trim()) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!(source = source_id, %link, error = %e, "Unresolvable item link; skipping");
            return None;
        }
    };
    if title.is_empty() {
        return None;
    }
    let summary = summary.map(|s| clean_markup(&s)).unwrap_or_default();
    Some(RawItem {
        source: source_id.to_string(),
        title,
        url,
        published: date.as_deref().and_then(parse_date),
        summary: truncate_with_ellipsis(&summary, MAX_SUMMARY_CHARS),
    })
}

/// Accept RFC 2822 (RSS) and RFC 3339 (Atom) timestamps.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Strip HTML tags and collapse whitespace.
pub fn clean_markup(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Drop items whose URL or title fingerprint was already seen. First one wins.
pub fn dedupe(items: Vec<RawItem>) -> Vec<RawItem> {
    let mut urls = HashSet::new();
    let mut fingerprints = HashSet::new();
    let before = items.len();
    let kept: Vec<RawItem> = items
        .into_iter()
        .filter(|item| {
            let fingerprint = title_fingerprint(&item.title);
            if urls.contains(&item.url) || (!fingerprint.is_empty() && fingerprints.contains(&fingerprint)) {
                return false;
            }
            urls.insert(item.url.clone());
            fingerprints.insert(fingerprint);
            true
        })
        .collect();
    debug!(before, after = kept.len(), "Deduplicated items");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Safety News</title>
    <link>https://news.example.com/</link>
    <item>
      <title>Falls remain the &lt;b&gt;top&lt;/b&gt; killer</title>
      <link>/2025/falls</link>
      <description><![CDATA[<p>New <em>data</em> on fall   protection.</p>]]></description>
      <pubDate>Tue, 04 Mar 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title></title>
      <link>https://news.example.com/empty</link>
    </item>
    <item>
      <title>No date here</title>
      <link>https://news.example.com/undated</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Site Blog</title>
  <entry>
    <title type="html">Heat stress on crews</title>
    <link rel="alternate" href="https://blog.example.com/heat"/>
    <id>urn:1</id>
    <updated>2025-03-03T08:00:00Z</updated>
    <summary>Hydration &amp; shade.</summary>
  </entry>
</feed>"#;

    fn base() -> Url {
        Url::parse("https://news.example.com/rss.xml").unwrap()
    }

    fn raw(url: &str, title: &str) -> RawItem {
        RawItem {
            source: "s".to_string(),
            title: title.to_string(),
            url: url.to_string(),
            published: None,
            summary: String::new(),
        }
    }

    #[test]
    fn test_parse_rss() {
        let items = parse_feed("news", &base(), RSS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Falls remain the top killer");
        assert_eq!(items[0].url, "https://news.example.com/2025/falls");
        assert_eq!(items[0].summary, "New data on fall protection.");
        assert_eq!(items[0].published, parse_date("2025-03-04T10:00:00Z"));
        assert_eq!(items[1].published, None);
    }

    #[test]
    fn test_parse_atom() {
        let items = parse_feed("blog", &base(), ATOM).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Heat stress on crews");
        assert_eq!(items[0].url, "https://blog.example.com/heat");
        assert_eq!(items[0].summary, "Hydration & shade.");
        assert!(items[0].published.is_some());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_feed("x", &base(), "<rss><channel><item>").is_err());
    }

    #[test]
    fn test_dedupe_by_url_and_fingerprint() {
        let items = vec![
            raw("https://a.com/1", "OSHA issues heat rule"),
            raw("https://a.com/1", "Different title same url"),
            raw("https://b.com/x", "OSHA Issues Heat Rule!"),
            raw("https://c.com/y", "Something else"),
        ];
        let kept = dedupe(items);
        assert_eq!(
            kept.iter().map(|i| i.url.as_str()).collect::<Vec<_>>(),
            vec!["https://a.com/1", "https://c.com/y"]
        );
    }

    #[test]
    fn test_clean_markup() {
        assert_eq!(clean_markup("<p>Hello <b>crew</b></p>\n<p>stay safe</p>"), "Hello crew stay safe");
        assert_eq!(clean_markup("plain text"), "plain text");
    }

    #[test]
    fn test_registry_yaml_defaults_enabled() {
        let yaml = r#"
sources:
  - id: a
    name: A
    url: https://a.example.com/rss
  - id: b
    name: B
    url: https://b.example.com/rss
    enabled: false
"#;
        let registry: SourceRegistry = serde_yaml::from_str(yaml).unwrap();
        assert!(registry.sources[0].enabled);
        assert!(!registry.sources[1].enabled);
    }
}
