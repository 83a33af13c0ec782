//! Publication schedule bookkeeping.
//!
//! The schedule is a single JSON file mapping day numbers to [`PostStatus`]
//! entries. Every generation run does one read-modify-write of the whole file;
//! there is no locking, so invocations must not overlap (the daily job and a
//! manual run are serialised by the operator).
//!
//! # Dates
//!
//! Day `d` is published on `startDate + (d - 1)` days. The arithmetic is done
//! on [`NaiveDate`] values, so the host time zone never enters into it.

use crate::error::PipelineError;
use crate::models::{GeneratedAt, PostState, PostStatus, ScheduleRecord, TopicRecord};
use crate::outputs::json::write_json_atomic;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// How many upcoming dates the status report lists.
const UPCOMING_LIMIT: usize = 7;

/// Result of choosing which day to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelection {
    Day(u32),
    /// Every day in `[1, N]` is published.
    Complete,
}

/// Calendar date of `day` for a schedule starting on `start`.
pub fn date_for_day(start: NaiveDate, day: u32) -> NaiveDate {
    start + Days::new(u64::from(day.saturating_sub(1)))
}

/// Pick the day to generate.
///
/// An explicit day is returned as-is; otherwise the smallest day in
/// `[1, total]` whose entry is missing or not published.
pub fn select_day(schedule: &ScheduleRecord, total: u32, explicit: Option<u32>) -> DaySelection {
    if let Some(day) = explicit {
        return DaySelection::Day(day);
    }
    (1..=total)
        .find(|day| !is_published(schedule, *day))
        .map(DaySelection::Day)
        .unwrap_or(DaySelection::Complete)
}

fn is_published(schedule: &ScheduleRecord, day: u32) -> bool {
    schedule.posts.get(&day).is_some_and(PostStatus::is_published)
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_schedule(path: &Path) -> Result<ScheduleRecord, Box<dyn Error>> {
    if !fs::try_exists(path).await? {
        return Err(PipelineError::ScheduleMissing(path.to_path_buf()).into());
    }
    let raw = fs::read_to_string(path).await?;
    let schedule: ScheduleRecord = serde_json::from_str(&raw)?;
    debug!(start_date = %schedule.start_date, posts = schedule.posts.len(), "Loaded schedule");
    Ok(schedule)
}

pub async fn save_schedule(path: &Path, schedule: &ScheduleRecord) -> Result<(), Box<dyn Error>> {
    write_json_atomic(path, schedule).await?;
    info!(path = %path.display(), "Saved schedule");
    Ok(())
}

/// Record a successful generation for `topic`.
///
/// Fields owned by other tools (hero image, editorial note, unknown keys) are
/// left as they were.
pub fn mark_published(
    schedule: &mut ScheduleRecord,
    topic: &TopicRecord,
    had_research_integration: bool,
    had_editorial_note: bool,
    now: DateTime<Utc>,
) {
    let date = date_for_day(schedule.start_date, topic.day);
    let entry = schedule
        .posts
        .entry(topic.day)
        .or_insert_with(|| PostStatus::pending(topic, date));

    entry.slug = topic.slug.clone();
    entry.title = topic.title.clone();
    entry.date = date;
    entry.pillar = topic.pillar.clone();
    entry.format = topic.format.clone();
    entry.status = PostState::Published;
    entry.generated_at = Some(GeneratedAt::At(now));
    entry.had_research_integration = had_research_integration;
    entry.had_editorial_note = had_editorial_note;
}

/// Attach (or with `None`, clear) the editorial note for `topic`'s day.
pub fn set_editorial_note(schedule: &mut ScheduleRecord, topic: &TopicRecord, note: Option<String>) {
    let date = date_for_day(schedule.start_date, topic.day);
    let entry = schedule
        .posts
        .entry(topic.day)
        .or_insert_with(|| PostStatus::pending(topic, date));
    entry.editorial_note = note.filter(|n| !n.trim().is_empty());
}

/// Slugs of the `.md` files already present in `content_dir`.
#[instrument(level = "info", skip_all, fields(content_dir = %content_dir.display()))]
pub async fn existing_slugs(content_dir: &Path) -> Result<HashSet<String>, Box<dyn Error>> {
    let mut slugs = HashSet::new();
    if !fs::try_exists(content_dir).await? {
        return Ok(slugs);
    }
    let mut entries = fs::read_dir(content_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            slugs.insert(stem.to_string());
        }
    }
    debug!(count = slugs.len(), "Found existing content files");
    Ok(slugs)
}

/// Build a schedule with one entry per topic.
///
/// When rebuilding over a `previous` schedule, a day that keeps its slug
/// starts from its old entry: a published day stays published with its
/// generation history, and notes, hero images and unknown keys survive.
/// Only the topic-derived fields and the date are refreshed. Days not yet
/// published whose slug is in `existing` are backfilled as published with
/// the `pre-existing` marker.
pub fn build_schedule(
    topics: &[TopicRecord],
    start_date: NaiveDate,
    existing: &HashSet<String>,
    previous: Option<&ScheduleRecord>,
) -> ScheduleRecord {
    let mut posts = BTreeMap::new();
    for topic in topics {
        let date = date_for_day(start_date, topic.day);
        let mut post = match previous
            .and_then(|p| p.posts.get(&topic.day))
            .filter(|old| old.slug == topic.slug)
        {
            Some(old) => {
                let mut post = old.clone();
                post.title = topic.title.clone();
                post.date = date;
                post.pillar = topic.pillar.clone();
                post.format = topic.format.clone();
                post
            }
            None => PostStatus::pending(topic, date),
        };
        if !post.is_published() && existing.contains(&topic.slug) {
            post.status = PostState::Published;
            post.generated_at = Some(GeneratedAt::pre_existing());
        }
        posts.insert(topic.day, post);
    }
    ScheduleRecord { start_date, posts }
}

/// Create the schedule file, reconciling it with content already on disk.
///
/// Without `reset`, an existing schedule is an error. With `reset`, it is
/// rebuilt and keeps its start date unless `start_date` overrides it.
#[instrument(level = "info", skip_all, fields(path = %path.display(), reset = reset))]
pub async fn initialize(
    path: &Path,
    topics: &[TopicRecord],
    content_dir: &Path,
    start_date: Option<NaiveDate>,
    reset: bool,
    today: NaiveDate,
) -> Result<ScheduleRecord, Box<dyn Error>> {
    let previous = if fs::try_exists(path).await? {
        if !reset {
            return Err(PipelineError::ScheduleExists(path.to_path_buf()).into());
        }
        Some(load_schedule(path).await?)
    } else {
        None
    };

    let start = start_date
        .or(previous.as_ref().map(|p| p.start_date))
        .unwrap_or(today);
    let existing = existing_slugs(content_dir).await?;
    let schedule = build_schedule(topics, start, &existing, previous.as_ref());

    let backfilled = schedule.posts.values().filter(|p| p.is_published()).count();
    info!(%start, topics = topics.len(), backfilled, "Initialised schedule");
    save_schedule(path, &schedule).await?;
    Ok(schedule)
}

/// Load the schedule, or build it on first use.
///
/// A missing schedule is created the way `init` would create it: starting on
/// `start_date` (or `today`) with content already on disk backfilled. With
/// `persist` off the new schedule is only returned, not written.
#[instrument(level = "info", skip_all, fields(path = %path.display(), persist = persist))]
pub async fn load_or_initialize(
    path: &Path,
    topics: &[TopicRecord],
    content_dir: &Path,
    start_date: Option<NaiveDate>,
    today: NaiveDate,
    persist: bool,
) -> Result<ScheduleRecord, Box<dyn Error>> {
    if fs::try_exists(path).await? {
        return load_schedule(path).await;
    }
    info!("No schedule yet; creating one from the topic bank");
    if persist {
        return initialize(path, topics, content_dir, start_date, false, today).await;
    }
    let existing = existing_slugs(content_dir).await?;
    Ok(build_schedule(topics, start_date.unwrap_or(today), &existing, None))
}

/// Snapshot of schedule progress.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub published: usize,
    pub total: usize,
    pub last_published: Option<u32>,
    pub next_pending: Option<(u32, NaiveDate)>,
    /// Up to seven pending days dated today or later.
    pub upcoming: Vec<(u32, NaiveDate)>,
    pub by_pillar: BTreeMap<String, usize>,
}

pub fn status(schedule: &ScheduleRecord, topics: &[TopicRecord], today: NaiveDate) -> StatusReport {
    let total = topics.len();
    let published_posts: Vec<(u32, &PostStatus)> = schedule
        .posts
        .iter()
        .filter(|(_, p)| p.is_published())
        .map(|(d, p)| (*d, p))
        .collect();

    let mut by_pillar = BTreeMap::new();
    for (_, post) in &published_posts {
        *by_pillar.entry(post.pillar.clone()).or_insert(0) += 1;
    }

    let pending_days = || {
        (1..=total as u32)
            .filter(|d| !is_published(schedule, *d))
            .map(|d| (d, date_for_day(schedule.start_date, d)))
    };

    StatusReport {
        published: published_posts.len(),
        total,
        last_published: published_posts.iter().map(|(d, _)| *d).max(),
        next_pending: pending_days().next(),
        upcoming: pending_days()
            .filter(|(_, date)| *date >= today)
            .take(UPCOMING_LIMIT)
            .collect(),
        by_pillar,
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Published: {}/{}", self.published, self.total)?;
        match self.last_published {
            Some(day) => writeln!(f, "Last published: day {day}")?,
            None => writeln!(f, "Last published: none")?,
        }
        match self.next_pending {
            Some((day, date)) => writeln!(f, "Next pending: day {day} ({date})")?,
            None => writeln!(f, "Next pending: none, schedule complete")?,
        }
        writeln!(f, "Upcoming:")?;
        for (day, date) in &self.upcoming {
            writeln!(f, "  {date}  day {day}")?;
        }
        writeln!(f, "Published by pillar:")?;
        for (pillar, count) in &self.by_pillar {
            writeln!(f, "  {pillar}: {count}")?;
        }
        Ok(())
    }
}
