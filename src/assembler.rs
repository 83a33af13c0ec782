//! Post generation: from a scheduled day to a written post.
//!
//! One run of [`generate`]:
//!
//! 1. **Selection**: pick the lowest unpublished day, or the day asked for
//!    (on the very first run the schedule is created, backfilled from disk)
//! 2. **Idempotence**: if `{content_dir}/{slug}.md` exists, stop (unless forced)
//! 3. **Research**: match up to three fresh feed items to the topic
//! 4. **Brief**: topic fields, research, and the day's editorial note
//! 5. **Generation**: one oracle call, no retries
//! 6. **Output**: write the post, then mark the day published
//!
//! Steps 5 and 6 are skipped in preview mode. A skipped day leaves the
//! schedule file untouched.

use crate::api::AskAsync;
use crate::error::PipelineError;
use crate::models::{ResearchItem, TopicRecord};
use crate::outputs::markdown::{derive_front_matter, render_post};
use crate::research::{load_feed, match_research};
use crate::schedule::{
    DaySelection, date_for_day, load_or_initialize, mark_published, save_schedule, select_day,
};
use crate::topics::{load_topic_bank, topic_for_day};
use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Where the pipeline reads and writes.
#[derive(Debug, Clone)]
pub struct Paths {
    pub topics: PathBuf,
    pub schedule: PathBuf,
    pub research: PathBuf,
    pub content_dir: PathBuf,
}

impl Paths {
    pub fn post_path(&self, slug: &str) -> PathBuf {
        self.content_dir.join(format!("{slug}.md"))
    }
}

/// What to generate and how.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateRequest {
    /// Generate this day instead of the next pending one.
    pub day: Option<u32>,
    /// Select, match and build the brief, but call nothing and write nothing.
    pub preview: bool,
    /// Regenerate even if the post file exists.
    pub force: bool,
    /// Day 1's date when the schedule has to be created (defaults to today).
    pub start_date: Option<NaiveDate>,
}

/// Result of one generation attempt. None of these are errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Generated {
        day: u32,
        slug: String,
        path: PathBuf,
        research_items: usize,
    },
    /// The post file already exists.
    Skipped { day: u32, slug: String },
    Previewed { day: u32, slug: String, brief: String },
    /// Every day is published.
    Complete,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Generated { day, slug, path, research_items } => write!(
                f,
                "Generated day {day} ({slug}) -> {} [{research_items} research item(s)]",
                path.display()
            ),
            Outcome::Skipped { day, slug } => write!(f, "Skipped day {day} ({slug}): post already exists"),
            Outcome::Previewed { day, slug, brief } => {
                write!(f, "Preview for day {day} ({slug}):\n\n{brief}")
            }
            Outcome::Complete => write!(f, "All scheduled days are published"),
        }
    }
}

/// Build the per-call brief sent to the oracle.
///
/// Topic fields are embedded verbatim. Research is offered as optional
/// material; the editorial note, when present, is a hard requirement.
pub fn build_brief(topic: &TopicRecord, research: &[ResearchItem], editorial_note: Option<&str>) -> String {
    let mut lines = vec![
        "Write the blog post described by this brief.".to_string(),
        String::new(),
        format!("Title: {}", topic.title),
        format!("Target keyword: {}", topic.target_keyword),
        format!("Psychological concept: {}", topic.psychological_concept),
        format!("Construction framing: {}", topic.construction_framing),
        format!("SafetyTap connection: {}", topic.safety_tap_connection),
        format!("Tone: {}", topic.tone),
        format!("Pillar: {}", topic.pillar),
    ];
    lines.push(match topic.format_tag() {
        Some(format) => {
            let (lo, hi) = format.word_range();
            format!("Format: {} ({lo}-{hi} words)", topic.format)
        }
        None => format!("Format: {}", topic.format),
    });
    if !topic.target_length.is_empty() {
        lines.push(format!("Target length: {}", topic.target_length));
    }
    if !topic.research_references.is_empty() {
        lines.push("Research references:".to_string());
        lines.extend(topic.research_references.iter().map(|r| format!("- {r}")));
    }

    if !research.is_empty() {
        lines.push(String::new());
        lines.push(
            "Recent news that may be relevant. Weave it in only if it fits the post organically; \
             do not force it, and never invent details beyond what is given here:"
                .to_string(),
        );
        for (i, item) in research.iter().enumerate() {
            lines.push(format!("{}. {} ({}, {})", i + 1, item.title, item.source, item.published_date));
            lines.push(format!("   {}", item.url));
            if !item.summary.is_empty() {
                lines.push(format!("   {}", item.summary));
            }
            if !item.potential_angles.is_empty() {
                lines.push(format!("   Possible angles: {}", item.potential_angles.join("; ")));
            }
        }
    }

    if let Some(note) = editorial_note {
        lines.push(String::new());
        lines.push("Editorial note from the author. This is direct guidance and must be followed:".to_string());
        lines.push(note.to_string());
    }

    lines.push(String::new());
    lines.push("Return only the post body in Markdown: no front matter and no top-level heading.".to_string());
    lines.join("\n")
}

/// Generate one day's post.
///
/// `oracle` may be `None` only for previews.
#[instrument(level = "info", skip_all, fields(day = ?request.day, preview = request.preview, force = request.force))]
pub async fn generate<O>(
    oracle: Option<&O>,
    paths: &Paths,
    request: GenerateRequest,
    now: DateTime<Utc>,
) -> Result<Outcome, Box<dyn Error>>
where
    O: AskAsync<Response = String>,
{
    let topics = load_topic_bank(&paths.topics).await?;
    let mut schedule = load_or_initialize(
        &paths.schedule,
        &topics,
        &paths.content_dir,
        request.start_date,
        now.date_naive(),
        !request.preview,
    )
    .await?;

    let day = match select_day(&schedule, topics.len() as u32, request.day) {
        DaySelection::Day(day) => day,
        DaySelection::Complete => {
            info!(total = topics.len(), "Schedule complete; nothing to generate");
            return Ok(Outcome::Complete);
        }
    };
    let topic = topic_for_day(&topics, day).ok_or(PipelineError::DayNotFound(day))?;
    let post_path = paths.post_path(&topic.slug);

    if !request.force && fs::try_exists(&post_path).await? {
        if !schedule.posts.get(&day).is_some_and(|p| p.is_published()) {
            warn!(
                day,
                path = %post_path.display(),
                "Post exists but the day is not marked published; run `init --reset` to reconcile"
            );
        }
        info!(day, slug = %topic.slug, "Post already exists; skipping");
        return Ok(Outcome::Skipped { day, slug: topic.slug.clone() });
    }

    let feed = load_feed(&paths.research, now).await;
    let research = match_research(topic, feed.as_ref());
    let note = schedule
        .posts
        .get(&day)
        .and_then(|p| p.editorial_note.as_deref())
        .filter(|n| !n.trim().is_empty());
    let brief = build_brief(topic, &research, note);
    let had_note = note.is_some();
    info!(day, slug = %topic.slug, research_items = research.len(), had_note, "Built brief");

    if request.preview {
        return Ok(Outcome::Previewed { day, slug: topic.slug.clone(), brief });
    }

    let oracle = oracle.ok_or("an LLM oracle is required outside preview mode")?;
    let body = oracle.ask(&brief).await?;
    debug!(bytes = body.len(), "Received post body");

    let date = date_for_day(schedule.start_date, day);
    let front_matter = derive_front_matter(topic, date);
    let contents = render_post(&front_matter, &body)?;
    if !write_post(&post_path, &contents, request.force).await? {
        info!(day, path = %post_path.display(), "Post appeared during generation; leaving it");
        return Ok(Outcome::Skipped { day, slug: topic.slug.clone() });
    }
    info!(day, path = %post_path.display(), "Wrote post");

    mark_published(&mut schedule, topic, !research.is_empty(), had_note, now);
    save_schedule(&paths.schedule, &schedule).await?;

    Ok(Outcome::Generated {
        day,
        slug: topic.slug.clone(),
        path: post_path,
        research_items: research.len(),
    })
}

/// Write the post file. Returns `false` if it exists and `overwrite` is off.
async fn write_post(path: &Path, contents: &str, overwrite: bool) -> Result<bool, Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = match options.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    Ok(true)
}

/// Generate up to `count` pending days, one after another.
///
/// Calls are spaced by `delay` to stay under the API's rate limits. Stops
/// early when the schedule is complete or a day is skipped (the next run
/// would select the same day again).
#[instrument(level = "info", skip_all, fields(count = count))]
pub async fn generate_many<O>(
    oracle: Option<&O>,
    paths: &Paths,
    request: GenerateRequest,
    count: usize,
    delay: StdDuration,
) -> Result<Vec<Outcome>, Box<dyn Error>>
where
    O: AskAsync<Response = String>,
{
    let mut outcomes = Vec::new();
    for i in 0..count {
        if i > 0 && !request.preview {
            debug!(?delay, "Pacing before next generation");
            sleep(delay).await;
        }
        let outcome = generate(oracle, paths, request, Utc::now()).await?;
        let stop = !matches!(outcome, Outcome::Generated { .. });
        outcomes.push(outcome);
        if stop {
            break;
        }
    }
    Ok(outcomes)
}
