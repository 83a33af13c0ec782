//! # SafetyTap Writer
//!
//! A daily blog pipeline for a construction-safety site. It walks a fixed
//! bank of topics one day at a time, sends a brief for each day to an LLM,
//! and writes the returned body as a Markdown post with derived front matter.
//!
//! ## Features
//!
//! - Picks the lowest unpublished day from a persisted schedule
//! - Skips any day whose post file already exists, so reruns are harmless
//! - Attaches up to three fresh, relevant research items to the brief
//! - Carries a per-day editorial note from the author into the brief
//! - Refreshes the research feed from RSS/Atom sources on its own schedule
//! - Merges raw topic batches into the topic bank
//!
//! ## Usage
//!
//! ```sh
//! safetytap_writer init --start-date 2025-01-06
//! safetytap_writer generate
//! safetytap_writer status
//! ```
//!
//! ## Architecture
//!
//! The daily run is a straight pipeline:
//! 1. **Selection**: Lowest day not marked published in the schedule
//! 2. **Matching**: Fresh research items relevant to the day's topic
//! 3. **Generation**: One LLM call with the day's brief
//! 4. **Output**: Write the post, then mark the day published

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod assembler;
mod cli;
mod combiner;
mod error;
mod models;
mod outputs;
mod research;
mod schedule;
mod topics;
mod utils;

use api::{LlmOracle, RetryAsk};
use assembler::{GenerateRequest, Paths, generate_many};
use cli::{Cli, Command, PathArgs};
use error::PipelineError;
use research::ResearchOptions;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    info!(command = ?args.command, "safetytap_writer starting up");

    if let Err(e) = run(args).await {
        error!(error = %e, elapsed_ms = start_time.elapsed().as_millis(), "Run failed");
        return Err(e);
    }

    info!(elapsed_ms = start_time.elapsed().as_millis(), "Run finished");
    Ok(())
}

async fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let paths = args.paths;
    match args.command {
        Command::Generate { day, count, preview, force, retries, delay_secs, start_date } => {
            let request = GenerateRequest { day, preview, force, start_date };
            generate_command(&paths, request, count, retries, StdDuration::from_secs(delay_secs)).await
        }
        Command::Combine { batches } => {
            let report = combiner::combine_batches(&batches, &paths.topics).await?;
            println!(
                "Wrote {} topic(s) to {} from {} batch file(s)",
                report.topics,
                paths.topics.display(),
                report.loaded.len()
            );
            if report.has_warnings() {
                println!("Completed with warnings; see log output");
            }
            Ok(())
        }
        Command::Status => {
            let topics = topics::load_topic_bank(&paths.topics).await?;
            let today = Utc::now().date_naive();
            let schedule =
                schedule::load_or_initialize(&paths.schedule, &topics, &paths.content_dir, None, today, false)
                    .await?;
            print!("{}", schedule::status(&schedule, &topics, today));
            Ok(())
        }
        Command::Init { start_date, reset } => {
            let topics = topics::load_topic_bank(&paths.topics).await?;
            let schedule = schedule::initialize(
                &paths.schedule,
                &topics,
                &paths.content_dir,
                start_date,
                reset,
                Utc::now().date_naive(),
            )
            .await?;
            let backfilled = schedule.posts.values().filter(|p| p.is_published()).count();
            println!(
                "Schedule written to {} starting {} ({} of {} already published)",
                paths.schedule.display(),
                schedule.start_date,
                backfilled,
                topics.len()
            );
            Ok(())
        }
        Command::Note { day, text, clear } => {
            let topics = topics::load_topic_bank(&paths.topics).await?;
            let topic = topics::topic_for_day(&topics, day).ok_or(PipelineError::DayNotFound(day))?;
            let today = Utc::now().date_naive();
            let mut schedule =
                schedule::load_or_initialize(&paths.schedule, &topics, &paths.content_dir, None, today, false)
                    .await?;
            let note = if clear { None } else { text };
            let cleared = note.is_none();
            schedule::set_editorial_note(&mut schedule, topic, note);
            schedule::save_schedule(&paths.schedule, &schedule).await?;
            if cleared {
                println!("Cleared editorial note for day {day} ({})", topic.slug);
            } else {
                println!("Set editorial note for day {day} ({})", topic.slug);
            }
            Ok(())
        }
        Command::Research { dry_run } => {
            let options = ResearchOptions::default();
            let now = Utc::now();
            let feed = if dry_run {
                research::refresh_feed(None::<&LlmOracle>, &paths.sources, &paths.research, &options, now).await?
            } else {
                let oracle = LlmOracle::load(paths.llm_config.as_deref(), &paths.research_template).await?;
                research::refresh_feed(Some(&oracle), &paths.sources, &paths.research, &options, now).await?
            };
            println!(
                "Research feed: {} item(s), {} highly relevant, from {} source(s){}",
                feed.total_items,
                feed.high_relevance_count,
                feed.sources.len(),
                if feed.dry_run { " [dry run]" } else { "" }
            );
            Ok(())
        }
    }
}

async fn generate_command(
    args: &PathArgs,
    request: GenerateRequest,
    count: usize,
    retries: usize,
    delay: StdDuration,
) -> Result<(), Box<dyn Error>> {
    let paths = Paths {
        topics: args.topics.clone(),
        schedule: args.schedule.clone(),
        research: args.research.clone(),
        content_dir: args.content_dir.clone(),
    };

    let outcomes = if request.preview {
        generate_many(None::<&LlmOracle>, &paths, request, count, delay).await?
    } else {
        ensure_writable_dir(&paths.content_dir).await?;
        let oracle = LlmOracle::load(args.llm_config.as_deref(), &args.template).await?;
        let oracle = RetryAsk::new(oracle, retries, StdDuration::from_secs(1));
        generate_many(Some(&oracle), &paths, request, count, delay).await?
    };

    for outcome in &outcomes {
        println!("{outcome}");
    }
    Ok(())
}
