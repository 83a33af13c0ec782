//! Command-line interface definitions for SafetyTap Writer.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every path can be provided via command-line flags or environment variables.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the SafetyTap Writer application.
///
/// # Examples
///
/// ```sh
/// # Generate the next pending day
/// safetytap_writer generate
///
/// # Show the brief for day 12 without calling the model
/// safetytap_writer generate --day 12 --preview
///
/// # Rebuild the topic bank from the raw batches
/// safetytap_writer combine --batch data/batch-1.json --batch data/batch-2.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub paths: PathArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// File locations shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Topic bank (JSON array of topics)
    #[arg(long, global = true, env = "SAFETYTAP_TOPICS", default_value = "data/topics.json")]
    pub topics: PathBuf,

    /// Schedule store
    #[arg(long, global = true, env = "SAFETYTAP_SCHEDULE", default_value = "data/schedule.json")]
    pub schedule: PathBuf,

    /// Research feed
    #[arg(long, global = true, env = "SAFETYTAP_RESEARCH", default_value = "data/research.json")]
    pub research: PathBuf,

    /// Directory holding one `{slug}.md` per published post
    #[arg(long, global = true, env = "SAFETYTAP_CONTENT_DIR", default_value = "content/blog")]
    pub content_dir: PathBuf,

    /// Research source registry (YAML)
    #[arg(long, global = true, env = "SAFETYTAP_SOURCES", default_value = "data/research_sources.yaml")]
    pub sources: PathBuf,

    /// Optional path to the awful_aj config.yaml
    #[arg(long, global = true, env = "SAFETYTAP_LLM_CONFIG")]
    pub llm_config: Option<PathBuf>,

    /// Chat template holding the post style guide
    #[arg(long, global = true, env = "SAFETYTAP_TEMPLATE", default_value = "safetytap_writer")]
    pub template: String,

    /// Chat template used to score research items
    #[arg(
        long,
        global = true,
        env = "SAFETYTAP_RESEARCH_TEMPLATE",
        default_value = "safetytap_research"
    )]
    pub research_template: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the next pending post, or a specific day
    Generate {
        /// Day to generate instead of the next pending one
        #[arg(long)]
        day: Option<u32>,

        /// Generate up to this many pending days in one run
        #[arg(long, default_value_t = 1, conflicts_with = "day")]
        count: usize,

        /// Print the brief without calling the model or writing anything
        #[arg(long)]
        preview: bool,

        /// Regenerate even if the post file already exists
        #[arg(long)]
        force: bool,

        /// Retries for the model call (0 means a failed run is re-invoked by hand)
        #[arg(long, default_value_t = 0)]
        retries: usize,

        /// Seconds to wait between generations when --count > 1
        #[arg(long, default_value_t = 5)]
        delay_secs: u64,

        /// Date of day 1 if no schedule exists yet (defaults to today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },

    /// Merge topic batches into the topic bank, overwriting it
    Combine {
        /// Batch files, read in order
        #[arg(
            long = "batch",
            env = "SAFETYTAP_BATCHES",
            value_delimiter = ',',
            default_values = ["data/topics-batch-1.json", "data/topics-batch-2.json", "data/topics-batch-3.json"]
        )]
        batches: Vec<PathBuf>,
    },

    /// Show schedule progress
    Status,

    /// Create the schedule, backfilling posts already on disk
    Init {
        /// Date of day 1 (defaults to today, or the existing start date with --reset)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Rebuild an existing schedule
        #[arg(long)]
        reset: bool,
    },

    /// Attach or clear the editorial note for a day
    Note {
        day: u32,

        /// Note text; required unless --clear is given
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        text: Option<String>,

        #[arg(long)]
        clear: bool,
    },

    /// Fetch research sources and rewrite the research feed
    Research {
        /// Score items with keyword heuristics instead of the model
        #[arg(long)]
        dry_run: bool,
    },
}
