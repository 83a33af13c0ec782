//! Fatal configuration errors.
//!
//! These abort a run with a non-zero exit. Conditions that are expected in
//! normal operation (a stale research feed, a post that already exists, a
//! finished schedule) are not errors and are reported through
//! [`crate::assembler::Outcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("topic bank not found at {0}")]
    TopicBankMissing(PathBuf),

    #[error("topic bank at {0} is empty")]
    TopicBankEmpty(PathBuf),

    #[error("no topic for day {0}")]
    DayNotFound(u32),

    #[error("schedule not initialised at {0}; run `init` first")]
    ScheduleMissing(PathBuf),

    #[error("schedule already exists at {0}; pass --reset to rebuild it")]
    ScheduleExists(PathBuf),

    #[error("none of the {0} topic batch file(s) could be loaded; topic bank left unchanged")]
    NoTopicBatches(usize),
}
