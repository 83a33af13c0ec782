//! Merging raw topic batches into the topic bank.
//!
//! This is an offline maintenance step. Every problem short of failing to
//! write the bank is a warning: a missing batch, a batch that is not a JSON
//! array of topics, duplicate days or slugs, gaps, unrecognised tags. The one
//! exception: if no batch loads at all, the existing bank is left alone.

use crate::error::PipelineError;
use crate::models::TopicRecord;
use crate::outputs::json::write_json_atomic;
use itertools::Itertools;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// What [`combine_batches`] found along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineReport {
    pub topics: usize,
    pub loaded: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub rejected: Vec<PathBuf>,
    pub duplicate_days: Vec<u32>,
    pub duplicate_slugs: Vec<String>,
    pub missing_days: Vec<u32>,
    pub unknown_tags: Vec<(u32, String)>,
}

impl CombineReport {
    pub fn has_warnings(&self) -> bool {
        !(self.missing.is_empty()
            && self.rejected.is_empty()
            && self.duplicate_days.is_empty()
            && self.duplicate_slugs.is_empty()
            && self.missing_days.is_empty()
            && self.unknown_tags.is_empty())
    }
}

/// Read each batch in order, merge, sort by day and overwrite `out_path`.
#[instrument(level = "info", skip_all, fields(batches = batch_paths.len(), out = %out_path.display()))]
pub async fn combine_batches(batch_paths: &[PathBuf], out_path: &Path) -> Result<CombineReport, Box<dyn Error>> {
    let mut report = CombineReport::default();
    let mut topics: Vec<TopicRecord> = Vec::new();

    for path in batch_paths {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Batch file missing; continuing without it");
                report.missing.push(path.clone());
                continue;
            }
        };
        match serde_json::from_str::<Vec<TopicRecord>>(&raw) {
            Ok(batch) => {
                info!(path = %path.display(), count = batch.len(), "Loaded batch");
                topics.extend(batch);
                report.loaded.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Batch is not a list of topics; skipping");
                report.rejected.push(path.clone());
            }
        }
    }

    if report.loaded.is_empty() {
        return Err(PipelineError::NoTopicBatches(batch_paths.len()).into());
    }

    topics.sort_by_key(|t| t.day);
    check(&topics, &mut report);

    write_json_atomic(out_path, &topics).await?;
    report.topics = topics.len();
    info!(topics = report.topics, clean = !report.has_warnings(), "Wrote topic bank");
    Ok(report)
}

/// Fill in the validation part of `report` for sorted `topics`.
fn check(topics: &[TopicRecord], report: &mut CombineReport) {
    report.duplicate_days = topics
        .iter()
        .map(|t| t.day)
        .duplicates()
        .collect();
    for day in &report.duplicate_days {
        warn!(day, "Duplicate day in topic bank");
    }

    report.duplicate_slugs = topics
        .iter()
        .map(|t| t.slug.clone())
        .duplicates()
        .sorted()
        .collect();
    for slug in &report.duplicate_slugs {
        warn!(%slug, "Duplicate slug in topic bank");
    }

    if let Some(last) = topics.last() {
        report.missing_days = (1..=last.day)
            .filter(|d| topics.binary_search_by_key(d, |t| t.day).is_err())
            .collect();
        if !report.missing_days.is_empty() {
            warn!(missing = ?report.missing_days, "Gaps in the day sequence");
        }
    }

    for topic in topics {
        if topic.pillar_tag().is_none() {
            warn!(day = topic.day, pillar = %topic.pillar, "Unrecognised pillar");
            report.unknown_tags.push((topic.day, topic.pillar.clone()));
        }
        if topic.format_tag().is_none() {
            warn!(day = topic.day, format = %topic.format, "Unrecognised format");
            report.unknown_tags.push((topic.day, topic.format.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_topic;

    async fn write_batch(dir: &Path, name: &str, days: &[u32]) -> PathBuf {
        let path = dir.join(name);
        let topics: Vec<TopicRecord> = days.iter().copied().map(sample_topic).collect();
        write_json_atomic(&path, &topics).await.unwrap();
        path
    }

    async fn read_bank(path: &Path) -> Vec<TopicRecord> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_merges_and_sorts_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let batches = vec![
            write_batch(dir.path(), "b1.json", &[5, 1, 3]).await,
            write_batch(dir.path(), "b2.json", &[2, 6]).await,
            write_batch(dir.path(), "b3.json", &[4]).await,
        ];
        let out = dir.path().join("topics.json");

        let report = combine_batches(&batches, &out).await.unwrap();
        assert_eq!(report.topics, 6);
        assert!(!report.has_warnings());

        let bank = read_bank(&out).await;
        assert_eq!(bank.iter().map(|t| t.day).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_missing_batch_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let batches = vec![
            write_batch(dir.path(), "b1.json", &[1, 2]).await,
            dir.path().join("absent.json"),
            write_batch(dir.path(), "b3.json", &[3]).await,
        ];
        let out = dir.path().join("topics.json");

        let report = combine_batches(&batches, &out).await.unwrap();
        assert_eq!(report.topics, 3);
        assert_eq!(report.missing, vec![dir.path().join("absent.json")]);
        assert_eq!(read_bank(&out).await.len(), 3);
    }

    #[tokio::test]
    async fn test_non_array_batch_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"day": 1}"#).unwrap();
        let batches = vec![bad.clone(), write_batch(dir.path(), "b2.json", &[1]).await];
        let out = dir.path().join("topics.json");

        let report = combine_batches(&batches, &out).await.unwrap();
        assert_eq!(report.rejected, vec![bad]);
        assert_eq!(report.topics, 1);
    }

    #[tokio::test]
    async fn test_duplicates_and_gaps_warn_but_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut odd = sample_topic(7);
        odd.slug = "topic-day-1".to_string();
        odd.pillar = "gardening".to_string();
        let odd_path = dir.path().join("odd.json");
        write_json_atomic(&odd_path, &vec![odd]).await.unwrap();
        let batches = vec![
            write_batch(dir.path(), "b1.json", &[1, 2]).await,
            write_batch(dir.path(), "b2.json", &[2, 4]).await,
            odd_path,
        ];
        let out = dir.path().join("topics.json");

        let report = combine_batches(&batches, &out).await.unwrap();
        assert_eq!(report.topics, 5);
        assert_eq!(report.duplicate_days, vec![2]);
        assert_eq!(report.duplicate_slugs, vec!["topic-day-1", "topic-day-2"]);
        assert_eq!(report.missing_days, vec![3, 5, 6]);
        assert_eq!(report.unknown_tags, vec![(7, "gardening".to_string())]);
        assert!(report.has_warnings());
    }

    #[tokio::test]
    async fn test_keeps_bank_when_no_batch_loads() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("topics.json");
        let bank = vec![sample_topic(1), sample_topic(2)];
        write_json_atomic(&out, &bank).await.unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        let batches = vec![dir.path().join("absent.json"), bad];

        let err = combine_batches(&batches, &out).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoTopicBatches(2))
        ));
        assert_eq!(read_bank(&out).await, bank);
    }

    #[tokio::test]
    async fn test_overwrites_previous_bank() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("topics.json");
        std::fs::write(&out, "[]").unwrap();
        let batches = vec![write_batch(dir.path(), "b1.json", &[1]).await];

        combine_batches(&batches, &out).await.unwrap();
        assert_eq!(read_bank(&out).await.len(), 1);
    }
}
