//! Scoring fetched items against the content pillars.
//!
//! Items go to the oracle in batches of ten. The model answers with a JSON
//! array of `{index, relevancePillars, relevanceScore, potentialAngles}`. A
//! batch whose call fails or whose answer does not parse keeps its items as
//! un-analysed placeholders (score 0) rather than failing the feed.
//!
//! In dry-run mode no model is called; items are scored by counting pillar
//! keywords in the title and summary.

use crate::api::{AskAsync, ask_with_backoff};
use crate::models::{Pillar, ResearchItem};
use crate::research::sources::{RawItem, parse_date};
use crate::utils::{looks_truncated, strip_code_fence, truncate_for_log};
use serde::Deserialize;
use tracing::{info, instrument, warn};

pub const ANALYSIS_BATCH_SIZE: usize = 10;
/// Items at or above this score count towards `highRelevanceCount`.
pub const HIGH_RELEVANCE: f64 = 0.7;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Analysis {
    index: usize,
    #[serde(default)]
    relevance_pillars: Vec<String>,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    potential_angles: Vec<String>,
}

/// The request sent for one batch.
pub fn analysis_prompt(batch: &[RawItem]) -> String {
    let mut prompt = format!(
        "Score each news item for relevance to a construction-safety blog about the psychology of \
         safe work. Use only these pillar tags: {}.\n\
         Reply with a JSON array only, one object per item: \
         {{\"index\": number, \"relevancePillars\": [string], \"relevanceScore\": number between 0 and 1, \
         \"potentialAngles\": [string]}}.\n\n",
        Pillar::ALL.map(|p| p.as_str()).join(", ")
    );
    for (i, item) in batch.iter().enumerate() {
        prompt.push_str(&format!("[{i}] {} ({})\n{}\n\n", item.title, item.source, item.summary));
    }
    prompt
}

/// Score `items` with the oracle, batch by batch.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn analyze_items<O>(oracle: &O, items: Vec<RawItem>, max_retries: usize) -> Vec<ResearchItem>
where
    O: AskAsync<Response = String>,
{
    let mut analyzed = Vec::with_capacity(items.len());
    for (batch_no, batch) in items.chunks(ANALYSIS_BATCH_SIZE).enumerate() {
        let prompt = analysis_prompt(batch);
        match ask_parsed(oracle, &prompt, max_retries).await {
            Some(answers) => {
                info!(batch_no, answers = answers.len(), "Analysed batch");
                analyzed.extend(apply_analysis(batch, answers));
            }
            None => {
                warn!(batch_no, size = batch.len(), "Batch analysis failed; keeping placeholders");
                analyzed.extend(batch.iter().map(placeholder));
            }
        }
    }
    analyzed
}

/// Ask and parse, re-asking once if the answer was cut off mid-JSON.
async fn ask_parsed<O>(oracle: &O, prompt: &str, max_retries: usize) -> Option<Vec<Analysis>>
where
    O: AskAsync<Response = String>,
{
    let mut response = ask_with_backoff(oracle, prompt, max_retries).await.ok()?;
    let mut parsed = serde_json::from_str::<Vec<Analysis>>(strip_code_fence(&response));

    if let Err(ref e) = parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing analysis; re-asking once");
            response = ask_with_backoff(oracle, prompt, max_retries).await.ok()?;
            parsed = serde_json::from_str::<Vec<Analysis>>(strip_code_fence(&response));
        }
    }

    match parsed {
        Ok(answers) => Some(answers),
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&response, 300),
                "Model returned non-conforming JSON"
            );
            None
        }
    }
}

fn apply_analysis(batch: &[RawItem], answers: Vec<Analysis>) -> Vec<ResearchItem> {
    let mut out: Vec<ResearchItem> = batch.iter().map(placeholder).collect();
    for answer in answers {
        let Some(item) = out.get_mut(answer.index) else {
            warn!(index = answer.index, "Analysis refers to an unknown item; ignoring");
            continue;
        };
        item.relevance_pillars = answer
            .relevance_pillars
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        item.relevance_score = clamp_score(answer.relevance_score);
        item.potential_angles = answer.potential_angles;
    }
    out
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// An un-analysed item: no pillars, score 0.
pub fn placeholder(raw: &RawItem) -> ResearchItem {
    ResearchItem {
        source: raw.source.clone(),
        title: raw.title.clone(),
        url: raw.url.clone(),
        published_date: raw.published.map(|d| d.to_rfc3339()).unwrap_or_default(),
        summary: raw.summary.clone(),
        relevance_pillars: Vec::new(),
        relevance_score: 0.0,
        potential_angles: Vec::new(),
    }
}

/// Keyword scoring used in dry runs: 0.25 per keyword hit, capped at 1.
pub fn heuristic_item(raw: &RawItem) -> ResearchItem {
    let haystack = format!("{} {}", raw.title, raw.summary).to_lowercase();
    let mut item = placeholder(raw);
    let mut hits = 0usize;
    for pillar in Pillar::ALL {
        let n = pillar.keywords().iter().filter(|k| haystack.contains(*k)).count();
        if n > 0 {
            item.relevance_pillars.push(pillar.as_str().to_string());
            hits += n;
        }
    }
    item.relevance_score = (hits as f64 * 0.25).min(1.0);
    item
}

/// Order by score descending, then publication date descending.
pub fn sort_items(items: &mut [ResearchItem]) {
    items.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| parse_date(&b.published_date).cmp(&parse_date(&a.published_date)))
    });
}

pub fn high_relevance_count(items: &[ResearchItem]) -> usize {
    items.iter().filter(|i| i.relevance_score >= HIGH_RELEVANCE).count()
}
