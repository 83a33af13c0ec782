//! Data models for topics, the publication schedule and the research feed.
//!
//! This module defines the core data structures used throughout the application:
//! - [`TopicRecord`]: One entry of the 180-day topic bank
//! - [`ScheduleRecord`] / [`PostStatus`]: The persisted publication schedule
//! - [`ResearchFeed`] / [`ResearchItem`]: Scored news items produced by the research job
//! - [`FrontMatter`]: Metadata written at the top of every generated post
//! - Fixed tag sets: [`Pillar`], [`PostFormat`]
//!
//! All on-disk JSON uses camelCase keys, matching the files the website reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One topic of the bank. Immutable at runtime.
///
/// `pillar` and `format` stay plain strings so that a single unrecognised tag
/// does not make a whole bank unreadable; use [`TopicRecord::pillar_tag`] and
/// [`TopicRecord::format_tag`] for the typed view.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    /// 1-based day number; unique and contiguous across the bank.
    pub day: u32,
    /// Unique identifier, also the content file stem.
    pub slug: String,
    pub title: String,
    pub target_keyword: String,
    pub psychological_concept: String,
    pub construction_framing: String,
    pub safety_tap_connection: String,
    pub tone: String,
    #[serde(default)]
    pub research_references: Vec<String>,
    /// Rendering hint only, e.g. `"1200-1500 words"`.
    #[serde(default)]
    pub target_length: String,
    pub pillar: String,
    pub format: String,
}

impl TopicRecord {
    pub fn pillar_tag(&self) -> Option<Pillar> {
        self.pillar.parse().ok()
    }

    pub fn format_tag(&self) -> Option<PostFormat> {
        self.format.parse().ok()
    }
}

/// Error returned when a string is not one of a fixed tag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag `{}`", self.0)
    }
}

impl std::error::Error for UnknownTag {}

/// Top-level content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pillar {
    PsychologyOfRisk,
    SafetyLeadership,
    CrewCommunication,
    HumanFactors,
    MentalHealth,
    SafetyCulture,
    FieldTechnology,
    IncidentLearning,
}

impl Pillar {
    pub const ALL: [Pillar; 8] = [
        Pillar::PsychologyOfRisk,
        Pillar::SafetyLeadership,
        Pillar::CrewCommunication,
        Pillar::HumanFactors,
        Pillar::MentalHealth,
        Pillar::SafetyCulture,
        Pillar::FieldTechnology,
        Pillar::IncidentLearning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::PsychologyOfRisk => "psychology-of-risk",
            Pillar::SafetyLeadership => "safety-leadership",
            Pillar::CrewCommunication => "crew-communication",
            Pillar::HumanFactors => "human-factors",
            Pillar::MentalHealth => "mental-health",
            Pillar::SafetyCulture => "safety-culture",
            Pillar::FieldTechnology => "field-technology",
            Pillar::IncidentLearning => "incident-learning",
        }
    }

    /// Keywords used by the dry-run research scorer.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Pillar::PsychologyOfRisk => &["risk", "bias", "complacency", "perception", "decision"],
            Pillar::SafetyLeadership => &["leader", "supervisor", "foreman", "management"],
            Pillar::CrewCommunication => &["communication", "briefing", "handoff", "crew", "speak up"],
            Pillar::HumanFactors => &["fatigue", "ergonomic", "human error", "distraction", "heat"],
            Pillar::MentalHealth => &["mental health", "suicide", "stress", "wellbeing", "burnout"],
            Pillar::SafetyCulture => &["culture", "near miss", "reporting", "trust", "accountab"],
            Pillar::FieldTechnology => &["wearable", "drone", "sensor", "app", "technology", "ai "],
            Pillar::IncidentLearning => &["incident", "fatality", "osha", "investigation", "citation"],
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pillar {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pillar::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Post type, determining target length and read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostFormat {
    DeepDive,
    CaseStudy,
    Listicle,
    MythBuster,
    ToolboxTalk,
    FieldTip,
}

impl PostFormat {
    pub const ALL: [PostFormat; 6] = [
        PostFormat::DeepDive,
        PostFormat::CaseStudy,
        PostFormat::Listicle,
        PostFormat::MythBuster,
        PostFormat::ToolboxTalk,
        PostFormat::FieldTip,
    ];

    /// The long-form type; posts of this format are featured.
    pub const LONG_FORM: PostFormat = PostFormat::DeepDive;

    pub fn as_str(&self) -> &'static str {
        match self {
            PostFormat::DeepDive => "deep-dive",
            PostFormat::CaseStudy => "case-study",
            PostFormat::Listicle => "listicle",
            PostFormat::MythBuster => "myth-buster",
            PostFormat::ToolboxTalk => "toolbox-talk",
            PostFormat::FieldTip => "field-tip",
        }
    }

    /// Target word count, inclusive.
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            PostFormat::DeepDive => (2500, 3500),
            PostFormat::CaseStudy => (1500, 2000),
            PostFormat::Listicle => (1200, 1600),
            PostFormat::MythBuster => (1000, 1400),
            PostFormat::ToolboxTalk => (800, 1000),
            PostFormat::FieldTip => (500, 700),
        }
    }

    pub fn read_time(&self) -> &'static str {
        match self {
            PostFormat::DeepDive => "12 min",
            PostFormat::CaseStudy => "8 min",
            PostFormat::Listicle => "6 min",
            PostFormat::MythBuster => "5 min",
            PostFormat::ToolboxTalk => "4 min",
            PostFormat::FieldTip => "3 min",
        }
    }
}

impl fmt::Display for PostFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostFormat {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Publication state of a scheduled day.
///
/// Other tools write this file too; a state this program does not know is
/// kept verbatim in [`PostState::Other`] and counts as not published.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum PostState {
    #[default]
    Pending,
    Draft,
    Published,
    Other(String),
}

impl From<String> for PostState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => PostState::Pending,
            "draft" => PostState::Draft,
            "published" => PostState::Published,
            _ => PostState::Other(s),
        }
    }
}

impl From<PostState> for String {
    fn from(state: PostState) -> Self {
        match state {
            PostState::Pending => "pending".to_string(),
            PostState::Draft => "draft".to_string(),
            PostState::Published => "published".to_string(),
            PostState::Other(s) => s,
        }
    }
}

/// When a post was generated, or a marker for posts that predate the schedule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GeneratedAt {
    At(DateTime<Utc>),
    Marker(String),
}

impl GeneratedAt {
    /// Marker for content found on disk during initialisation.
    pub const PRE_EXISTING: &'static str = "pre-existing";

    pub fn pre_existing() -> Self {
        GeneratedAt::Marker(Self::PRE_EXISTING.to_string())
    }

    pub fn is_pre_existing(&self) -> bool {
        matches!(self, GeneratedAt::Marker(m) if m == Self::PRE_EXISTING)
    }
}

/// Schedule entry for one day.
///
/// Keys this program does not know about (written by the website's admin
/// handlers, for instance) are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStatus {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    pub pillar: String,
    pub format: String,
    #[serde(default)]
    pub status: PostState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<GeneratedAt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editorial_note: Option<String>,
    #[serde(default)]
    pub had_research_integration: bool,
    #[serde(default)]
    pub had_editorial_note: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostStatus {
    /// A fresh pending entry for `topic` on `date`.
    pub fn pending(topic: &TopicRecord, date: NaiveDate) -> Self {
        Self {
            slug: topic.slug.clone(),
            title: topic.title.clone(),
            date,
            pillar: topic.pillar.clone(),
            format: topic.format.clone(),
            status: PostState::Pending,
            generated_at: None,
            hero_image: None,
            editorial_note: None,
            had_research_integration: false,
            had_editorial_note: false,
            extra: Map::new(),
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostState::Published
    }
}

/// The persisted publication schedule. One per site.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    /// Calendar date of day 1.
    pub start_date: NaiveDate,
    #[serde(default)]
    pub posts: BTreeMap<u32, PostStatus>,
}

/// A scored news item from the research feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchItem {
    pub source: String,
    pub title: String,
    pub url: String,
    /// RFC 3339 when produced by this tool; other producers may differ.
    #[serde(default)]
    pub published_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub relevance_pillars: Vec<String>,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub potential_angles: Vec<String>,
}

/// The research feed file, regenerated periodically by `research`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchFeed {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub total_items: usize,
    #[serde(default)]
    pub high_relevance_count: usize,
    #[serde(default)]
    pub items: Vec<ResearchItem>,
}

/// Metadata block written at the top of each generated post.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontMatter {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub slug: String,
    pub pillar: String,
    pub format: String,
    pub tags: Vec<String>,
    pub read_time: String,
    pub featured: bool,
}

#[cfg(test)]
pub(crate) fn sample_topic(day: u32) -> TopicRecord {
    TopicRecord {
        day,
        slug: format!("topic-day-{day}"),
        title: format!("Topic for day {day}"),
        target_keyword: "construction safety psychology".to_string(),
        psychological_concept: "Normalization of deviance".to_string(),
        construction_framing: "Skipping a tie-off because nothing happened last time".to_string(),
        safety_tap_connection: "A tap logs the near miss before it becomes normal".to_string(),
        tone: "Direct, respectful".to_string(),
        research_references: vec!["Vaughan (1996)".to_string()],
        target_length: "500-700 words".to_string(),
        pillar: "psychology-of-risk".to_string(),
        format: "field-tip".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_deserialization_camel_case() {
        let json = r#"{
            "day": 4,
            "slug": "fatigue-is-a-hazard",
            "title": "Fatigue Is a Hazard",
            "targetKeyword": "construction fatigue",
            "psychologicalConcept": "Sleep debt",
            "constructionFraming": "Back-to-back night pours",
            "safetyTapConnection": "Flag a tired crew",
            "tone": "Warm",
            "researchReferences": ["Dawson & Reid (1997)"],
            "targetLength": "800-1000 words",
            "pillar": "human-factors",
            "format": "toolbox-talk"
        }"#;

        let topic: TopicRecord = serde_json::from_str(json).unwrap();
        assert_eq!(topic.day, 4);
        assert_eq!(topic.pillar_tag(), Some(Pillar::HumanFactors));
        assert_eq!(topic.format_tag(), Some(PostFormat::ToolboxTalk));
    }

    #[test]
    fn test_unknown_tags_stay_readable() {
        let mut topic = sample_topic(1);
        topic.format = "podcast".to_string();
        topic.pillar = "gardening".to_string();
        assert_eq!(topic.format_tag(), None);
        assert_eq!(topic.pillar_tag(), None);
        assert_eq!(
            "podcast".parse::<PostFormat>(),
            Err(UnknownTag("podcast".to_string()))
        );
    }

    #[test]
    fn test_tag_round_trip_through_str() {
        for p in Pillar::ALL {
            assert_eq!(p.as_str().parse::<Pillar>(), Ok(p));
        }
        for f in PostFormat::ALL {
            assert_eq!(f.as_str().parse::<PostFormat>(), Ok(f));
        }
    }

    #[test]
    fn test_post_status_preserves_unknown_keys() {
        let json = r#"{
            "slug": "a",
            "title": "A",
            "date": "2025-03-01",
            "pillar": "mental-health",
            "format": "field-tip",
            "status": "published",
            "generatedAt": "pre-existing",
            "heroImage": "/img/a.jpg",
            "socialCopy": {"linkedin": "hello"}
        }"#;

        let post: PostStatus = serde_json::from_str(json).unwrap();
        assert!(post.is_published());
        assert!(post.generated_at.as_ref().unwrap().is_pre_existing());
        assert_eq!(post.hero_image.as_deref(), Some("/img/a.jpg"));
        assert!(post.extra.contains_key("socialCopy"));

        let out = serde_json::to_string(&post).unwrap();
        assert!(out.contains("\"socialCopy\""));
        assert!(out.contains("\"heroImage\""));
    }

    #[test]
    fn test_foreign_status_is_kept_and_not_published() {
        let json = r#"{
            "slug": "a",
            "title": "A",
            "date": "2025-03-01",
            "pillar": "mental-health",
            "format": "field-tip",
            "status": "scheduled"
        }"#;

        let post: PostStatus = serde_json::from_str(json).unwrap();
        assert_eq!(post.status, PostState::Other("scheduled".to_string()));
        assert!(!post.is_published());

        let out = serde_json::to_string(&post).unwrap();
        assert!(out.contains(r#""status":"scheduled""#));
    }

    #[test]
    fn test_known_status_strings() {
        let published: PostState = serde_json::from_str(r#""published""#).unwrap();
        assert_eq!(published, PostState::Published);
        assert_eq!(serde_json::to_string(&PostState::Draft).unwrap(), r#""draft""#);
    }

    #[test]
    fn test_generated_at_timestamp() {
        let json = r#""2025-03-01T06:00:00Z""#;
        let at: GeneratedAt = serde_json::from_str(json).unwrap();
        assert!(matches!(at, GeneratedAt::At(_)));
        assert!(!at.is_pre_existing());
    }

    #[test]
    fn test_schedule_integer_keys() {
        let json = r#"{"startDate": "2025-01-01", "posts": {}}"#;
        let mut schedule: ScheduleRecord = serde_json::from_str(json).unwrap();
        schedule
            .posts
            .insert(2, PostStatus::pending(&sample_topic(2), schedule.start_date));
        let out = serde_json::to_string(&schedule).unwrap();
        assert!(out.contains("\"2\":"));
        let back: ScheduleRecord = serde_json::from_str(&out).unwrap();
        assert_eq!(back, schedule);
    }
}
