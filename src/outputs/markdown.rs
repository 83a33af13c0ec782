//! Markdown post files.
//!
//! A post is YAML front matter between `---` fences followed by the body the
//! model returned. The front matter is a pure function of the topic and its
//! publication date.

use crate::models::{FrontMatter, PostFormat, TopicRecord};
use crate::utils::truncate_with_ellipsis;
use chrono::NaiveDate;
use itertools::Itertools;

/// Descriptions longer than this are cut and end in `...`.
pub const DESCRIPTION_MAX_CHARS: usize = 155;
/// Read time for formats outside the fixed set.
pub const FALLBACK_READ_TIME: &str = "5 min";

/// Keyword words this long or shorter are not used as tags.
const MIN_TAG_WORD_CHARS: usize = 4;
const MAX_KEYWORD_TAGS: usize = 2;

pub fn derive_front_matter(topic: &TopicRecord, date: NaiveDate) -> FrontMatter {
    let format = topic.format_tag();
    let read_time = format
        .map(|f| f.read_time())
        .unwrap_or(FALLBACK_READ_TIME)
        .to_string();

    let keyword_tags = topic
        .target_keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > MIN_TAG_WORD_CHARS)
        .take(MAX_KEYWORD_TAGS);
    let tags = [topic.pillar.clone(), topic.format.clone()]
        .into_iter()
        .chain(keyword_tags)
        .unique()
        .collect();

    FrontMatter {
        title: topic.title.clone(),
        description: truncate_with_ellipsis(&topic.psychological_concept, DESCRIPTION_MAX_CHARS),
        date,
        slug: topic.slug.clone(),
        pillar: topic.pillar.clone(),
        format: topic.format.clone(),
        tags,
        read_time,
        featured: format == Some(PostFormat::LONG_FORM),
    }
}

/// Full file contents: fenced front matter, blank line, body.
pub fn render_post(front_matter: &FrontMatter, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(front_matter)?;
    Ok(format!("---\n{yaml}---\n\n{}\n", body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_topic;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn test_field_tip_front_matter() {
        let fm = derive_front_matter(&sample_topic(5), date());
        assert_eq!(fm.read_time, "3 min");
        assert!(!fm.featured);
        assert_eq!(fm.date, date());
        assert_eq!(
            fm.tags,
            vec!["psychology-of-risk", "field-tip", "construction", "safety"]
        );
        assert_eq!(fm.description, "Normalization of deviance");
    }

    #[test]
    fn test_deep_dive_is_featured() {
        let mut topic = sample_topic(1);
        topic.format = "deep-dive".to_string();
        let fm = derive_front_matter(&topic, date());
        assert!(fm.featured);
        assert_eq!(fm.read_time, "12 min");
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let mut topic = sample_topic(1);
        topic.format = "podcast".to_string();
        let fm = derive_front_matter(&topic, date());
        assert_eq!(fm.read_time, FALLBACK_READ_TIME);
        assert!(!fm.featured);
    }

    #[test]
    fn test_tags_deduplicated_and_short_words_dropped() {
        let mut topic = sample_topic(1);
        topic.pillar = "safety".to_string();
        topic.target_keyword = "Safety at the jobsite today".to_string();
        let fm = derive_front_matter(&topic, date());
        assert_eq!(fm.tags, vec!["safety", "field-tip", "jobsite"]);
    }

    #[test]
    fn test_long_description_truncated() {
        let mut topic = sample_topic(1);
        topic.psychological_concept = "w".repeat(300);
        let fm = derive_front_matter(&topic, date());
        assert_eq!(fm.description.chars().count(), DESCRIPTION_MAX_CHARS + 3);
        assert!(fm.description.ends_with("..."));
    }

    #[test]
    fn test_render_post_layout() {
        let fm = derive_front_matter(&sample_topic(5), date());
        let text = render_post(&fm, "\nBody paragraph.\n\n").unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("readTime: 3 min"));
        assert!(text.contains("featured: false"));
        assert!(text.ends_with("---\n\nBody paragraph.\n"));

        let yaml = text.trim_start_matches("---\n").split("---\n").next().unwrap();
        let back: FrontMatter = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(back, fm);
    }
}
