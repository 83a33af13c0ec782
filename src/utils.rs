//! Utility functions for string handling, JSON error detection and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging and descriptions
//! - Title fingerprints for research deduplication
//! - JSON error detection for handling LLM response truncation
//! - Output directory validation

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Length of a title fingerprint, in characters.
const FINGERPRINT_LEN: usize = 50;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep the first `max` characters of `s`, appending `...` if anything was cut.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...", &s[..cut]),
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Normalised title used to spot the same story syndicated under different URLs.
///
/// Lowercases, strips everything that is not `a-z0-9` and keeps the first
/// 50 characters.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(title_fingerprint("OSHA: Falls Top List!"), "oshafallstoplist");
/// ```
pub fn title_fingerprint(title: &str) -> String {
    NON_ALNUM
        .replace_all(&title.to_lowercase(), "")
        .chars()
        .take(FINGERPRINT_LEN)
        .collect()
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Strip a Markdown code fence the model sometimes wraps around JSON.
pub fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            if let Err(e) = stdfs::remove_file(&probe_path) {
                warn!(path = %probe_path.display(), error = %e, "Could not remove write probe");
            }
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "é".repeat(20);
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("ééééé…"));
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 155), "short");
        let long = "x".repeat(200);
        let cut = truncate_with_ellipsis(&long, 155);
        assert_eq!(cut.len(), 158);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_with_ellipsis(&"y".repeat(155), 155), "y".repeat(155));
    }

    #[test]
    fn test_title_fingerprint() {
        assert_eq!(title_fingerprint("OSHA: Falls Top List!"), "oshafallstoplist");
        assert_eq!(
            title_fingerprint("Heat Illness  — New Rule"),
            title_fingerprint("heat illness: new rule")
        );
        assert_eq!(title_fingerprint(&"ab ".repeat(60)).len(), 50);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence(" [1] "), "[1]");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#; // Missing closing brace
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        assert!(looks_truncated(&result.unwrap_err()));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("content/blog");
        ensure_writable_dir(&target).await.unwrap();
        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }
}
