//! Utility functions for text cleanup, truncation, and file system checks.
//!
//! This module provides helper functions used throughout the pipeline:
//! - HTML tag stripping and whitespace normalization for summaries
//! - Character-boundary-safe truncation with an ellipsis
//! - Read-time estimation for enriched articles
//! - Source labelling from article URLs
//! - Output directory validation

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip HTML tags from a string and collapse runs of whitespace.
///
/// Feed descriptions frequently arrive as HTML fragments; summaries must be
/// plain text so that later truncation can never split a tag.
///
/// # Arguments
///
/// * `s` - The possibly-HTML input text
///
/// # Returns
///
/// Plain text with tags removed, common entities decoded, and whitespace
/// collapsed to single spaces.
pub fn strip_tags(s: &str) -> String {
    let without_tags = RE_TAGS.replace_all(s, " ");
    let decoded = without_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

/// Truncate a string to at most `max` characters, appending an ellipsis.
///
/// Truncation counts characters (not bytes) so multi-byte text is never cut
/// mid-codepoint. Strings already within the cap are returned unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("hello", 10), "hello");
/// assert_eq!(truncate_chars("hello world", 5), "hello…");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..max], s.len() - max)
    }
}

/// Estimate reading time in minutes from a word count at ~200 words/minute.
///
/// Always returns at least 1 so an article never advertises a zero-minute
/// read.
pub fn estimate_read_time(text: &str) -> u32 {
    let words = text.split_whitespace().count() as u32;
    (words / 200).max(1)
}

/// Extract a short source label from an article or feed URL.
///
/// Takes the domain part before the TLD, e.g. `https://lite.cnn.com/...`
/// -> `cnn`. Returns `"unknown"` when the URL cannot be parsed.
pub fn source_label(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            let parts: Vec<&str> = host.split('.').collect();
            if parts.len() >= 2 {
                return parts[parts.len() - 2].to_string();
            }
            return host.to_string();
        }
    }
    "unknown".to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
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
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("no markup here"), "no markup here");
        assert_eq!(strip_tags("a &amp; b"), "a & b");
        assert_eq!(strip_tags("<img src='x.png'/>caption"), "caption");
    }

    #[test]
    fn test_strip_tags_collapses_whitespace() {
        assert_eq!(strip_tags("  spaced\n\nout\ttext  "), "spaced out text");
    }

    #[test]
    fn test_truncate_chars_short_string() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_chars_long_string() {
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }

    #[test]
    fn test_truncate_chars_multibyte_safe() {
        assert_eq!(truncate_chars("héllö wörld", 4), "héll…");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_estimate_read_time_floors_at_one() {
        assert_eq!(estimate_read_time("just a few words"), 1);
    }

    #[test]
    fn test_estimate_read_time_longer_text() {
        let text = "word ".repeat(650);
        assert_eq!(estimate_read_time(&text), 3);
    }

    #[test]
    fn test_source_label() {
        assert_eq!(source_label("https://lite.cnn.com/article"), "cnn");
        assert_eq!(source_label("https://example.com/feed.xml"), "example");
        assert_eq!(source_label("not a url"), "unknown");
    }
}
