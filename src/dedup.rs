//! Cross-feed near-duplicate suppression by headline similarity.
//!
//! Outlets covering the same story write headlines that share content words
//! but differ in phrasing ("Fed raises interest rates by 0.25%" vs "Federal
//! Reserve hikes rates quarter point"). Exact matching misses those, so the
//! filter compares token lists with a fuzzy per-token score:
//!
//! 1. Tokenize both titles: lowercase, strip non-letters, drop stopwords
//!    and tokens shorter than 3 characters.
//! 2. For each token of the shorter list, take its best Jaro-Winkler match
//!    against the other list. A token that is a prefix of another scores at
//!    least 0.9 ("fed" / "federal"); matches below 0.7 count as 0.
//! 3. The similarity is the mean of those best-match scores.
//!
//! Two titles at or above [`SIMILARITY_THRESHOLD`] are duplicates; the
//! first-seen item wins and the later one is discarded. Items missing a
//! title or link are dropped here as well, before they can reach
//! normalization.

use crate::models::SourcedItem;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use strsim::jaro_winkler;
use tracing::{debug, instrument};

/// Titles scoring at or above this are considered the same story.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Per-token match floor; weaker matches contribute nothing.
const TOKEN_MATCH_FLOOR: f64 = 0.7;

/// Score granted when one token is a prefix of the other.
const PREFIX_SCORE: f64 = 0.9;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "has", "have",
        "had", "will", "would", "can", "could", "should", "its", "his", "her", "their", "our",
        "your", "but", "not", "all", "any", "into", "over", "after", "before", "about", "more",
        "than", "then", "when", "where", "what", "who", "how", "why", "out", "off", "per", "via",
        "amid", "says", "say", "said", "new",
    ]
    .into_iter()
    .collect()
});

/// Result of deduplicating one batch.
#[derive(Debug)]
pub struct DedupOutcome {
    /// Survivors, newest first (missing timestamps sort last).
    pub kept: Vec<SourcedItem>,
    /// Items discarded as near-duplicates or for missing title/link.
    pub dropped: usize,
}

/// Deduplicate a batch of items gathered across all feeds.
///
/// First-seen wins: the batch is scanned in arrival order and each item is
/// compared against the titles already kept. Survivors are then sorted
/// newest first so the freshest stories are processed before any budget
/// runs out.
#[instrument(level = "debug", skip_all, fields(batch = items.len()))]
pub fn dedup_batch(items: Vec<SourcedItem>) -> DedupOutcome {
    let mut kept: Vec<SourcedItem> = Vec::with_capacity(items.len());
    let mut kept_tokens: Vec<Vec<String>> = Vec::with_capacity(items.len());
    let mut dropped = 0;

    for item in items {
        if item.item.title.is_empty() || item.item.link.is_empty() {
            dropped += 1;
            continue;
        }
        let tokens = tokens(&item.item.title);
        let duplicate = kept_tokens
            .iter()
            .any(|existing| token_list_similarity(existing, &tokens) >= SIMILARITY_THRESHOLD);
        if duplicate {
            debug!(title = %item.item.title, "Dropped near-duplicate");
            dropped += 1;
        } else {
            kept_tokens.push(tokens);
            kept.push(item);
        }
    }

    kept.sort_by(|a, b| b.item.published_at.cmp(&a.item.published_at));
    DedupOutcome { kept, dropped }
}

/// Similarity between two titles in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    token_list_similarity(&tokens(a), &tokens(b))
}

fn token_list_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Score from the shorter list so extra detail words in a longer
    // headline don't dilute a genuine match.
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let total: f64 = short
        .iter()
        .map(|token| {
            let best = long
                .iter()
                .map(|other| token_sim(token, other))
                .fold(0.0_f64, f64::max);
            if best >= TOKEN_MATCH_FLOOR { best } else { 0.0 }
        })
        .sum();
    total / short.len() as f64
}

fn token_sim(a: &str, b: &str) -> f64 {
    let jw = jaro_winkler(a, b);
    let prefix = a.len() >= 3 && b.len() >= 3 && (a.starts_with(b) || b.starts_with(a));
    if prefix { jw.max(PREFIX_SCORE) } else { jw }
}

fn tokens(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphabetic()).collect::<String>())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawFeedItem;
    use chrono::{Duration, Utc};

    fn item(title: &str, link: &str, age_hours: Option<i64>) -> SourcedItem {
        SourcedItem {
            category: "World".to_string(),
            feed_url: "https://example.com/rss".to_string(),
            item: RawFeedItem {
                title: title.to_string(),
                link: link.to_string(),
                published_at: age_hours.map(|h| Utc::now() - Duration::hours(h)),
                content: String::new(),
                media: Vec::new(),
            },
        }
    }

    #[test]
    fn test_rephrased_headlines_are_duplicates() {
        let sim = title_similarity(
            "Fed raises interest rates by 0.25%",
            "Federal Reserve hikes rates quarter point",
        );
        assert!(sim >= SIMILARITY_THRESHOLD, "similarity was {sim}");
    }

    #[test]
    fn test_unrelated_headlines_are_not_duplicates() {
        let sim = title_similarity("Fed raises rates", "New species of jellyfish found");
        assert!(sim < SIMILARITY_THRESHOLD, "similarity was {sim}");
    }

    #[test]
    fn test_identical_titles_score_one() {
        let sim = title_similarity("Markets rally on tech earnings", "Markets rally on tech earnings");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_seen_wins() {
        let outcome = dedup_batch(vec![
            item(
                "Fed raises interest rates by 0.25%",
                "https://a.example.com/fed",
                Some(1),
            ),
            item(
                "Federal Reserve hikes rates quarter point",
                "https://b.example.com/fed",
                Some(1),
            ),
        ]);

        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.kept[0].item.link, "https://a.example.com/fed");
    }

    #[test]
    fn test_survivors_sorted_newest_first() {
        let outcome = dedup_batch(vec![
            item("Alpha story about gardening", "https://e.com/1", Some(3)),
            item("Beta story about volcanoes", "https://e.com/2", Some(1)),
            item("Gamma story about sailing", "https://e.com/3", Some(2)),
        ]);

        let links: Vec<&str> = outcome.kept.iter().map(|i| i.item.link.as_str()).collect();
        assert_eq!(links, vec!["https://e.com/2", "https://e.com/3", "https://e.com/1"]);
    }

    #[test]
    fn test_missing_timestamp_sorts_last() {
        let outcome = dedup_batch(vec![
            item("Undated chronicle of mountain weather", "https://e.com/nodate", None),
            item("Fresh bulletin covering harbor traffic", "https://e.com/dated", Some(1)),
        ]);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.kept.last().unwrap().item.link, "https://e.com/nodate");
    }

    #[test]
    fn test_missing_title_or_link_dropped() {
        let outcome = dedup_batch(vec![
            item("", "https://e.com/untitled", Some(1)),
            item("Orphaned story with no link", "", Some(1)),
            item("A perfectly valid story", "https://e.com/ok", Some(1)),
        ]);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.dropped, 2);
    }

    #[test]
    fn test_empty_batch() {
        let outcome = dedup_batch(Vec::new());
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.dropped, 0);
    }
}
