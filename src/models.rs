//! Data models for feed items and their processed representations.
//!
//! This module defines the core data structures flowing through the pipeline:
//! - [`RawFeedItem`]: One item as parsed out of an RSS/Atom feed
//! - [`SourcedItem`]: A raw item tagged with its feed's provenance
//! - [`CanonicalArticle`]: The normalized article shape with a stable id
//! - [`EnrichedArticle`]: A canonical article plus AI-derived metadata
//! - [`RunStats`]: Aggregate statistics for a single ingestion run
//!
//! Lifecycle: raw items are ephemeral (created by the fetcher, consumed by
//! the normalizer, never persisted); canonical articles are mutated in place
//! by enrichment; enriched articles end their life at a successful upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item parsed from a syndication feed, before normalization.
///
/// Fields mirror what RSS 2.0 and Atom can reliably supply. `title` and
/// `link` may be empty for malformed items; the deduplicator drops those.
#[derive(Debug, Clone)]
pub struct RawFeedItem {
    /// Item headline as published by the feed.
    pub title: String,
    /// Link to the article page; doubles as the canonical URL.
    pub link: String,
    /// Publish timestamp, when the feed supplied a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// Item content or snippet, frequently an HTML fragment.
    pub content: String,
    /// Media URLs from enclosures / media extensions, in document order.
    pub media: Vec<String>,
}

/// A raw item together with the registry metadata of the feed it came from.
///
/// Dedup runs across all feeds in a batch, so provenance has to travel with
/// each item rather than staying implicit in a per-feed loop.
#[derive(Debug, Clone)]
pub struct SourcedItem {
    /// Registry category of the originating feed.
    pub category: String,
    /// Endpoint URL of the originating feed.
    pub feed_url: String,
    /// The parsed item itself.
    pub item: RawFeedItem,
}

/// The canonical article shape produced by the normalizer.
///
/// # Identity
///
/// `id` is derived by hashing the canonical URL, so re-ingesting the same
/// URL always yields the same id across runs and across processes. That
/// stability is what makes the persistence upsert idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalArticle {
    /// Stable identifier: hex-encoded hash of the canonical URL.
    pub id: String,
    /// Article headline.
    pub title: String,
    /// Canonical article URL (the dedup/identity key).
    pub url: String,
    /// Plain-text summary, capped at [`crate::normalize::SUMMARY_MAX_CHARS`].
    pub summary: String,
    /// Article body as HTML.
    pub content: String,
    /// Publish timestamp; falls back to ingest time when the feed had none.
    pub published_at: DateTime<Utc>,
    /// Primary image URL.
    pub image: String,
    /// Up to 3 additional image URLs for gallery display.
    pub related_images: Vec<String>,
    /// Short label of the publishing source, e.g. `cnn`.
    pub source: String,
    /// Category label, from the feed registry or the enrichment model.
    pub category: String,
    /// Finer-grained category assigned by the enrichment model.
    pub subcategory: String,
}

/// A canonical article plus the metadata added by the enrichment engine.
///
/// `ai_processed = false` marks a fallback (non-AI) result; a later
/// re-enrichment sweep uses that flag to find articles worth another pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: CanonicalArticle,
    /// Overall sentiment of the story ("positive", "neutral", "negative").
    pub sentiment: String,
    /// Estimated reading time in minutes.
    pub read_time: u32,
    /// Entity tags extracted by the model (empty for fallback results).
    pub tags: Vec<String>,
    /// One-sentence "why this matters" note, when the model produced one.
    pub curation_note: Option<String>,
    /// Whether the enrichment model actually processed this article.
    pub ai_processed: bool,
}

/// Aggregate statistics for one ingestion run.
///
/// A run never fails outright; degraded behavior surfaces here as non-zero
/// `fallbacks` / `errors` counts. Callers rely on that contract.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Articles that completed Normalize -> Enrich -> Upsert.
    pub processed: usize,
    /// Articles persisted with a fallback (non-AI) enrichment.
    pub fallbacks: usize,
    /// Items skipped due to persistence or normalization errors.
    pub errors: usize,
    /// Items discarded by the similarity filter or for missing title/link.
    pub duplicates_dropped: usize,
    /// Feeds that returned items this run.
    pub feeds_fetched: usize,
    /// Feeds whose fetch failed this run.
    pub feeds_failed: usize,
    /// Feeds skipped because the circuit breaker had them disabled.
    pub feeds_skipped: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> CanonicalArticle {
        CanonicalArticle {
            id: "abcdef0123456789".to_string(),
            title: "Test Article".to_string(),
            url: "https://example.com/story".to_string(),
            summary: "Summary here".to_string(),
            content: "<p>Body</p>".to_string(),
            published_at: Utc::now(),
            image: "https://example.com/img.jpg".to_string(),
            related_images: vec![],
            source: "example".to_string(),
            category: "Technology".to_string(),
            subcategory: "AI".to_string(),
        }
    }

    #[test]
    fn test_enriched_article_serialization_flattens() {
        let enriched = EnrichedArticle {
            article: sample_article(),
            sentiment: "neutral".to_string(),
            read_time: 2,
            tags: vec!["ai".to_string()],
            curation_note: Some("It matters.".to_string()),
            ai_processed: true,
        };

        let json = serde_json::to_string(&enriched).unwrap();
        // Canonical fields sit at the top level, not nested under "article"
        assert!(json.contains("\"title\":\"Test Article\""));
        assert!(json.contains("\"ai_processed\":true"));
        assert!(!json.contains("\"article\":"));
    }

    #[test]
    fn test_enriched_article_roundtrip() {
        let enriched = EnrichedArticle {
            article: sample_article(),
            sentiment: "positive".to_string(),
            read_time: 1,
            tags: vec![],
            curation_note: None,
            ai_processed: false,
        };

        let json = serde_json::to_string(&enriched).unwrap();
        let back: EnrichedArticle = serde_json::from_str(&json).unwrap();
        assert_eq!(back.article.id, enriched.article.id);
        assert!(!back.ai_processed);
    }

    #[test]
    fn test_run_stats_default_is_zeroed() {
        let stats = RunStats::default();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.errors, 0);
    }
}
