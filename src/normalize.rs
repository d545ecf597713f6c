//! Normalization of raw feed items into canonical articles.
//!
//! The normalizer assigns a stable identity (a hash of the canonical URL),
//! shapes the summary and body content, resolves a primary image through a
//! priority chain, and fills every remaining field so downstream stages
//! never see a half-formed article.
//!
//! When feed-supplied text is shorter than [`MIN_CONTENT_LEN`] plain-text
//! characters, the normalizer asks the page scraper for the full article
//! body. Scraping is best-effort; a failed scrape leaves the snippet in
//! place and processing continues.

use crate::models::{CanonicalArticle, SourcedItem};
use crate::scrape::{self, PageSource};
use crate::utils::{source_label, strip_tags, truncate_chars};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maximum summary length in characters.
pub const SUMMARY_MAX_CHARS: usize = 1000;

/// Plain-text length below which the full article page is scraped.
pub const MIN_CONTENT_LEN: usize = 300;

/// Category labels recognized across the pipeline. Feeds declare one of
/// these in the registry and the enrichment model must pick from the same
/// set.
pub const CATEGORIES: &[&str] = &[
    "World",
    "Politics",
    "Business",
    "Technology",
    "Science",
    "Health",
    "Sports",
    "Entertainment",
    "General",
];

/// Per-category default images available when no real image can be found.
const DEFAULT_IMAGE_POOL: usize = 3;

/// Derive the stable article id from its canonical URL.
///
/// SHA-256 over the URL, truncated to the first 8 bytes and hex-encoded
/// (16 characters). The same URL yields the same id in every run and every
/// process, which is what makes persistence an idempotent upsert.
pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut out = String::with_capacity(16);
    for b in &digest[..8] {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Deterministic default image for a category, keyed by the article URL so
/// the same article always gets the same stand-in.
pub fn default_image(category: &str, url: &str) -> String {
    let index = (pool_index(url) % DEFAULT_IMAGE_POOL as u64) as usize;
    default_image_at(category, index)
}

fn default_image_at(category: &str, index: usize) -> String {
    let slug = category.to_lowercase().replace(' ', "-");
    format!("https://picsum.photos/seed/{slug}-{index}/1200/630")
}

fn pool_index(url: &str) -> u64 {
    let digest = Sha256::digest(url.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().unwrap_or_default())
}

/// Turns [`SourcedItem`]s into [`CanonicalArticle`]s.
///
/// Holds the page source used for full-content scraping and Open-Graph
/// image lookup.
pub struct Normalizer {
    page: Arc<dyn PageSource>,
}

impl Normalizer {
    pub fn new(page: Arc<dyn PageSource>) -> Self {
        Self { page }
    }

    /// Normalize one item. Infallible: every field is filled from the item,
    /// a best-effort scrape, or a deterministic default.
    #[instrument(level = "debug", skip_all, fields(url = %sourced.item.link))]
    pub async fn normalize(&self, sourced: SourcedItem) -> CanonicalArticle {
        let item = sourced.item;
        let id = article_id(&item.link);

        let plain = strip_tags(&item.content);
        let mut content = item.content.clone();

        if plain.chars().count() < MIN_CONTENT_LEN {
            let scraped = scrape::fetch_article_text(self.page.as_ref(), &item.link).await;
            if !scraped.is_empty() {
                content = paragraphs_to_html(&scraped);
            }
        }

        let summary_source = if plain.is_empty() {
            strip_tags(&content)
        } else {
            plain
        };
        let summary = if summary_source.is_empty() {
            item.title.clone()
        } else {
            truncate_chars(&summary_source, SUMMARY_MAX_CHARS)
        };
        if content.is_empty() {
            content = format!("<p>{summary}</p>");
        }

        let (image, related_images) = self
            .resolve_images(&item.media, &item.content, &item.link, &sourced.category)
            .await;

        debug!(%id, "Normalized article");
        CanonicalArticle {
            id,
            title: item.title,
            url: item.link.clone(),
            summary,
            content,
            published_at: item.published_at.unwrap_or_else(Utc::now),
            image,
            related_images,
            source: source_label(&item.link),
            category: sourced.category,
            subcategory: String::new(),
        }
    }

    /// Image priority chain: feed media, inline `<img>`, Open-Graph image,
    /// category default. Related images are other defaults from the same
    /// category pool, so galleries stay visually coherent.
    async fn resolve_images(
        &self,
        media: &[String],
        fragment: &str,
        url: &str,
        category: &str,
    ) -> (String, Vec<String>) {
        let primary = if let Some(first) = media.first() {
            first.clone()
        } else if let Some(inline) = scrape::extract_first_img(fragment) {
            inline
        } else if let Some(og) = scrape::fetch_og_image(self.page.as_ref(), url).await {
            og
        } else {
            default_image(category, url)
        };

        let related = (0..DEFAULT_IMAGE_POOL)
            .map(|i| default_image_at(category, i))
            .filter(|img| *img != primary)
            .take(2)
            .collect();

        (primary, related)
    }
}

fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", p.trim()))
        .collect()
}
