//! AI enrichment of canonical articles via an OpenAI-compatible service.
//!
//! For each article the engine asks a language model for a rewritten
//! headline, a tightened summary, category/subcategory labels, sentiment,
//! reading time, entity tags, and a one-sentence curation note, returned as
//! a single JSON object.
//!
//! The engine degrades, never fails: a missing API key, an empty model
//! catalog, a refused rate-limiter slot, or exhaustion of every candidate
//! model all end in a deterministic fallback enrichment with
//! `ai_processed = false`. Rate-limit responses back off exponentially with
//! jitter; a model the service no longer offers is skipped immediately in
//! favor of the next candidate.

pub mod client;
pub mod limiter;

use crate::config::EngineSettings;
use crate::models::{CanonicalArticle, EnrichedArticle};
use crate::normalize::{CATEGORIES, SUMMARY_MAX_CHARS};
use crate::utils::{strip_tags, truncate_chars, truncate_for_log};
use client::ModelClient;
use itertools::Itertools;
use limiter::{Acquire, TokenBucket};
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// How long a fetched model catalog stays valid.
const CATALOG_TTL_SECS: u64 = 3600;

/// Maximum models tried per article.
const MAX_CANDIDATE_MODELS: usize = 3;

/// Attempts per model when the service answers 429.
const ATTEMPTS_PER_MODEL: u32 = 2;

/// Base delay for rate-limit backoff.
const BACKOFF_BASE_SECS: u64 = 10;

/// Backoff ceiling.
const BACKOFF_CAP_SECS: u64 = 120;

/// Most tags kept per article.
const MAX_TAGS: usize = 5;

/// Why one model call failed.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("model endpoint returned HTTP {0}")]
    Status(u16),

    #[error("model request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl ModelCallError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ModelCallError::Status(429))
    }

    pub fn is_model_missing(&self) -> bool {
        matches!(self, ModelCallError::Status(404))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelCallError::Timeout
        } else {
            ModelCallError::Network(e.to_string())
        }
    }
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ModelEnrichment {
    headline: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    sentiment: Option<String>,
    read_time: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
    curation_note: Option<String>,
}

struct CatalogCache {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Enriches canonical articles, degrading to a deterministic fallback when
/// the model service is unavailable in any way.
pub struct EnrichmentEngine {
    client: Box<dyn ModelClient>,
    limiter: TokenBucket,
    settings: EngineSettings,
    catalog: Mutex<Option<CatalogCache>>,
    consecutive_failures: AtomicU32,
}

impl EnrichmentEngine {
    pub fn new(client: Box<dyn ModelClient>, settings: EngineSettings) -> Self {
        Self::with_limiter(client, settings, TokenBucket::new())
    }

    /// Engine with a custom rate-limiter policy, for tests.
    pub fn with_limiter(
        client: Box<dyn ModelClient>,
        settings: EngineSettings,
        limiter: TokenBucket,
    ) -> Self {
        Self {
            client,
            limiter,
            settings,
            catalog: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Enrich one article. Infallible by contract; the result's
    /// `ai_processed` flag says whether a model actually ran.
    #[instrument(level = "info", skip_all, fields(id = %article.id))]
    pub async fn enrich(&self, article: CanonicalArticle) -> EnrichedArticle {
        let candidates = self.candidate_models().await;
        if candidates.is_empty() {
            debug!("No usable models; using fallback enrichment");
            return self.fallback(article);
        }

        if self.limiter.acquire().await == Acquire::Skipped {
            warn!("Rate limiter refused a slot; using fallback enrichment");
            return self.fallback(article);
        }

        let prompt = build_prompt(&article);
        for model in &candidates {
            match self.call_model(model, &prompt).await {
                Some(enrichment) => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    info!(model = %model, "Article enriched");
                    return apply_enrichment(article, enrichment);
                }
                None => continue,
            }
        }

        warn!("All candidate models failed; using fallback enrichment");
        self.fallback(article)
    }

    /// Call one model, retrying once on a rate limit. `None` means this
    /// model is exhausted and the next candidate should be tried.
    async fn call_model(&self, model: &str, prompt: &str) -> Option<ModelEnrichment> {
        for attempt in 0..ATTEMPTS_PER_MODEL {
            match self.client.generate(model, prompt).await {
                Ok(raw) => match parse_enrichment(&raw) {
                    Ok(enrichment) => return Some(enrichment),
                    Err(e) => {
                        warn!(
                            model = %model,
                            error = %e,
                            raw = %truncate_for_log(&raw, 200),
                            "Model answered with unparseable JSON"
                        );
                        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                        return None;
                    }
                },
                Err(e) if e.is_rate_limited() => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                    if attempt + 1 < ATTEMPTS_PER_MODEL {
                        let delay = backoff_delay(failures);
                        warn!(model = %model, delay_secs = delay.as_secs(), "Rate limited; backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) if e.is_model_missing() => {
                    warn!(model = %model, "Model not offered by the service; trying next");
                    return None;
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Model call failed");
                    self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        None
    }

    /// Models to try this call, most preferred first.
    ///
    /// The configured preference list is intersected with the service's
    /// live catalog (cached for an hour), then padded with other available
    /// models up to [`MAX_CANDIDATE_MODELS`]. No API key means no catalog
    /// and therefore no candidates.
    async fn candidate_models(&self) -> Vec<String> {
        if self.settings.api_key.is_none() {
            return Vec::new();
        }

        let mut cache = self.catalog.lock().await;
        let stale = match cache.as_ref() {
            Some(c) => c.fetched_at.elapsed() > Duration::from_secs(CATALOG_TTL_SECS),
            None => true,
        };
        if stale {
            match self.client.list_models().await {
                Ok(models) => {
                    info!(count = models.len(), "Refreshed model catalog");
                    *cache = Some(CatalogCache {
                        models,
                        fetched_at: Instant::now(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Could not list models");
                    *cache = None;
                }
            }
        }

        let Some(catalog) = cache.as_ref() else {
            return Vec::new();
        };

        let preferred = self
            .settings
            .preferred_models
            .iter()
            .filter(|m| catalog.models.contains(m))
            .cloned();
        let others = catalog
            .models
            .iter()
            .filter(|m| !self.settings.preferred_models.contains(m))
            .cloned();
        preferred
            .chain(others)
            .unique()
            .take(MAX_CANDIDATE_MODELS)
            .collect()
    }

    /// Deterministic non-AI enrichment: original headline, plain-text
    /// summary, neutral sentiment, no tags.
    fn fallback(&self, mut article: CanonicalArticle) -> EnrichedArticle {
        let plain = strip_tags(&article.content);
        if !plain.is_empty() {
            article.summary = truncate_chars(&plain, SUMMARY_MAX_CHARS);
            article.content = format!("<p>{plain}</p>");
        }
        article.category = "General".to_string();

        EnrichedArticle {
            article,
            sentiment: "neutral".to_string(),
            read_time: 1,
            tags: Vec::new(),
            curation_note: None,
            ai_processed: false,
        }
    }
}

/// Exponential backoff with +/-20% jitter, capped.
fn backoff_delay(failures: u32) -> Duration {
    let base = BACKOFF_BASE_SECS.saturating_mul(1u64 << failures.min(6));
    let capped = base.min(BACKOFF_CAP_SECS) as f64;
    let jitter = rand::rng().random_range(0.8..1.2);
    Duration::from_secs_f64(capped * jitter)
}

fn build_prompt(article: &CanonicalArticle) -> String {
    let body = truncate_chars(&strip_tags(&article.content), 4000);
    format!(
        "You are a news editor. Given the article below, respond with a single \
         JSON object and nothing else, with these fields:\n\
         headline (string, at most 15 words), summary (string, at most 150 words), \
         content (string, an HTML article body of 400-600 words using <p> tags), \
         category (one of: {}), subcategory (string), \
         sentiment (positive | neutral | negative), read_time (integer minutes), \
         tags (array of 3 to {} entity strings), \
         curation_note (one sentence on why this matters).\n\n\
         Title: {}\nCategory hint: {}\nBody:\n{}",
        CATEGORIES.join(", "),
        MAX_TAGS,
        article.title,
        article.category,
        body
    )
}

/// Extract and decode the JSON object from a model reply.
///
/// Models wrap JSON in prose or code fences often enough that the decoder
/// first slices from the first `{` to the last `}`; if that fails, code
/// fences are stripped and the slice is retried once.
fn parse_enrichment(raw: &str) -> Result<ModelEnrichment, serde_json::Error> {
    match serde_json::from_str(json_slice(raw)) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => {
            let defenced = raw.replace("```json", "").replace("```", "");
            serde_json::from_str(json_slice(&defenced)).map_err(|_| first_err)
        }
    }
}

fn json_slice(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

/// Merge the model output into the article, validating every field.
fn apply_enrichment(mut article: CanonicalArticle, e: ModelEnrichment) -> EnrichedArticle {
    if let Some(headline) = non_empty(e.headline) {
        article.title = headline;
    }
    if let Some(summary) = non_empty(e.summary) {
        article.summary = truncate_chars(&summary, SUMMARY_MAX_CHARS);
    }
    if let Some(content) = non_empty(e.content) {
        article.content = content;
    }
    if let Some(category) = non_empty(e.category) {
        if let Some(canonical) = CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(&category))
        {
            article.category = canonical.to_string();
        }
    }
    if let Some(subcategory) = non_empty(e.subcategory) {
        article.subcategory = subcategory;
    }

    let sentiment = match e.sentiment.as_deref() {
        Some(s @ ("positive" | "neutral" | "negative")) => s.to_string(),
        _ => "neutral".to_string(),
    };
    let read_time = e
        .read_time
        .filter(|t| *t > 0)
        .unwrap_or_else(|| crate::utils::estimate_read_time(&article.content));
    let tags = e
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unique()
        .take(MAX_TAGS)
        .collect();

    EnrichedArticle {
        article,
        sentiment,
        read_time,
        tags,
        curation_note: e.curation_note.filter(|n| !n.trim().is_empty()),
        ai_processed: true,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
