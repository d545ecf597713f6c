//! The ingestion run: fetch, dedup, normalize, enrich, persist.
//!
//! One run walks the active feed registry in random order, fetches feeds
//! concurrently (consulting the circuit breaker per feed), deduplicates the
//! combined batch, and then processes survivors sequentially so the
//! enrichment rate limiter sees a steady stream rather than a thundering
//! herd.
//!
//! A run never fails: per-feed and per-item problems are absorbed into
//! [`RunStats`] counters, and the item/time budgets make a run safe to
//! schedule from cron without overlap pile-ups.

use crate::breaker::CircuitBreaker;
use crate::config::FeedSource;
use crate::dedup;
use crate::enrich::EnrichmentEngine;
use crate::feeds::FeedFetch;
use crate::models::{RunStats, SourcedItem};
use crate::normalize::Normalizer;
use crate::store::ArticleStore;
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Feeds fetched concurrently per run.
const FEED_CONCURRENCY: usize = 4;

/// Pause between processed items, easing load on scraped sites.
const ITEM_DELAY_MS: u64 = 500;

/// Budgets and filters for one run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Most items carried through normalize/enrich/persist.
    pub max_items: usize,
    /// Wall-clock cap; the run stops starting new items past it.
    pub time_budget: Duration,
    /// Restrict the run to feeds of one category (case-insensitive).
    pub category: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_items: 30,
            time_budget: Duration::from_secs(300),
            category: None,
        }
    }
}

/// Drives one ingestion run end to end.
pub struct Orchestrator {
    feeds: Vec<FeedSource>,
    fetcher: Arc<dyn FeedFetch>,
    normalizer: Normalizer,
    engine: EnrichmentEngine,
    store: Arc<dyn ArticleStore>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    feed_concurrency: usize,
    item_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        feeds: Vec<FeedSource>,
        fetcher: Arc<dyn FeedFetch>,
        normalizer: Normalizer,
        engine: EnrichmentEngine,
        store: Arc<dyn ArticleStore>,
    ) -> Self {
        Self {
            feeds,
            fetcher,
            normalizer,
            engine,
            store,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new())),
            feed_concurrency: FEED_CONCURRENCY,
            item_delay: Duration::from_millis(ITEM_DELAY_MS),
        }
    }

    /// Override fetch concurrency and inter-item pacing, for tests.
    pub fn with_pacing(mut self, feed_concurrency: usize, item_delay: Duration) -> Self {
        self.feed_concurrency = feed_concurrency.max(1);
        self.item_delay = item_delay;
        self
    }

    /// Execute one run. Degradations land in the returned [`RunStats`].
    #[instrument(level = "info", skip_all, fields(max_items = options.max_items))]
    pub async fn run(&self, options: &IngestOptions) -> RunStats {
        let start = Instant::now();
        let mut stats = RunStats::default();

        let mut feeds: Vec<FeedSource> = self
            .feeds
            .iter()
            .filter(|f| f.active)
            .filter(|f| match &options.category {
                Some(c) => f.category.eq_ignore_ascii_case(c),
                None => true,
            })
            .cloned()
            .collect();
        // Random order so a slow early feed doesn't starve the same tail
        // feeds of budget every run.
        feeds.shuffle(&mut rand::rng());
        info!(feeds = feeds.len(), "Starting ingestion run");

        let batch = self.fetch_all(feeds, &mut stats).await;

        let outcome = dedup::dedup_batch(batch);
        stats.duplicates_dropped += outcome.dropped;

        for (index, item) in outcome.kept.into_iter().enumerate() {
            if stats.processed >= options.max_items {
                info!("Item budget reached; stopping");
                break;
            }
            if start.elapsed() >= options.time_budget {
                warn!("Time budget exhausted; stopping");
                break;
            }
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            debug!(title = %item.item.title, feed = %item.feed_url, "Processing item");

            let article = self.normalizer.normalize(item).await;
            let enriched = self.engine.enrich(article).await;
            if !enriched.ai_processed {
                stats.fallbacks += 1;
            }
            match self.store.upsert(&enriched).await {
                Ok(_) => stats.processed += 1,
                Err(e) => {
                    error!(id = %enriched.article.id, error = %e, "Failed to persist article");
                    stats.errors += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            processed = stats.processed,
            fallbacks = stats.fallbacks,
            duplicates = stats.duplicates_dropped,
            errors = stats.errors,
            duration_ms = stats.duration_ms,
            "Run complete"
        );
        stats
    }

    /// Fetch all feeds concurrently, honoring the circuit breaker.
    async fn fetch_all(&self, feeds: Vec<FeedSource>, stats: &mut RunStats) -> Vec<SourcedItem> {
        let results: Vec<_> = futures::stream::iter(feeds)
            .map(|feed| {
                let fetcher = Arc::clone(&self.fetcher);
                let breaker = Arc::clone(&self.breaker);
                async move {
                    if breaker.lock().await.is_disabled(&feed.url) {
                        info!(feed = %feed.url, "Skipping disabled feed");
                        return (feed, None);
                    }
                    let result = fetcher.fetch_latest(&feed).await;
                    (feed, Some(result))
                }
            })
            .buffer_unordered(self.feed_concurrency)
            .collect()
            .await;

        let mut batch = Vec::new();
        for (feed, result) in results {
            match result {
                Some(Ok(items)) => {
                    self.breaker.lock().await.record_success(&feed.url);
                    stats.feeds_fetched += 1;
                    batch.extend(items.into_iter().map(|item| SourcedItem {
                        category: feed.category.clone(),
                        feed_url: feed.url.clone(),
                        item,
                    }));
                }
                Some(Err(e)) => {
                    warn!(feed = %feed.url, error = %e, "Feed fetch failed");
                    self.breaker.lock().await.record_failure(&feed.url);
                    stats.feeds_failed += 1;
                }
                None => stats.feeds_skipped += 1,
            }
        }
        batch
    }
}
