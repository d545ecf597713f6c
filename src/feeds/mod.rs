//! Feed fetching: retrieve and parse one syndication endpoint.
//!
//! The fetcher retrieves a single RSS/Atom feed with a bounded timeout and
//! returns up to [`ITEMS_PER_FEED`] of the newest items. Older items are
//! deliberately ignored to bound enrichment cost. A timeout or malformed
//! payload is a failure of that feed only; the orchestrator reports it to
//! the circuit breaker and moves on — one bad feed never aborts the batch.
//!
//! [`FeedFetch`] is the seam that lets tests drive the pipeline with fixture
//! items instead of live HTTP.

pub mod parser;

use crate::config::FeedSource;
use crate::models::RawFeedItem;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Hard timeout for one feed request.
pub const FEED_TIMEOUT_SECS: u64 = 5;

/// Newest-items cap per feed.
pub const ITEMS_PER_FEED: usize = 5;

/// User-Agent sent on all outbound HTTP requests.
pub const USER_AGENT: &str = concat!("newsloom/", env!("CARGO_PKG_VERSION"), " (feed harvester)");

/// Why a feed fetch contributed nothing this round.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request timed out")]
    Timeout,

    #[error("feed endpoint returned HTTP {0}")]
    Status(u16),

    #[error("http error: {0}")]
    Http(String),

    #[error("malformed feed payload: {0}")]
    Malformed(String),
}

impl FeedError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FeedError::Timeout
        } else {
            FeedError::Http(e.to_string())
        }
    }
}

/// Retrieval of the newest items from one feed endpoint.
#[async_trait]
pub trait FeedFetch: Send + Sync {
    /// Fetch and parse the feed, newest items first.
    ///
    /// # Errors
    ///
    /// Any [`FeedError`] means this feed contributes nothing this run; the
    /// caller records the failure with the circuit breaker.
    async fn fetch_latest(&self, source: &FeedSource) -> Result<Vec<RawFeedItem>, FeedError>;
}

/// HTTP implementation of [`FeedFetch`].
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    items_per_feed: usize,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            items_per_feed: ITEMS_PER_FEED,
        }
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetch for HttpFeedFetcher {
    #[instrument(level = "info", skip_all, fields(url = %source.url))]
    async fn fetch_latest(&self, source: &FeedSource) -> Result<Vec<RawFeedItem>, FeedError> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(FeedError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(FeedError::from_reqwest)?;
        debug!(bytes = body.len(), "Fetched feed payload");

        let mut items = parser::parse_feed(&body)?;
        // Newest first; items without a timestamp sort to the back.
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.items_per_feed);

        info!(count = items.len(), category = %source.category, "Parsed feed items");
        Ok(items)
    }
}
