//! Idempotent article persistence.
//!
//! Articles are keyed by their stable id (a hash of the canonical URL), so
//! writing is an upsert: re-ingesting the same story overwrites the earlier
//! record instead of duplicating it. The [`ArticleStore`] trait is the seam
//! between the orchestrator and storage; production uses one JSON file per
//! article, tests use the in-memory store.

use crate::models::EnrichedArticle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Why a store operation failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether an upsert created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Keyed storage of enriched articles.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or replace the article under its id.
    async fn upsert(&self, article: &EnrichedArticle) -> Result<UpsertOutcome, StoreError>;

    /// Fetch an article by id.
    async fn get(&self, id: &str) -> Result<Option<EnrichedArticle>, StoreError>;
}

/// One pretty-printed JSON file per article: `{dir}/{id}.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ArticleStore for JsonFileStore {
    #[instrument(level = "debug", skip_all, fields(id = %article.article.id))]
    async fn upsert(&self, article: &EnrichedArticle) -> Result<UpsertOutcome, StoreError> {
        let path = self.path_for(&article.article.id);
        let existed = fs::try_exists(&path).await.unwrap_or(false);

        let json = serde_json::to_vec_pretty(article)?;
        fs::write(&path, json).await?;

        let outcome = if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        debug!(?outcome, path = %path.display(), "Persisted article");
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> Result<Option<EnrichedArticle>, StoreError> {
        let path = self.path_for(id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store used by tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    articles: Arc<RwLock<HashMap<String, EnrichedArticle>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored articles.
    pub async fn count(&self) -> usize {
        self.articles.read().await.len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn upsert(&self, article: &EnrichedArticle) -> Result<UpsertOutcome, StoreError> {
        let mut map = self.articles.write().await;
        let outcome = if map.contains_key(&article.article.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        map.insert(article.article.id.clone(), article.clone());
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> Result<Option<EnrichedArticle>, StoreError> {
        Ok(self.articles.read().await.get(id).cloned())
    }
}
