//! Pipeline configuration: the feed registry and enrichment settings.
//!
//! Configuration is a single YAML file holding the curated feed list and the
//! enrichment service settings. The feed registry is read-only at run time;
//! the circuit breaker overlays disabled state without mutating the records.
//!
//! # Example
//!
//! ```yaml
//! feeds:
//!   - url: https://feeds.bbci.co.uk/news/technology/rss.xml
//!     category: Technology
//!   - url: https://www.reutersagency.com/feed/?best-topics=business
//!     category: Business
//!     active: false
//! engine:
//!   api_base_url: https://api.openai.com/v1
//!   preferred_models:
//!     - gpt-4o-mini
//!     - gpt-4o
//! ```
//!
//! The API key is never stored in the file; it comes from the environment
//! (`NEWSLOOM_API_KEY`) or the CLI. A missing key is not an error — the
//! engine silently downgrades to fallback enrichment for the whole run.

use serde::Deserialize;
use std::error::Error;
use tracing::{info, instrument};

/// One curated feed endpoint with its category label.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    /// Syndication endpoint URL (RSS 2.0 or Atom).
    pub url: String,
    /// Category label applied to every item from this feed.
    pub category: String,
    /// Inactive feeds stay in the file but are never fetched.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Settings for the AI enrichment engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Base URL of the OpenAI-compatible service.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Models to try, most preferred first. Intersected with the service's
    /// live model list during validation.
    #[serde(default = "default_models")]
    pub preferred_models: Vec<String>,
    /// API key; populated from the environment/CLI, not the YAML file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            preferred_models: default_models(),
            api_key: None,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// The curated feed registry.
    pub feeds: Vec<FeedSource>,
    /// Enrichment service settings.
    #[serde(default)]
    pub engine: EngineSettings,
}

impl PipelineConfig {
    /// Active feeds, optionally filtered to a single category
    /// (case-insensitive).
    pub fn active_feeds(&self, category: Option<&str>) -> Vec<FeedSource> {
        self.feeds
            .iter()
            .filter(|f| f.active)
            .filter(|f| match category {
                Some(c) => f.category.eq_ignore_ascii_case(c),
                None => true,
            })
            .cloned()
            .collect()
    }
}

/// Load pipeline configuration from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub fn load_config(path: &str) -> Result<PipelineConfig, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_yaml::from_str(&raw)?;
    info!(feeds = config.feeds.len(), "Loaded pipeline configuration");
    Ok(config)
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_models() -> Vec<String> {
    vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()]
}
